//! Runtime circular dependency detection.
//!
//! The build-time validator already rejects cyclic graphs, so this guard is
//! defence in depth: it also covers `invoke` calls whose closures were never
//! part of the validated graph. Tokens are scoped to the owning store, so a
//! constructor that opens a child scope and resolves the same scoped type
//! there does not trip the guard.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};

const MAX_DEPTH: usize = 1024;

thread_local! {
    static RESOLUTION_TLS: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

#[derive(Clone, Copy)]
struct Frame {
    /// Owning store: 0 for the singleton store, otherwise the scope id.
    owner: u64,
    desc: usize,
    name: &'static str,
}

/// Marks a descriptor as in-progress on the current thread for the duration
/// of its construction.
#[derive(Debug)]
pub(crate) struct ResolveGuard {
    _private: (),
}

impl ResolveGuard {
    pub(crate) fn enter(owner: u64, desc: usize, name: &'static str) -> DiResult<Self> {
        RESOLUTION_TLS.with(|tls| {
            let mut stack = tls.borrow_mut();
            if stack.iter().any(|f| f.owner == owner && f.desc == desc) {
                let mut path: Vec<&'static str> = stack.iter().map(|f| f.name).collect();
                path.push(name);
                return Err(DiError::CircularDependency { path });
            }
            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }
            stack.push(Frame { owner, desc, name });
            Ok(ResolveGuard { _private: () })
        })
    }
}

impl Drop for ResolveGuard {
    fn drop(&mut self) {
        RESOLUTION_TLS.with(|tls| {
            tls.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentry_reports_path() {
        let _a = ResolveGuard::enter(1, 0, "A").unwrap();
        let _b = ResolveGuard::enter(1, 1, "B").unwrap();
        let err = ResolveGuard::enter(1, 0, "A").unwrap_err();
        match err {
            DiError::CircularDependency { path } => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn same_descriptor_in_other_scope_is_fine() {
        let _a = ResolveGuard::enter(1, 0, "A").unwrap();
        let _b = ResolveGuard::enter(2, 0, "A").unwrap();
    }

    #[test]
    fn guard_pops_on_drop() {
        {
            let _a = ResolveGuard::enter(7, 9, "A").unwrap();
        }
        let _again = ResolveGuard::enter(7, 9, "A").unwrap();
    }
}
