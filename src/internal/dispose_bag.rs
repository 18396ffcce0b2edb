//! LIFO disposal bag.

use crate::context::Context;
use crate::descriptor::DisposerFn;
use crate::error::DiError;

/// Ordered collection of disposal hooks, run in reverse creation order.
///
/// Disposer failures are accumulated, never short-circuited, so every hook
/// runs exactly once.
#[derive(Default)]
pub(crate) struct DisposeBag {
    hooks: Vec<(&'static str, DisposerFn)>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, name: &'static str, hook: DisposerFn) {
        self.hooks.push((name, hook));
    }

    /// Runs every hook LIFO, collecting failures into `errors`.
    pub(crate) fn dispose_all(&mut self, ctx: &Context, errors: &mut Vec<DiError>) {
        while let Some((name, hook)) = self.hooks.pop() {
            if let Err(source) = hook(ctx) {
                errors.push(DiError::DisposerFailed {
                    type_name: name,
                    source,
                });
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn hooks_run_lifo_and_errors_accumulate() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut bag = DisposeBag::default();

        for name in ["first", "second", "third"] {
            let order = order.clone();
            bag.push(
                name,
                Box::new(move |_ctx| {
                    order.lock().unwrap().push(name);
                    if name == "second" {
                        Err("flush failed".into())
                    } else {
                        Ok(())
                    }
                }),
            );
        }

        let mut errors = Vec::new();
        bag.dispose_all(&Context::new(), &mut errors);

        assert_eq!(*order.lock().unwrap(), vec!["third", "second", "first"]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_disposal());
        assert!(bag.is_empty());
    }
}
