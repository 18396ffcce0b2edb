//! Cancellation contexts carried by scopes.
//!
//! A [`Context`] bounds the lifetime of a scope: cancelling it triggers the
//! same disposal path as an explicit `close()`. Contexts form a chain, so a
//! derived context is cancelled whenever any ancestor is, and may carry a
//! deadline and typed values.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

type AnyValue = Arc<dyn Any + Send + Sync>;
type CancelCallback = Box<dyn FnOnce() + Send>;

/// A cancellation context.
///
/// Cloning is cheap and shares the same cancellation state. Derived
/// contexts ([`child`](Context::child), [`with_timeout`](Context::with_timeout),
/// [`with_value`](Context::with_value)) are cancelled when their parent is,
/// but cancelling a child never affects the parent.
///
/// # Examples
///
/// ```rust
/// use rivet_di::Context;
///
/// let parent = Context::new();
/// let child = parent.child();
///
/// parent.cancel();
/// assert!(child.is_cancelled());
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    cancelled: AtomicBool,
    callbacks: Mutex<Vec<CancelCallback>>,
    values: HashMap<TypeId, AnyValue>,
    deadline: Option<Instant>,
}

impl Context {
    /// Creates a new root context with no deadline and no values.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                cancelled: AtomicBool::new(false),
                callbacks: Mutex::new(Vec::new()),
                values: HashMap::new(),
                deadline: None,
            }),
        }
    }

    fn derive(&self, deadline: Option<Instant>, values: HashMap<TypeId, AnyValue>) -> Self {
        let child = Self {
            inner: Arc::new(ContextInner {
                cancelled: AtomicBool::new(false),
                callbacks: Mutex::new(Vec::new()),
                values,
                deadline: deadline.or(self.inner.deadline),
            }),
        };
        let weak: Weak<ContextInner> = Arc::downgrade(&child.inner);
        self.on_cancel(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                Context { inner }.cancel();
            }
        }));
        child
    }

    /// Derives a child context that is cancelled whenever this one is.
    pub fn child(&self) -> Self {
        self.derive(None, self.inner.values.clone())
    }

    /// Derives a child context that self-cancels once `timeout` elapses.
    ///
    /// A watcher thread sleeps until the deadline; it holds only a weak
    /// reference, so dropping every handle ends the context early.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a child context that self-cancels at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let child = self.derive(Some(deadline), self.inner.values.clone());
        let weak = Arc::downgrade(&child.inner);
        std::thread::spawn(move || {
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
            if let Some(inner) = weak.upgrade() {
                Context { inner }.cancel();
            }
        });
        child
    }

    /// Derives a child context carrying `value`, retrievable by type.
    pub fn with_value<T: Send + Sync + 'static>(&self, value: T) -> Self {
        let mut values = self.inner.values.clone();
        values.insert(TypeId::of::<T>(), Arc::new(value));
        self.derive(None, values)
    }

    /// Looks up a value of type `T` carried by this context or an ancestor.
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner
            .values
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|any| any.downcast::<T>().ok())
    }

    /// The effective deadline, if any ancestor set one.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Cancels this context and every derived context.
    ///
    /// Registered callbacks run exactly once, on the calling thread.
    /// Cancelling twice is a no-op.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.inner.callbacks.lock());
        for callback in callbacks {
            callback();
        }
    }

    /// Whether cancellation has been requested, including via a passed
    /// deadline.
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        matches!(self.inner.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Registers a callback to run on cancellation. Runs immediately when
    /// the context is already cancelled.
    pub(crate) fn on_cancel(&self, callback: CancelCallback) {
        if self.inner.cancelled.load(Ordering::Acquire) {
            callback();
            return;
        }
        let mut callbacks = self.inner.callbacks.lock();
        // Re-check under the lock so a concurrent cancel cannot strand us.
        if self.inner.cancelled.load(Ordering::Acquire) {
            drop(callbacks);
            callback();
        } else {
            callbacks.push(callback);
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn cancel_is_idempotent() {
        let fired = Arc::new(AtomicUsize::new(0));
        let ctx = Context::new();
        let counter = fired.clone();
        ctx.on_cancel(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        ctx.cancel();
        ctx.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn child_cancelled_with_parent_not_vice_versa() {
        let parent = Context::new();
        let child = parent.child();

        child.cancel();
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn callback_after_cancel_runs_immediately() {
        let ctx = Context::new();
        ctx.cancel();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        ctx.on_cancel(Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn values_visible_through_derivation() {
        let ctx = Context::new().with_value(42u64);
        let child = ctx.child();
        assert_eq!(child.value::<u64>().as_deref(), Some(&42));
        assert!(child.value::<String>().is_none());
    }

    #[test]
    fn deadline_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(10));
        assert!(!ctx.is_cancelled());
        std::thread::sleep(Duration::from_millis(40));
        assert!(ctx.is_cancelled());
    }
}
