//! Resolution telemetry hooks.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::DiError;
use crate::key::Key;

/// Observer of top-level resolutions.
///
/// Hooks fire after each top-level `get*` call on a provider or scope,
/// success and failure alike. Nested dependency resolutions inside a
/// constructor do not fire observers of their own.
///
/// # Examples
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
/// use rivet_di::{DiError, DiObserver, Key, ProviderOptions, Resolver, ServiceCollection};
///
/// #[derive(Default)]
/// struct Recorder {
///     seen: Mutex<Vec<&'static str>>,
/// }
///
/// impl DiObserver for Recorder {
///     fn resolved(&self, key: &Key, _elapsed: Duration) {
///         self.seen.lock().unwrap().push(key.display_name());
///     }
/// }
///
/// let recorder = Arc::new(Recorder::default());
/// let mut services = ServiceCollection::new();
/// services.add_singleton(5u8);
///
/// let provider = services
///     .build_with_options(ProviderOptions::new().with_observer(recorder.clone()))
///     .unwrap();
/// let _ = provider.get::<u8>().unwrap();
/// assert_eq!(recorder.seen.lock().unwrap().as_slice(), ["u8"]);
/// ```
pub trait DiObserver: Send + Sync {
    /// A top-level resolution succeeded.
    fn resolved(&self, key: &Key, elapsed: Duration) {
        let _ = (key, elapsed);
    }

    /// A top-level resolution failed.
    fn failed(&self, key: &Key, error: &DiError) {
        let _ = (key, error);
    }
}

/// Observer that forwards resolution events to `tracing`.
pub struct TracingObserver;

impl DiObserver for TracingObserver {
    fn resolved(&self, key: &Key, elapsed: Duration) {
        debug!(service = key.display_name(), ?elapsed, "service resolved");
    }

    fn failed(&self, key: &Key, error: &DiError) {
        warn!(service = key.display_name(), %error, "service resolution failed");
    }
}

/// Fan-out over every registered observer.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    list: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn push(&mut self, observer: Arc<dyn DiObserver>) {
        self.list.push(observer);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub(crate) fn notify_resolved(&self, key: &Key, elapsed: Duration) {
        for observer in &self.list {
            observer.resolved(key, elapsed);
        }
    }

    pub(crate) fn notify_failed(&self, key: &Key, error: &DiError) {
        for observer in &self.list {
            observer.failed(key, error);
        }
    }
}
