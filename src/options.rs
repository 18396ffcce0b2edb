//! Provider build options.

use std::sync::Arc;
use std::time::Duration;

use crate::observer::{DiObserver, Observers};

/// Options recognized by `ServiceCollection::build_with_options`.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use rivet_di::{ProviderOptions, ServiceCollection};
///
/// let options = ProviderOptions::new()
///     .with_build_timeout(Duration::from_secs(5))
///     .with_resolution_timeout(Duration::from_millis(250));
///
/// let provider = ServiceCollection::new().build_with_options(options).unwrap();
/// provider.close().unwrap();
/// ```
pub struct ProviderOptions {
    /// Run graph validation during build. Default `true`.
    pub(crate) validate_on_build: bool,
    /// Deadline for eager singleton construction.
    pub(crate) build_timeout: Option<Duration>,
    /// Deadline applied to each top-level `get*` call.
    pub(crate) resolution_timeout: Option<Duration>,
    /// Validate wiring without constructing anything; resolutions return a
    /// dry-run sentinel error. Default `false`.
    pub(crate) dry_run: bool,
    pub(crate) observers: Observers,
}

impl ProviderOptions {
    pub fn new() -> Self {
        Self {
            validate_on_build: true,
            build_timeout: None,
            resolution_timeout: None,
            dry_run: false,
            observers: Observers::default(),
        }
    }

    /// Skips graph validation at build. The runtime cycle guard still
    /// protects resolutions.
    pub fn without_validation(mut self) -> Self {
        self.validate_on_build = false;
        self
    }

    /// Bounds eager singleton construction; on elapse, build fails with a
    /// timeout error naming the singleton under construction.
    pub fn with_build_timeout(mut self, timeout: Duration) -> Self {
        self.build_timeout = Some(timeout);
        self
    }

    /// Bounds each top-level resolution.
    pub fn with_resolution_timeout(mut self, timeout: Duration) -> Self {
        self.resolution_timeout = Some(timeout);
        self
    }

    /// Validates wiring without running constructors; every `get*` on the
    /// built provider returns a dry-run error.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Attaches a telemetry observer; may be called repeatedly.
    pub fn with_observer(mut self, observer: Arc<dyn DiObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self::new()
    }
}
