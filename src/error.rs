//! Error types for the dependency injection container.

use std::time::Duration;

use crate::lifetime::Lifetime;

/// Boxed error type accepted from constructors and disposers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Dependency injection errors.
///
/// Every failure mode of registration, validation, resolution, and disposal
/// is a variant here. Callers that only care about the category can use the
/// predicate methods (`is_registration`, `is_not_found`, ...) instead of
/// matching variants.
///
/// # Examples
///
/// ```rust
/// use rivet_di::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build().unwrap();
/// let err = provider.get::<String>().unwrap_err();
/// assert!(err.is_not_found());
/// assert!(err.to_string().contains("String"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DiError {
    /// A plain (non-keyed, non-grouped) registration for this type already exists.
    #[error("duplicate registration for {type_name}{}", fmt_key(.key))]
    Duplicate {
        type_name: &'static str,
        key: Option<&'static str>,
    },

    /// The same plain type was registered twice with different lifetimes.
    #[error("lifetime conflict for {type_name}: already registered as {existing:?}, now {requested:?}")]
    LifetimeConflict {
        type_name: &'static str,
        existing: Lifetime,
        requested: Lifetime,
    },

    /// Transient services cannot join a group.
    #[error("transient service {type_name} cannot join group {group:?}")]
    TransientInGroup {
        type_name: &'static str,
        group: &'static str,
    },

    /// A registration may carry a key or a group, never both.
    #[error("{type_name}: a registration may carry a key or a group, not both")]
    KeyGroupConflict { type_name: &'static str },

    /// Empty keys and keys containing a back-tick are rejected.
    #[error("invalid service key {key:?}")]
    InvalidKey { key: String },

    /// Group names must be non-empty.
    #[error("group name must not be empty")]
    EmptyGroupName,

    /// A bundle constructor declared no outputs.
    #[error("constructor for {type_name} declares no outputs")]
    EmptyOutputs { type_name: &'static str },

    /// Post-build decoration is not allowed on the root scope.
    #[error("the root scope cannot be decorated after build")]
    DecorateRoot,

    /// A scope accepts one fresh decorator chain per type.
    #[error("{type_name} already carries a decorator chain in this scope")]
    AlreadyDecorated { type_name: &'static str },

    /// The dependency graph contains a cycle; the path lists the
    /// participants in traversal order.
    #[error("circular dependency: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<&'static str> },

    /// A longer-lived consumer declared a shorter-lived dependency.
    #[error("captive dependency: {consumer} ({consumer_lifetime:?}) must not depend on {dependency} ({dependency_lifetime:?})")]
    CaptiveDependency {
        consumer: &'static str,
        consumer_lifetime: Lifetime,
        dependency: &'static str,
        dependency_lifetime: Lifetime,
    },

    /// The requested service is not registered.
    #[error("service not found: {type_name}{}", fmt_key(.key))]
    NotFound {
        type_name: &'static str,
        key: Option<&'static str>,
    },

    /// A constructor returned an error.
    #[error("constructing {type_name} failed: {source}")]
    Construction {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    /// A constructor panicked; the payload is preserved as text.
    #[error("constructor for {type_name} panicked: {message}")]
    ConstructionPanicked {
        type_name: &'static str,
        message: String,
    },

    /// Eager singleton construction exceeded the build timeout.
    #[error("provider build exceeded {timeout:?} while constructing {type_name}")]
    BuildTimeout {
        type_name: &'static str,
        timeout: Duration,
    },

    /// A top-level resolution exceeded the resolution timeout.
    #[error("resolving {type_name} exceeded {timeout:?}")]
    ResolutionTimeout {
        type_name: &'static str,
        timeout: Duration,
    },

    /// The provider was built in dry-run mode; nothing is constructed.
    #[error("dry-run provider: {type_name} was not constructed")]
    DryRun { type_name: &'static str },

    /// The provider has been closed.
    #[error("provider is disposed")]
    ProviderDisposed,

    /// The scope has been closed.
    #[error("scope is disposed")]
    ScopeDisposed,

    /// A single disposer failed during teardown.
    #[error("disposing {type_name} failed: {source}")]
    DisposerFailed {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    /// One or more disposers failed; every disposer still ran.
    #[error("{} disposer(s) failed during close", .errors.len())]
    Disposal { errors: Vec<DiError> },

    /// Internal downcast guard; indicates a registration stored under the
    /// wrong type token.
    #[error("type mismatch for {type_name}")]
    TypeMismatch { type_name: &'static str },

    /// The resolution stack grew past the hard depth cap.
    #[error("resolution depth {0} exceeded")]
    DepthExceeded(usize),
}

fn fmt_key(key: &Option<&'static str>) -> String {
    match key {
        Some(k) => format!(" (key {k:?})"),
        None => String::new(),
    }
}

impl DiError {
    /// Registration-time or input errors.
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            DiError::Duplicate { .. }
                | DiError::LifetimeConflict { .. }
                | DiError::TransientInGroup { .. }
                | DiError::KeyGroupConflict { .. }
                | DiError::InvalidKey { .. }
                | DiError::EmptyGroupName
                | DiError::EmptyOutputs { .. }
                | DiError::DecorateRoot
                | DiError::AlreadyDecorated { .. }
        )
    }

    /// Build-time graph validation errors.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DiError::CircularDependency { .. } | DiError::CaptiveDependency { .. }
        )
    }

    /// The requested service is not registered.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DiError::NotFound { .. })
    }

    /// Constructor failures, including panics and build timeouts.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            DiError::Construction { .. }
                | DiError::ConstructionPanicked { .. }
                | DiError::BuildTimeout { .. }
        )
    }

    /// Timeouts during build or resolution.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DiError::BuildTimeout { .. } | DiError::ResolutionTimeout { .. }
        )
    }

    /// The provider or scope was already closed.
    pub fn is_disposed(&self) -> bool {
        matches!(self, DiError::ProviderDisposed | DiError::ScopeDisposed)
    }

    /// Errors accumulated from disposers during close.
    pub fn is_disposal(&self) -> bool {
        matches!(
            self,
            DiError::Disposal { .. } | DiError::DisposerFailed { .. }
        )
    }
}

/// Result type for DI operations.
pub type DiResult<T> = Result<T, DiError>;
