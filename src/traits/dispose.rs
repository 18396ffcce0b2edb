//! Disposal traits for resource cleanup.

use crate::context::Context;
use crate::error::BoxError;

/// Trait for resource disposal.
///
/// Implement this for services that need structured teardown (flushing
/// caches, closing connections). Instances registered with
/// `Registration::disposable` are disposed in LIFO creation order when
/// their owning scope or provider closes. Errors are collected, never
/// short-circuited.
///
/// # Examples
///
/// ```rust
/// use rivet_di::{BoxError, Dispose, Resolver, ServiceCollection};
///
/// struct Cache {
///     name: String,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> Result<(), BoxError> {
///         println!("flushing cache: {}", self.name);
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_scoped_ctor(|_: ()| Cache { name: "user_cache".into() })
///     .disposable();
///
/// let provider = services.build().unwrap();
/// let scope = provider.create_scope(&rivet_di::Context::new()).unwrap();
/// let _cache = scope.get_required::<Cache>();
/// scope.close().unwrap(); // cache disposed here
/// ```
pub trait Dispose: Send + Sync {
    /// Performs cleanup. A returned error is collected into the joined
    /// disposal error of the owning close.
    fn dispose(&self) -> Result<(), BoxError>;
}

/// Context-aware disposal.
///
/// The richer of the two disposer shapes: the hook receives the owning
/// scope's [`Context`], bounded by any caller-supplied deadline, so
/// teardown can honour cancellation. Register with
/// `Registration::disposable_with_context`; when a type implements both
/// traits, pick this one at registration.
///
/// # Examples
///
/// ```rust
/// use rivet_di::{BoxError, Context, ContextDispose};
///
/// struct Connection;
///
/// impl ContextDispose for Connection {
///     fn dispose(&self, ctx: &Context) -> Result<(), BoxError> {
///         if ctx.is_cancelled() {
///             // Skip the graceful handshake, drop hard.
///             return Ok(());
///         }
///         // Graceful shutdown...
///         Ok(())
///     }
/// }
/// ```
pub trait ContextDispose: Send + Sync {
    /// Performs cleanup with access to the owning scope's context.
    fn dispose(&self, ctx: &Context) -> Result<(), BoxError>;
}
