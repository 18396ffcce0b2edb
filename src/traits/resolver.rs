//! The resolution surface shared by providers and scopes.

use std::sync::Arc;

use crate::error::DiResult;
use crate::provider::Scope;
use crate::signature::DepSet;

/// Service resolution interface.
///
/// Implemented by both `ServiceProvider` (which resolves through its root
/// scope) and `Scope`, making them interchangeable at call sites. Scoped
/// services resolve in the scope the call was made on; singletons always
/// resolve in the provider-wide store.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use rivet_di::{Resolver, ServiceCollection};
///
/// struct Config { url: String }
/// struct Repo { config: Arc<Config> }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Config { url: "postgres://localhost".into() });
/// services.add_singleton_ctor(|config: Arc<Config>| Repo { config });
///
/// let provider = services.build().unwrap();
/// let repo = provider.get::<Repo>().unwrap();
/// assert_eq!(repo.config.url, "postgres://localhost");
/// ```
pub trait Resolver {
    /// The scope resolutions run against.
    #[doc(hidden)]
    fn resolving_scope(&self) -> &Scope;

    /// Resolves the plain registration of `T`.
    ///
    /// `T` may be a concrete type or a `dyn Trait` object type.
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.resolving_scope().top_get::<T>()
    }

    /// Resolves the keyed registration of `T`.
    fn get_keyed<T: ?Sized + Send + Sync + 'static>(&self, key: &'static str) -> DiResult<Arc<T>> {
        self.resolving_scope().top_get_keyed::<T>(key)
    }

    /// Resolves every member of group `group` for type `T`, in registration
    /// order. An unknown group yields an empty vector, not an error.
    fn get_group<T: ?Sized + Send + Sync + 'static>(
        &self,
        group: &'static str,
    ) -> DiResult<Vec<Arc<T>>> {
        self.resolving_scope().top_get_group::<T>(group)
    }

    /// Resolves the constructor parameters of `f` and calls it.
    ///
    /// The closure never has to be registered; its dependencies are
    /// resolved against this scope with the usual lifetime rules, and the
    /// runtime cycle guard covers constructors the build-time validator
    /// never saw.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use rivet_di::{Resolver, ServiceCollection};
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(21u64);
    ///
    /// let provider = services.build().unwrap();
    /// let doubled = provider.invoke(|n: Arc<u64>| *n * 2).unwrap();
    /// assert_eq!(doubled, 42);
    /// ```
    fn invoke<D, R, F>(&self, f: F) -> DiResult<R>
    where
        D: DepSet,
        F: FnOnce(D) -> R,
    {
        self.resolving_scope().invoke_inner(f)
    }

    /// Resolves the plain registration of `T`, panicking on failure.
    ///
    /// Use when the service is known to be registered and a configuration
    /// error should fail fast.
    fn get_required<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>().unwrap_or_else(|e| {
            panic!("failed to resolve {}: {e}", std::any::type_name::<T>())
        })
    }

    /// Resolves the keyed registration of `T`, panicking on failure.
    fn get_keyed_required<T: ?Sized + Send + Sync + 'static>(&self, key: &'static str) -> Arc<T> {
        self.get_keyed::<T>(key).unwrap_or_else(|e| {
            panic!(
                "failed to resolve {} (key {key:?}): {e}",
                std::any::type_name::<T>()
            )
        })
    }
}
