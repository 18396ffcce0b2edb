//! Injection context passed to constructors and decorators.

use std::sync::Arc;

use crate::context::Context;
use crate::descriptor::downcast_arc;
use crate::error::DiResult;
use crate::key::{key_is_valid, key_of, keyed_of, GroupKey};
use crate::lifetime::Lifetime;
use crate::traits::{ContextDispose, Dispose};
use crate::DiError;

use super::Scope;

/// Resolution interface handed to constructors, decorators, and `DepSet`
/// implementations.
///
/// Wraps the scope the resolution runs in. Dependencies resolved here do
/// not fire top-level observers or the resolution timeout; those belong to
/// the outermost `get*` call.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use rivet_di::{DepSet, DepSpec, DiResult, InjectionContext, Resolver, ServiceCollection};
///
/// struct Db(&'static str);
/// struct Router { primary: Arc<Db> }
///
/// struct RouterDeps { primary: Arc<Db> }
///
/// impl DepSet for RouterDeps {
///     fn signature() -> Vec<DepSpec> {
///         vec![DepSpec::keyed::<Db>("primary")]
///     }
///     fn resolve(ctx: &InjectionContext<'_>) -> DiResult<Self> {
///         Ok(Self { primary: ctx.get_keyed("primary")? })
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Db("pri")).named("primary");
/// services.add_singleton_ctor(|deps: RouterDeps| Router { primary: deps.primary });
///
/// let provider = services.build().unwrap();
/// assert_eq!(provider.get_required::<Router>().primary.0, "pri");
/// ```
pub struct InjectionContext<'a> {
    scope: &'a Scope,
    /// Lifetime of the descriptor under construction; routes manually
    /// registered disposers to the owning store.
    lifetime: Lifetime,
}

impl<'a> InjectionContext<'a> {
    pub(crate) fn new(scope: &'a Scope, lifetime: Lifetime) -> Self {
        Self { scope, lifetime }
    }

    /// Resolves the plain registration of `T`.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.scope
            .resolve_key(&key_of::<T>())
            .and_then(|any| downcast_arc::<T>(&any))
    }

    /// Resolves the keyed registration of `T`.
    pub fn get_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &'static str,
    ) -> DiResult<Arc<T>> {
        if !key_is_valid(key) {
            return Err(DiError::InvalidKey { key: key.into() });
        }
        self.scope
            .resolve_key(&keyed_of::<T>(key))
            .and_then(|any| downcast_arc::<T>(&any))
    }

    /// Resolves every member of group `group` for `T`, in registration
    /// order. An absent group yields an empty vector.
    pub fn get_group<T: ?Sized + Send + Sync + 'static>(
        &self,
        group: &'static str,
    ) -> DiResult<Vec<Arc<T>>> {
        if group.is_empty() {
            return Err(DiError::EmptyGroupName);
        }
        let members = self.scope.resolve_group(&GroupKey::of::<T>(group))?;
        members.iter().map(downcast_arc::<T>).collect()
    }

    /// Resolves `T` if registered; `Ok(None)` when not found. Errors other
    /// than not-found still propagate.
    pub fn get_optional<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        match self.get::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolves the keyed registration of `T` if present.
    pub fn get_optional_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &'static str,
    ) -> DiResult<Option<Arc<T>>> {
        match self.get_keyed::<T>(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The context of the scope this resolution runs in.
    pub fn context(&self) -> Context {
        self.scope.context()
    }

    /// Registers a disposal hook for `service`, owned by the singleton
    /// store when called during singleton construction, by the resolving
    /// scope otherwise. Hooks run LIFO on close.
    pub fn register_disposer<T: ?Sized + Dispose + 'static>(&self, service: Arc<T>) {
        self.scope.record_disposer(
            self.lifetime,
            std::any::type_name::<T>(),
            Box::new(move |_ctx| service.dispose()),
        );
    }

    /// Context-aware variant of [`register_disposer`](Self::register_disposer).
    pub fn register_context_disposer<T: ?Sized + ContextDispose + 'static>(
        &self,
        service: Arc<T>,
    ) {
        self.scope.record_disposer(
            self.lifetime,
            std::any::type_name::<T>(),
            Box::new(move |ctx| service.dispose(ctx)),
        );
    }
}
