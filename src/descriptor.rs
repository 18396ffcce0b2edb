//! Service descriptors: the registry's internal record of how to build one
//! or more services.

use std::sync::Arc;

use crate::context::Context;
use crate::error::{BoxError, DiError, DiResult};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::provider::InjectionContext;
use crate::signature::DepSpec;

/// Type-erased shared service instance.
///
/// Every instance is stored double-wrapped as `Arc<Arc<T>>` so the same
/// storage shape works for sized types and `dyn Trait` objects alike; the
/// outer `Arc` is the `dyn Any` handle, the inner one is what callers get.
pub(crate) type AnyArc = Arc<dyn std::any::Any + Send + Sync>;

/// Type-erased constructor: resolves its own dependencies through the
/// injection context and yields the raw output instances.
pub(crate) type CtorFn =
    Arc<dyn for<'a> Fn(&InjectionContext<'a>) -> DiResult<Vec<AnyArc>> + Send + Sync>;

/// Coercion from a raw output to an interface registration (`bind`).
pub(crate) type ProjectFn = Arc<dyn Fn(&AnyArc) -> DiResult<AnyArc> + Send + Sync>;

/// A disposal thunk, run LIFO when the owning scope or provider closes.
pub(crate) type DisposerFn = Box<dyn FnOnce(&Context) -> Result<(), BoxError> + Send>;

/// Builds a disposal thunk for an instance, captured at registration time.
/// Yields `None` when the instance is not of the hooked type (an interface
/// projection, for example).
pub(crate) type DisposeHook =
    Arc<dyn Fn(&AnyArc) -> Option<(&'static str, DisposerFn)> + Send + Sync>;

#[inline(always)]
pub(crate) fn erase_arc<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> AnyArc {
    Arc::new(value)
}

#[inline(always)]
pub(crate) fn downcast_arc<T: ?Sized + Send + Sync + 'static>(any: &AnyArc) -> DiResult<Arc<T>> {
    any.clone()
        .downcast::<Arc<T>>()
        .map(|outer| (*outer).clone())
        .map_err(|_| DiError::TypeMismatch {
            type_name: std::any::type_name::<T>(),
        })
}

/// One resolvable output of a descriptor.
pub(crate) struct OutputDef {
    /// Registry key this output is published under.
    pub(crate) key: Key,
    /// Effective group membership of this output, if any.
    pub(crate) group: Option<&'static str>,
    /// Index into the constructor's raw result.
    pub(crate) source: usize,
    /// Interface coercion for `bind` registrations.
    pub(crate) project: Option<ProjectFn>,
}

/// Reference to a single output of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutputRef {
    pub(crate) desc: usize,
    pub(crate) output: usize,
}

/// Immutable record for one registration.
///
/// Built by the registration surface, indexed by the registry, and consumed
/// by the validator and the resolution engine. A prebuilt instance is held
/// as a nullary constructor returning it.
pub(crate) struct Descriptor {
    pub(crate) id: usize,
    pub(crate) lifetime: Lifetime,
    /// Registration key; mutually exclusive with `group`.
    pub(crate) key: Option<&'static str>,
    /// Group membership; mutually exclusive with `key`.
    pub(crate) group: Option<&'static str>,
    pub(crate) ctor: CtorFn,
    /// Primary type name, for diagnostics and error paths.
    pub(crate) display_name: &'static str,
    /// Declared dependencies, used for build-time graph validation.
    pub(crate) signature: Vec<DepSpec>,
    pub(crate) outputs: Vec<OutputDef>,
    pub(crate) dispose_hook: Option<DisposeHook>,
    /// Cache slot in the singleton store or the per-scope store, assigned
    /// when the registry is frozen. Transients have none.
    pub(crate) slot: Option<usize>,
    /// Build effect: zero outputs, runs exactly once during build.
    pub(crate) effect: bool,
}

/// Introspection view of a registered service, in registration order.
///
/// # Examples
///
/// ```rust
/// use rivet_di::{Lifetime, ServiceCollection};
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(8080u16);
///
/// let descriptors = services.descriptors();
/// assert_eq!(descriptors.len(), 1);
/// assert_eq!(descriptors[0].lifetime, Lifetime::Singleton);
/// assert!(descriptors[0].type_name().contains("u16"));
/// ```
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// The service key this registration is published under.
    pub key: Key,
    /// Service lifetime.
    pub lifetime: Lifetime,
    /// Group membership, if any.
    pub group: Option<&'static str>,
}

impl ServiceDescriptor {
    /// The human-readable type name.
    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    /// Whether this is a keyed registration.
    pub fn is_keyed(&self) -> bool {
        self.key.service_key().is_some()
    }
}
