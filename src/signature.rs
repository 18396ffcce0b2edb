//! Constructor signatures: dependency sets and result sets.
//!
//! Rust has no runtime reflection over function parameters, so the analyzer
//! lives in the type system instead: every parameter shape implements
//! [`Dep`], parameter objects implement [`DepSet`], and multi-output
//! constructors implement [`OutSet`]. The registration surface collects the
//! declared [`DepSpec`]s into the descriptor's signature, which is what the
//! build-time graph validator walks.

use std::any::TypeId;
use std::sync::Arc;

use crate::descriptor::{erase_arc, AnyArc};
use crate::error::DiResult;
use crate::provider::InjectionContext;

/// One declared dependency of a constructor.
///
/// The modifiers mirror the container's field-tag contract: a dependency is
/// plain, keyed, grouped, or optional. Keyed and grouped are set through the
/// dedicated constructors; `optional` combined with `grouped` is a no-op
/// because an absent group already resolves to an empty sequence.
#[derive(Debug, Clone)]
pub struct DepSpec {
    pub(crate) ty: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) key: Option<&'static str>,
    pub(crate) group: Option<&'static str>,
    pub(crate) optional: bool,
}

impl DepSpec {
    /// A required dependency on the plain registration of `T`.
    pub fn required<T: ?Sized + 'static>() -> Self {
        Self {
            ty: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            key: None,
            group: None,
            optional: false,
        }
    }

    /// A required dependency on the keyed registration of `T`.
    pub fn keyed<T: ?Sized + 'static>(key: &'static str) -> Self {
        Self {
            key: Some(key),
            ..Self::required::<T>()
        }
    }

    /// A dependency on every member of group `group` for type `T`.
    pub fn grouped<T: ?Sized + 'static>(group: &'static str) -> Self {
        Self {
            group: Some(group),
            ..Self::required::<T>()
        }
    }

    /// An optional dependency: absent registrations inject `None` instead
    /// of failing.
    pub fn optional<T: ?Sized + 'static>() -> Self {
        Self {
            optional: true,
            ..Self::required::<T>()
        }
    }

    /// An optional dependency on the keyed registration of `T`.
    pub fn optional_keyed<T: ?Sized + 'static>(key: &'static str) -> Self {
        Self {
            key: Some(key),
            optional: true,
            ..Self::required::<T>()
        }
    }
}

/// A single resolvable constructor parameter.
///
/// Implemented for `Arc<T>` (required) and `Option<Arc<T>>` (optional),
/// where `T` may be a concrete type or a `dyn Trait` object. Keyed and
/// grouped dependencies have no parameter shape of their own; they are
/// declared through a hand-written [`DepSet`] implementation.
pub trait Dep: Sized {
    /// The declared dependency, consumed by graph validation.
    fn spec() -> DepSpec;
    /// Materializes the parameter.
    fn resolve(ctx: &InjectionContext<'_>) -> DiResult<Self>;
}

impl<T: ?Sized + Send + Sync + 'static> Dep for Arc<T> {
    fn spec() -> DepSpec {
        DepSpec::required::<T>()
    }

    fn resolve(ctx: &InjectionContext<'_>) -> DiResult<Self> {
        ctx.get::<T>()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Dep for Option<Arc<T>> {
    fn spec() -> DepSpec {
        DepSpec::optional::<T>()
    }

    fn resolve(ctx: &InjectionContext<'_>) -> DiResult<Self> {
        ctx.get_optional::<T>()
    }
}

/// A constructor's full parameter list.
///
/// Implemented out of the box for `()`, for any single [`Dep`] shape, and
/// for tuples of up to eight [`Dep`]s. Hand-implement it for a parameter
/// object when a dependency needs a key, a group, or mixed modifiers:
///
/// ```rust
/// use std::sync::Arc;
/// use rivet_di::{DepSet, DepSpec, DiResult, InjectionContext};
///
/// struct Logger;
/// struct Db(&'static str);
///
/// struct AppDeps {
///     logger: Arc<Logger>,
///     primary: Arc<Db>,
///     metrics: Option<Arc<String>>,
/// }
///
/// impl DepSet for AppDeps {
///     fn signature() -> Vec<DepSpec> {
///         vec![
///             DepSpec::required::<Logger>(),
///             DepSpec::keyed::<Db>("primary"),
///             DepSpec::optional::<String>(),
///         ]
///     }
///
///     fn resolve(ctx: &InjectionContext<'_>) -> DiResult<Self> {
///         Ok(Self {
///             logger: ctx.get()?,
///             primary: ctx.get_keyed("primary")?,
///             metrics: ctx.get_optional()?,
///         })
///     }
/// }
/// ```
///
/// Parameter objects are one level deep; a `DepSet` field inside another
/// `DepSet` is not flattened.
pub trait DepSet: Sized {
    /// Declared dependencies, in resolution order.
    fn signature() -> Vec<DepSpec>;
    /// Resolves every dependency and builds the set.
    fn resolve(ctx: &InjectionContext<'_>) -> DiResult<Self>;
}

impl DepSet for () {
    fn signature() -> Vec<DepSpec> {
        Vec::new()
    }

    fn resolve(_ctx: &InjectionContext<'_>) -> DiResult<Self> {
        Ok(())
    }
}

impl<T: ?Sized + Send + Sync + 'static> DepSet for Arc<T> {
    fn signature() -> Vec<DepSpec> {
        vec![<Arc<T> as Dep>::spec()]
    }

    fn resolve(ctx: &InjectionContext<'_>) -> DiResult<Self> {
        <Arc<T> as Dep>::resolve(ctx)
    }
}

impl<T: ?Sized + Send + Sync + 'static> DepSet for Option<Arc<T>> {
    fn signature() -> Vec<DepSpec> {
        vec![<Option<Arc<T>> as Dep>::spec()]
    }

    fn resolve(ctx: &InjectionContext<'_>) -> DiResult<Self> {
        <Option<Arc<T>> as Dep>::resolve(ctx)
    }
}

macro_rules! impl_dep_set_for_tuple {
    ($($name:ident),+) => {
        impl<$($name: Dep),+> DepSet for ($($name,)+) {
            fn signature() -> Vec<DepSpec> {
                vec![$($name::spec()),+]
            }

            fn resolve(ctx: &InjectionContext<'_>) -> DiResult<Self> {
                Ok(($($name::resolve(ctx)?,)+))
            }
        }
    };
}

impl_dep_set_for_tuple!(D1);
impl_dep_set_for_tuple!(D1, D2);
impl_dep_set_for_tuple!(D1, D2, D3);
impl_dep_set_for_tuple!(D1, D2, D3, D4);
impl_dep_set_for_tuple!(D1, D2, D3, D4, D5);
impl_dep_set_for_tuple!(D1, D2, D3, D4, D5, D6);
impl_dep_set_for_tuple!(D1, D2, D3, D4, D5, D6, D7);
impl_dep_set_for_tuple!(D1, D2, D3, D4, D5, D6, D7, D8);

/// One declared output of a multi-output constructor.
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub(crate) ty: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) key: Option<&'static str>,
    pub(crate) group: Option<&'static str>,
}

impl OutputSpec {
    /// A plain output of type `T`.
    pub fn service<T: ?Sized + 'static>() -> Self {
        Self {
            ty: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            key: None,
            group: None,
        }
    }

    /// A keyed output of type `T`.
    pub fn keyed<T: ?Sized + 'static>(key: &'static str) -> Self {
        Self {
            key: Some(key),
            ..Self::service::<T>()
        }
    }

    /// An output of type `T` joining group `group`.
    pub fn grouped<T: ?Sized + 'static>(group: &'static str) -> Self {
        Self {
            group: Some(group),
            ..Self::service::<T>()
        }
    }
}

/// A type-erased service instance produced by an [`OutSet`].
pub struct ErasedService {
    pub(crate) any: AnyArc,
}

impl ErasedService {
    /// Erases an owned value.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Erases a shared instance; accepts trait objects.
    pub fn from_arc<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            any: erase_arc(value),
        }
    }
}

/// A constructor's result set (multi-output registration).
///
/// All outputs of one constructor share a single invocation per lifetime
/// tick: resolving any of them materializes the whole set at once.
/// Implemented for tuples of owned services; hand-implement it to attach
/// keys or groups to individual outputs:
///
/// ```rust
/// use rivet_di::{ErasedService, OutSet, OutputSpec};
///
/// struct Reader(&'static str);
/// struct Writer(&'static str);
///
/// struct DbPair {
///     reader: Reader,
///     writer: Writer,
/// }
///
/// impl OutSet for DbPair {
///     fn outputs() -> Vec<OutputSpec> {
///         vec![
///             OutputSpec::keyed::<Reader>("replica"),
///             OutputSpec::service::<Writer>(),
///         ]
///     }
///
///     fn into_instances(self) -> Vec<ErasedService> {
///         vec![
///             ErasedService::new(self.reader),
///             ErasedService::new(self.writer),
///         ]
///     }
/// }
/// ```
pub trait OutSet: Send {
    /// Declared outputs, parallel to [`into_instances`](OutSet::into_instances).
    fn outputs() -> Vec<OutputSpec>;
    /// Splits the set into per-output instances.
    fn into_instances(self) -> Vec<ErasedService>;
}

macro_rules! impl_out_set_for_tuple {
    ($(($name:ident, $idx:tt)),+) => {
        impl<$($name: Send + Sync + 'static),+> OutSet for ($($name,)+) {
            fn outputs() -> Vec<OutputSpec> {
                vec![$(OutputSpec::service::<$name>()),+]
            }

            fn into_instances(self) -> Vec<ErasedService> {
                vec![$(ErasedService::new(self.$idx)),+]
            }
        }
    };
}

impl_out_set_for_tuple!((O1, 0), (O2, 1));
impl_out_set_for_tuple!((O1, 0), (O2, 1), (O3, 2));
impl_out_set_for_tuple!((O1, 0), (O2, 1), (O3, 2), (O4, 3));
