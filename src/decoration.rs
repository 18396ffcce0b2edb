//! Service decoration.
//!
//! A decorator wraps an instance after its constructor runs: the first
//! parameter receives the prior instance, any further dependencies resolve
//! through a [`DepSet`], and the return value replaces the instance seen by
//! consumers. Decorators attach to a type identity (concrete or interface)
//! and compose in registration order, so registering `D1` then `D2` yields
//! `D2(D1(base))`.

use std::any::TypeId;
use std::sync::Arc;

use crate::descriptor::{downcast_arc, erase_arc, AnyArc};
use crate::error::{BoxError, DiError, DiResult};
use crate::provider::InjectionContext;
use crate::signature::{DepSet, DepSpec};

pub(crate) type DecorateFn =
    Arc<dyn for<'a> Fn(AnyArc, &InjectionContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// Type-erased decorator record.
#[derive(Clone)]
pub(crate) struct Decorator {
    pub(crate) ty: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) apply: DecorateFn,
    /// Extra dependencies, validated like constructor dependencies.
    pub(crate) signature: Vec<DepSpec>,
}

impl Decorator {
    pub(crate) fn new<T, D, F>(f: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(Arc<T>, D) -> Arc<T> + Send + Sync + 'static,
    {
        Self::new_try::<T, D, _>(move |prev, deps| Ok(f(prev, deps)))
    }

    pub(crate) fn new_try<T, D, F>(f: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(Arc<T>, D) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        let apply: DecorateFn = Arc::new(move |any: AnyArc, ctx: &InjectionContext| {
            let prev = downcast_arc::<T>(&any)?;
            let deps = D::resolve(ctx)?;
            let next = f(prev, deps).map_err(|source| DiError::Construction {
                type_name: std::any::type_name::<T>(),
                source,
            })?;
            Ok(erase_arc(next))
        });
        Self {
            ty: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            apply,
            signature: D::signature(),
        }
    }

    pub(crate) fn decorate(&self, prev: AnyArc, ctx: &InjectionContext<'_>) -> DiResult<AnyArc> {
        (self.apply)(prev, ctx)
    }
}

/// Applies a decorator chain in registration order.
pub(crate) fn apply_chain(
    decorators: &[Decorator],
    mut instance: AnyArc,
    ctx: &InjectionContext<'_>,
) -> DiResult<AnyArc> {
    for decorator in decorators {
        instance = decorator.decorate(instance, ctx)?;
    }
    Ok(instance)
}
