//! Scopes: nodes of the lifetime tree.
//!
//! A scope owns its scoped instances, the disposables created within it,
//! and its child scopes. Closing a scope (explicitly or through context
//! cancellation) closes live children depth-first, then runs the scope's
//! disposers in LIFO creation order.

use std::any::TypeId;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::context::Context;
use crate::decoration::{apply_chain, Decorator};
use crate::descriptor::{downcast_arc, erase_arc, AnyArc, Descriptor, DisposerFn};
use crate::error::{BoxError, DiError, DiResult};
use crate::internal::{DisposeBag, ResolveGuard};
use crate::key::{key_is_valid, key_of, keyed_of, GroupKey, Key};
use crate::lifetime::Lifetime;
use crate::signature::DepSet;
use crate::traits::Resolver;

use super::{InjectionContext, ProviderInner, ServiceProvider};

/// A node in the scope tree.
///
/// Cloning a `Scope` yields another handle to the same node (it does not
/// create a child; use [`create_scope`](Scope::create_scope) for that).
/// Scoped services resolve and cache here; singletons delegate to the
/// provider-wide store; transients are constructed per resolution and
/// recorded here for disposal.
///
/// # Examples
///
/// ```rust
/// use rivet_di::{Context, Resolver, ServiceCollection};
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// #[derive(Debug)]
/// struct RequestId(u64);
///
/// static NEXT: AtomicU64 = AtomicU64::new(0);
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_ctor(|_: ()| RequestId(NEXT.fetch_add(1, Ordering::SeqCst)));
///
/// let provider = services.build().unwrap();
/// let scope_a = provider.create_scope(&Context::new()).unwrap();
/// let scope_b = provider.create_scope(&Context::new()).unwrap();
///
/// let a1 = scope_a.get_required::<RequestId>();
/// let a2 = scope_a.get_required::<RequestId>();
/// let b = scope_b.get_required::<RequestId>();
///
/// assert_eq!(a1.0, a2.0); // same scope, same instance
/// assert_ne!(a1.0, b.0); // different scope, fresh instance
///
/// scope_a.close().unwrap();
/// assert!(scope_a.get::<RequestId>().unwrap_err().is_disposed());
/// ```
#[derive(Clone)]
pub struct Scope {
    pub(crate) inner: Arc<ScopeInner>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("is_root", &self.inner.is_root)
            .field("disposed", &self.inner.disposed.load(Ordering::Relaxed))
            .finish()
    }
}

pub(crate) struct ScopeInner {
    pub(crate) id: u64,
    pub(crate) provider: Arc<ProviderInner>,
    /// Strong parent link: a child keeps its ancestors alive, so a scope
    /// can never outlive its parent's state.
    parent: Option<Arc<ScopeInner>>,
    context: Context,
    cells: Box<[OnceCell<Vec<AnyArc>>]>,
    disposers: Mutex<DisposeBag>,
    children: Mutex<Vec<(u64, Weak<ScopeInner>)>>,
    disposed: AtomicBool,
    /// Fresh post-build decorator chains; root scope stays undecorated.
    scope_decorators: RwLock<HashMap<TypeId, Vec<Decorator>>>,
    is_root: bool,
}

impl Scope {
    pub(crate) fn new_root(provider: Arc<ProviderInner>, context: Context) -> Self {
        let cells = Self::fresh_cells(&provider);
        Self {
            inner: Arc::new(ScopeInner {
                id: provider.next_scope_id(),
                provider,
                parent: None,
                context,
                cells,
                disposers: Mutex::new(DisposeBag::default()),
                children: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
                scope_decorators: RwLock::new(HashMap::new()),
                is_root: true,
            }),
        }
    }

    fn fresh_cells(provider: &ProviderInner) -> Box<[OnceCell<Vec<AnyArc>>]> {
        (0..provider.registry.scoped_slots)
            .map(|_| OnceCell::new())
            .collect::<Vec<_>>()
            .into_boxed_slice()
    }

    /// Opaque unique identifier of this scope.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The derived context bounding this scope's lifetime.
    pub fn context(&self) -> Context {
        self.inner.context.clone()
    }

    /// Creates a child scope bound to `ctx`.
    ///
    /// The scope stores a derived context: cancelling `ctx` (or a deadline
    /// passing) triggers the same disposal path as [`close`](Scope::close).
    pub fn create_scope(&self, ctx: &Context) -> DiResult<Scope> {
        self.check_open()?;
        let derived = ctx.child();
        let child = Scope {
            inner: Arc::new(ScopeInner {
                id: self.inner.provider.next_scope_id(),
                provider: self.inner.provider.clone(),
                parent: Some(self.inner.clone()),
                context: derived.clone(),
                cells: Self::fresh_cells(&self.inner.provider),
                disposers: Mutex::new(DisposeBag::default()),
                children: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
                scope_decorators: RwLock::new(HashMap::new()),
                is_root: false,
            }),
        };
        self.inner
            .children
            .lock()
            .push((child.inner.id, Arc::downgrade(&child.inner)));

        // Watcher: context cancellation disposes the scope. Close is
        // idempotent, so racing an explicit close is harmless.
        let weak = Arc::downgrade(&child.inner);
        derived.on_cancel(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                let scope = Scope { inner };
                if let Err(error) = scope.close() {
                    warn!(scope = scope.id(), %error, "disposal after cancellation failed");
                }
            }
        }));
        Ok(child)
    }

    /// Closes this scope: children first (depth-first), then this scope's
    /// disposers in LIFO creation order. Idempotent; a second call returns
    /// `Ok` without re-invoking anything. Disposer failures are collected
    /// into a joined error, never short-circuited.
    pub fn close(&self) -> DiResult<()> {
        let errors = self.close_collect(true);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DiError::Disposal { errors })
        }
    }

    pub(crate) fn close_collect(&self, detach: bool) -> Vec<DiError> {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }
        let mut errors = Vec::new();

        let children: Vec<Scope> = self
            .inner
            .children
            .lock()
            .drain(..)
            .filter_map(|(_, weak)| weak.upgrade().map(|inner| Scope { inner }))
            .collect();
        for child in children {
            errors.extend(child.close_collect(false));
        }

        let mut bag = std::mem::take(&mut *self.inner.disposers.lock());
        bag.dispose_all(&self.inner.context, &mut errors);

        // Release watchers and deadline threads tied to this scope. On an
        // explicit close the disposers above saw the live context; on a
        // cancellation-triggered close this is a no-op.
        self.inner.context.cancel();

        if detach {
            if let Some(parent) = &self.inner.parent {
                parent.children.lock().retain(|(id, _)| *id != self.inner.id);
            }
        }
        errors
    }

    /// Installs a fresh decorator chain for `T` in this scope.
    ///
    /// Applies to scoped and transient services constructed in this scope,
    /// on top of any decorators registered before build. The root scope
    /// rejects post-build decoration, and each scope accepts at most one
    /// chain per type.
    pub fn decorate<T, D, F>(&self, f: F) -> DiResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(Arc<T>, D) -> Arc<T> + Send + Sync + 'static,
    {
        self.try_decorate::<T, D, _>(move |prev, deps| Ok(f(prev, deps)))
    }

    /// Fallible variant of [`decorate`](Scope::decorate).
    pub fn try_decorate<T, D, F>(&self, f: F) -> DiResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(Arc<T>, D) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        if self.inner.is_root {
            return Err(DiError::DecorateRoot);
        }
        self.check_open()?;
        let mut chains = self.inner.scope_decorators.write();
        if chains.contains_key(&TypeId::of::<T>()) {
            return Err(DiError::AlreadyDecorated {
                type_name: std::any::type_name::<T>(),
            });
        }
        chains.insert(TypeId::of::<T>(), vec![Decorator::new_try::<T, D, _>(f)]);
        Ok(())
    }

    // ----- Resolution engine -----

    fn check_open(&self) -> DiResult<()> {
        if self.inner.provider.disposed.load(Ordering::Acquire) {
            return Err(DiError::ProviderDisposed);
        }
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(DiError::ScopeDisposed);
        }
        Ok(())
    }

    /// Top-level resolution wrapper: disposed gate, resolution timeout,
    /// observer callbacks.
    fn top_level<R>(&self, key: &Key, f: impl FnOnce(&Self) -> DiResult<R>) -> DiResult<R> {
        let started = Instant::now();
        let result = self.check_open().and_then(|_| f(self)).and_then(|value| {
            match self.inner.provider.resolution_timeout {
                Some(timeout) if started.elapsed() > timeout => Err(DiError::ResolutionTimeout {
                    type_name: key.display_name(),
                    timeout,
                }),
                _ => Ok(value),
            }
        });

        let observers = &self.inner.provider.observers;
        if !observers.is_empty() {
            match &result {
                Ok(_) => observers.notify_resolved(key, started.elapsed()),
                Err(error) => observers.notify_failed(key, error),
            }
        }
        result
    }

    pub(crate) fn top_get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let key = key_of::<T>();
        self.top_level(&key, |scope| {
            scope.resolve_key(&key).and_then(|any| downcast_arc::<T>(&any))
        })
    }

    pub(crate) fn top_get_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &'static str,
    ) -> DiResult<Arc<T>> {
        if !key_is_valid(key) {
            return Err(DiError::InvalidKey { key: key.into() });
        }
        let key = keyed_of::<T>(key);
        self.top_level(&key, |scope| {
            scope.resolve_key(&key).and_then(|any| downcast_arc::<T>(&any))
        })
    }

    pub(crate) fn top_get_group<T: ?Sized + Send + Sync + 'static>(
        &self,
        group: &'static str,
    ) -> DiResult<Vec<Arc<T>>> {
        if group.is_empty() {
            return Err(DiError::EmptyGroupName);
        }
        let key = key_of::<T>();
        self.top_level(&key, |scope| {
            let members = scope.resolve_group(&GroupKey::of::<T>(group))?;
            members.iter().map(downcast_arc::<T>).collect()
        })
    }

    pub(crate) fn invoke_inner<D, R, F>(&self, f: F) -> DiResult<R>
    where
        D: DepSet,
        F: FnOnce(D) -> R,
    {
        self.check_open()?;
        let ctx = InjectionContext::new(self, Lifetime::Transient);
        let deps = D::resolve(&ctx)?;
        Ok(f(deps))
    }

    /// Resolves a single service key: registry first, then the built-in
    /// pseudo-services (`Context`, `Scope`, `ServiceProvider`). A user
    /// registration for a built-in type wins.
    pub(crate) fn resolve_key(&self, key: &Key) -> DiResult<AnyArc> {
        if self.inner.provider.dry_run {
            return Err(DiError::DryRun {
                type_name: key.display_name(),
            });
        }
        match self.inner.provider.registry.get(key) {
            Some((descriptor, output)) => {
                let bundle = self.resolve_descriptor(descriptor)?;
                Ok(bundle[output].clone())
            }
            None => self.resolve_builtin(key).ok_or(DiError::NotFound {
                type_name: key.display_name(),
                key: key.service_key(),
            }),
        }
    }

    fn resolve_builtin(&self, key: &Key) -> Option<AnyArc> {
        if key.is_keyed() {
            return None;
        }
        let ty = key.type_id();
        if ty == TypeId::of::<Context>() {
            Some(erase_arc(Arc::new(self.context())))
        } else if ty == TypeId::of::<Scope>() {
            Some(erase_arc(Arc::new(self.clone())))
        } else if ty == TypeId::of::<ServiceProvider>() {
            ServiceProvider::from_inner(self.inner.provider.clone())
                .map(|provider| erase_arc(Arc::new(provider)))
        } else {
            None
        }
    }

    pub(crate) fn resolve_group(&self, group_key: &GroupKey) -> DiResult<Vec<AnyArc>> {
        if self.inner.provider.dry_run {
            return Err(DiError::DryRun {
                type_name: group_key.type_name,
            });
        }
        let members = self.inner.provider.registry.group_members(group_key).to_vec();
        let mut instances = Vec::with_capacity(members.len());
        for member in members {
            let descriptor = self.inner.provider.registry.descriptor(member.desc);
            let bundle = self.resolve_descriptor(descriptor)?;
            instances.push(bundle[member.output].clone());
        }
        Ok(instances)
    }

    /// Materializes a descriptor with its lifetime semantics. The per-slot
    /// `OnceCell` is the once-latch: racing resolvers serialize on it, the
    /// loser adopts the winner's bundle.
    pub(crate) fn resolve_descriptor(&self, descriptor: &Descriptor) -> DiResult<Vec<AnyArc>> {
        match descriptor.lifetime {
            Lifetime::Singleton => {
                let cell = &self.inner.provider.singleton_cells[descriptor.slot.unwrap()];
                if let Some(bundle) = cell.get() {
                    return Ok(bundle.clone());
                }
                let _guard = ResolveGuard::enter(0, descriptor.id, descriptor.display_name)?;
                cell.get_or_try_init(|| self.construct(descriptor)).cloned()
            }
            Lifetime::Scoped => {
                let cell = &self.inner.cells[descriptor.slot.unwrap()];
                if let Some(bundle) = cell.get() {
                    return Ok(bundle.clone());
                }
                let _guard =
                    ResolveGuard::enter(self.inner.id, descriptor.id, descriptor.display_name)?;
                cell.get_or_try_init(|| self.construct(descriptor)).cloned()
            }
            Lifetime::Transient => {
                let _guard =
                    ResolveGuard::enter(self.inner.id, descriptor.id, descriptor.display_name)?;
                self.construct(descriptor)
            }
        }
    }

    /// Invokes the constructor and post-processes the outputs: interface
    /// projection, decorator chains, disposable recording.
    fn construct(&self, descriptor: &Descriptor) -> DiResult<Vec<AnyArc>> {
        let ctx = InjectionContext::new(self, descriptor.lifetime);

        let raw = match catch_unwind(AssertUnwindSafe(|| (descriptor.ctor)(&ctx))) {
            Ok(result) => result?,
            Err(payload) => {
                return Err(DiError::ConstructionPanicked {
                    type_name: descriptor.display_name,
                    message: panic_message(payload),
                })
            }
        };

        let mut bundle = Vec::with_capacity(descriptor.outputs.len());
        for output in &descriptor.outputs {
            let mut instance = match &output.project {
                Some(project) => project(&raw[output.source])?,
                None => raw[output.source].clone(),
            };

            let ty = output.key.type_id();
            instance = apply_chain(
                self.inner.provider.registry.decorators_for(ty),
                instance,
                &ctx,
            )?;

            // Scope-local chains never touch singletons: their cache is
            // provider-wide.
            if descriptor.lifetime != Lifetime::Singleton {
                let chain = self.inner.scope_decorators.read().get(&ty).cloned();
                if let Some(chain) = chain {
                    instance = apply_chain(&chain, instance, &ctx)?;
                }
            }
            bundle.push(instance);
        }

        if let Some(hook) = &descriptor.dispose_hook {
            // Prefer the decorated instance; fall back to the raw output
            // when projection changed its type (interface binds).
            let hooked = bundle.first().and_then(|primary| hook(primary)).or_else(|| {
                raw.first().and_then(|primary| hook(primary))
            });
            if let Some((name, thunk)) = hooked {
                self.record_disposer(descriptor.lifetime, name, thunk);
            }
        }
        Ok(bundle)
    }

    /// Appends a disposer to the owning bag: the provider's for singleton
    /// construction, this scope's otherwise. Hooks landing after close run
    /// immediately, matching the policy for constructors that outlive a
    /// cancellation.
    pub(crate) fn record_disposer(
        &self,
        lifetime: Lifetime,
        name: &'static str,
        thunk: DisposerFn,
    ) {
        if lifetime == Lifetime::Singleton {
            self.inner.provider.record_singleton_disposer(name, thunk);
            return;
        }
        if self.inner.disposed.load(Ordering::Acquire) {
            warn!(scope = self.inner.id, service = name, "instance created after close; disposing immediately");
            if let Err(error) = thunk(&self.inner.context) {
                warn!(service = name, %error, "late disposer failed");
            }
            return;
        }
        self.inner.disposers.lock().push(name, thunk);
    }

    pub(crate) fn has_pending_disposers(&self) -> bool {
        !self.inner.disposers.lock().is_empty()
    }
}

impl Resolver for Scope {
    fn resolving_scope(&self) -> &Scope {
        self
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::Acquire) && !self.disposers.lock().is_empty() {
            warn!(
                scope = self.id,
                "scope dropped with undisposed resources; call close() before dropping"
            );
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
