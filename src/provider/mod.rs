//! Service provider: the root of the container.
//!
//! The provider owns the frozen registry, the singleton store, the root
//! scope, and top-level disposal. It is built by
//! `ServiceCollection::build`, which validates the dependency graph and
//! eagerly constructs every singleton in dependency-first order.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::context::Context;
use crate::descriptor::{AnyArc, DisposerFn, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::graph::GraphValidator;
use crate::internal::DisposeBag;
use crate::observer::Observers;
use crate::options::ProviderOptions;
use crate::registry::Registry;
use crate::traits::Resolver;

mod context;
mod scope;

pub use context::InjectionContext;
pub use scope::Scope;
pub(crate) use scope::ScopeInner;

/// The root container.
///
/// Thread-safe and cheap to clone (`Arc`-backed). Resolutions made directly
/// on the provider run in its root scope, so scoped services are legal here
/// and cache for the provider's whole life.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use rivet_di::{Resolver, ServiceCollection};
///
/// struct Logger;
/// struct Database { logger: Arc<Logger> }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Logger);
/// services.add_singleton_ctor(|logger: Arc<Logger>| Database { logger });
///
/// let provider = services.build().unwrap();
/// let db1 = provider.get_required::<Database>();
/// let db2 = provider.get_required::<Database>();
/// assert!(Arc::ptr_eq(&db1, &db2));
/// provider.close().unwrap();
/// ```
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
    root: Scope,
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("root", &self.root)
            .finish()
    }
}

pub(crate) struct ProviderInner {
    pub(crate) registry: Registry,
    pub(crate) singleton_cells: Box<[OnceCell<Vec<AnyArc>>]>,
    singleton_disposers: Mutex<DisposeBag>,
    pub(crate) observers: Observers,
    pub(crate) resolution_timeout: Option<Duration>,
    pub(crate) dry_run: bool,
    pub(crate) disposed: AtomicBool,
    scope_ids: AtomicU64,
    root_scope: OnceCell<Weak<ScopeInner>>,
    root_context: Context,
}

impl ProviderInner {
    pub(crate) fn next_scope_id(&self) -> u64 {
        self.scope_ids.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn record_singleton_disposer(&self, name: &'static str, thunk: DisposerFn) {
        if self.disposed.load(Ordering::Acquire) {
            warn!(service = name, "singleton created after close; disposing immediately");
            if let Err(error) = thunk(&self.root_context) {
                warn!(service = name, %error, "late disposer failed");
            }
            return;
        }
        self.singleton_disposers.lock().push(name, thunk);
    }
}

impl ServiceProvider {
    /// Validates, eagerly constructs singletons, and produces the provider.
    /// Called by `ServiceCollection::build*`.
    pub(crate) fn build(mut registry: Registry, options: ProviderOptions) -> DiResult<Self> {
        registry.freeze();

        let eager_order = if options.validate_on_build {
            let order = GraphValidator::new(&registry).validate()?;
            order
                .into_iter()
                .filter(|&id| {
                    registry.descriptor(id).lifetime == crate::Lifetime::Singleton
                })
                .collect()
        } else {
            registry.singleton_ids()
        };

        let singleton_cells = (0..registry.singleton_slots)
            .map(|_| OnceCell::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let root_context = Context::new();
        let inner = Arc::new(ProviderInner {
            registry,
            singleton_cells,
            singleton_disposers: Mutex::new(DisposeBag::default()),
            observers: options.observers,
            resolution_timeout: options.resolution_timeout,
            dry_run: options.dry_run,
            disposed: AtomicBool::new(false),
            scope_ids: AtomicU64::new(1),
            root_scope: OnceCell::new(),
            root_context: root_context.clone(),
        });

        let root = Scope::new_root(inner.clone(), root_context.child());
        let _ = inner.root_scope.set(Arc::downgrade(&root.inner));
        let provider = Self { inner, root };

        if !provider.inner.dry_run {
            provider.construct_singletons(&eager_order, options.build_timeout)?;
        }
        Ok(provider)
    }

    /// Eager singleton construction, dependency-first. Failures surface at
    /// build; a deadline turns into a build-timeout error naming the
    /// singleton about to be constructed.
    fn construct_singletons(
        &self,
        order: &[usize],
        timeout: Option<Duration>,
    ) -> DiResult<()> {
        let started = Instant::now();
        for &id in order {
            let descriptor = self.inner.registry.descriptor(id);
            if let Some(timeout) = timeout {
                if started.elapsed() > timeout {
                    return Err(DiError::BuildTimeout {
                        type_name: descriptor.display_name,
                        timeout,
                    });
                }
            }
            debug!(service = descriptor.display_name, "constructing singleton");
            self.root.resolve_descriptor(descriptor)?;
        }
        Ok(())
    }

    /// Rebuilds a handle from the shared state; used by the resolution
    /// engine to serve the provider as a built-in service.
    pub(crate) fn from_inner(inner: Arc<ProviderInner>) -> Option<Self> {
        let root = inner.root_scope.get()?.upgrade()?;
        Some(Self {
            inner,
            root: Scope { inner: root },
        })
    }

    /// The root scope of the container.
    pub fn root_scope(&self) -> &Scope {
        &self.root
    }

    /// Creates a scope under the root, bound to `ctx`.
    pub fn create_scope(&self, ctx: &Context) -> DiResult<Scope> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(DiError::ProviderDisposed);
        }
        self.root.create_scope(ctx)
    }

    /// Introspection snapshot of every registration, in registration order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.inner.registry.service_descriptors()
    }

    /// Closes the container: the root scope tree first (cascading to every
    /// live descendant), then the singleton disposers in LIFO creation
    /// order. Idempotent; disposer failures are collected into a joined
    /// error.
    pub fn close(&self) -> DiResult<()> {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut errors = self.root.close_collect(true);

        let mut bag = std::mem::take(&mut *self.inner.singleton_disposers.lock());
        bag.dispose_all(&self.inner.root_context, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DiError::Disposal { errors })
        }
    }
}

impl Clone for ServiceProvider {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            root: self.root.clone(),
        }
    }
}

impl Resolver for ServiceProvider {
    fn resolving_scope(&self) -> &Scope {
        &self.root
    }
}

impl Drop for ServiceProvider {
    fn drop(&mut self) {
        // Last handle going away with pending disposers means close() was
        // forgotten; surface that instead of dropping silently.
        if Arc::strong_count(&self.inner) == 1
            && !self.inner.disposed.load(Ordering::Acquire)
            && (!self.inner.singleton_disposers.lock().is_empty()
                || self.root.has_pending_disposers())
        {
            warn!("provider dropped with undisposed resources; call close() before dropping");
        }
    }
}
