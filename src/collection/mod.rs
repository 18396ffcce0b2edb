//! Service collection: the registration surface.
//!
//! Services are registered on a [`ServiceCollection`] and frozen into a
//! `ServiceProvider` by [`build`](ServiceCollection::build). Registration
//! is single-threaded by design; the built provider is fully thread-safe.

use std::sync::Arc;

use crate::context::Context;
use crate::decoration::Decorator;
use crate::descriptor::{
    downcast_arc, erase_arc, AnyArc, CtorFn, Descriptor, DisposeHook, DisposerFn, OutputDef,
    ProjectFn, ServiceDescriptor,
};
use crate::error::{BoxError, DiError, DiResult};
use crate::key::{key_is_valid, key_of, keyed_of, Key};
use crate::lifetime::Lifetime;
use crate::options::ProviderOptions;
use crate::provider::{InjectionContext, ServiceProvider};
use crate::registry::Registry;
use crate::signature::{DepSet, OutSet};
use crate::traits::{ContextDispose, Dispose};

mod module_system;
pub use module_system::ServiceModule;

/// Builder for a service provider.
///
/// Registration methods return a [`Registration`] builder that commits when
/// it goes out of scope, so options chain naturally off the call:
///
/// ```rust
/// use std::sync::Arc;
/// use rivet_di::{Resolver, ServiceCollection};
///
/// trait Greeter: Send + Sync {
///     fn hello(&self) -> String;
/// }
///
/// struct EnglishGreeter;
/// impl Greeter for EnglishGreeter {
///     fn hello(&self) -> String {
///         "hello".into()
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_singleton_ctor(|_: ()| EnglishGreeter)
///     .bind::<dyn Greeter>(|greeter| greeter);
///
/// let provider = services.build().unwrap();
/// assert_eq!(provider.get_required::<dyn Greeter>().hello(), "hello");
/// ```
///
/// Invalid registrations (duplicates, lifetime conflicts, bad keys) are
/// queued and surfaced as the error of `build()`.
pub struct ServiceCollection {
    registry: Registry,
    pending_errors: Vec<DiError>,
}

impl ServiceCollection {
    /// Creates an empty service collection.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            pending_errors: Vec::new(),
        }
    }

    // ----- Concrete type registrations -----

    /// Registers a prebuilt instance as a singleton.
    ///
    /// The value is wrapped as a nullary constructor returning it, so it
    /// participates in the registry and graph like any other registration.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rivet_di::{Resolver, ServiceCollection};
    ///
    /// struct Config { database_url: String }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Config {
    ///     database_url: "postgres://localhost".into(),
    /// });
    ///
    /// let provider = services.build().unwrap();
    /// assert_eq!(provider.get_required::<Config>().database_url, "postgres://localhost");
    /// ```
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> Registration<'_, T> {
        self.add_singleton_arc(Arc::new(value))
    }

    /// Registers a prebuilt shared instance as a singleton; accepts trait
    /// objects (`Arc<dyn Trait>`).
    pub fn add_singleton_arc<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        value: Arc<T>,
    ) -> Registration<'_, T> {
        let any = erase_arc(value);
        let ctor: CtorFn = Arc::new(move |_ctx: &InjectionContext| Ok(vec![any.clone()]));
        self.register::<T>(Lifetime::Singleton, ctor, Vec::new())
    }

    /// Registers a singleton constructor.
    ///
    /// The constructor's parameters are a [`DepSet`]: `()`, a single
    /// dependency, a tuple of dependencies, or a hand-written parameter
    /// object with keyed/grouped/optional modifiers. It runs at most once,
    /// eagerly during build.
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
    /// let db = provider.get_required::<Database>();
    /// assert!(Arc::ptr_eq(&db.logger, &provider.get_required::<Logger>()));
    /// ```
    pub fn add_singleton_ctor<T, D, F>(&mut self, ctor: F) -> Registration<'_, T>
    where
        T: Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> T + Send + Sync + 'static,
    {
        self.add_ctor(Lifetime::Singleton, ctor)
    }

    /// Registers a scoped constructor: one instance per scope, cached for
    /// the scope's lifetime.
    pub fn add_scoped_ctor<T, D, F>(&mut self, ctor: F) -> Registration<'_, T>
    where
        T: Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> T + Send + Sync + 'static,
    {
        self.add_ctor(Lifetime::Scoped, ctor)
    }

    /// Registers a transient constructor: a fresh instance per resolution,
    /// never cached.
    pub fn add_transient_ctor<T, D, F>(&mut self, ctor: F) -> Registration<'_, T>
    where
        T: Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> T + Send + Sync + 'static,
    {
        self.add_ctor(Lifetime::Transient, ctor)
    }

    fn add_ctor<T, D, F>(&mut self, lifetime: Lifetime, ctor: F) -> Registration<'_, T>
    where
        T: Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> T + Send + Sync + 'static,
    {
        let ctor: CtorFn = Arc::new(move |ctx: &InjectionContext| {
            let deps = D::resolve(ctx)?;
            Ok(vec![erase_arc(Arc::new(ctor(deps)))])
        });
        self.register::<T>(lifetime, ctor, D::signature())
    }

    /// Registers a fallible singleton constructor. A returned error is
    /// surfaced as a construction failure (at build, since singletons are
    /// eager).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rivet_di::{BoxError, ServiceCollection};
    ///
    /// struct Listener { port: u16 }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_try_ctor(|_: ()| -> Result<Listener, BoxError> {
    ///     Ok(Listener { port: 8080 })
    /// });
    ///
    /// assert!(services.build().is_ok());
    /// ```
    pub fn add_singleton_try_ctor<T, D, F>(&mut self, ctor: F) -> Registration<'_, T>
    where
        T: Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.add_try_ctor(Lifetime::Singleton, ctor)
    }

    /// Registers a fallible scoped constructor.
    pub fn add_scoped_try_ctor<T, D, F>(&mut self, ctor: F) -> Registration<'_, T>
    where
        T: Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.add_try_ctor(Lifetime::Scoped, ctor)
    }

    /// Registers a fallible transient constructor.
    pub fn add_transient_try_ctor<T, D, F>(&mut self, ctor: F) -> Registration<'_, T>
    where
        T: Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.add_try_ctor(Lifetime::Transient, ctor)
    }

    fn add_try_ctor<T, D, F>(&mut self, lifetime: Lifetime, ctor: F) -> Registration<'_, T>
    where
        T: Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let ctor: CtorFn = Arc::new(move |ctx: &InjectionContext| {
            let deps = D::resolve(ctx)?;
            let value = ctor(deps).map_err(|source| DiError::Construction {
                type_name: std::any::type_name::<T>(),
                source,
            })?;
            Ok(vec![erase_arc(Arc::new(value))])
        });
        self.register::<T>(lifetime, ctor, D::signature())
    }

    // ----- Interface registrations -----

    /// Registers a singleton constructor for an interface type.
    ///
    /// The constructor returns the trait object directly; use this when the
    /// concrete type should stay private. To publish one concrete
    /// registration under interfaces, prefer [`Registration::bind`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use rivet_di::{Resolver, ServiceCollection};
    ///
    /// trait Clock: Send + Sync {
    ///     fn now(&self) -> u64;
    /// }
    ///
    /// struct FixedClock;
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> u64 {
    ///         42
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_impl(|_: ()| Arc::new(FixedClock) as Arc<dyn Clock>);
    ///
    /// let provider = services.build().unwrap();
    /// assert_eq!(provider.get_required::<dyn Clock>().now(), 42);
    /// ```
    pub fn add_singleton_impl<I, D, F>(&mut self, ctor: F) -> Registration<'_, I>
    where
        I: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> Arc<I> + Send + Sync + 'static,
    {
        self.add_impl(Lifetime::Singleton, ctor)
    }

    /// Registers a scoped constructor for an interface type.
    pub fn add_scoped_impl<I, D, F>(&mut self, ctor: F) -> Registration<'_, I>
    where
        I: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> Arc<I> + Send + Sync + 'static,
    {
        self.add_impl(Lifetime::Scoped, ctor)
    }

    /// Registers a transient constructor for an interface type.
    pub fn add_transient_impl<I, D, F>(&mut self, ctor: F) -> Registration<'_, I>
    where
        I: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> Arc<I> + Send + Sync + 'static,
    {
        self.add_impl(Lifetime::Transient, ctor)
    }

    fn add_impl<I, D, F>(&mut self, lifetime: Lifetime, ctor: F) -> Registration<'_, I>
    where
        I: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> Arc<I> + Send + Sync + 'static,
    {
        let ctor: CtorFn = Arc::new(move |ctx: &InjectionContext| {
            let deps = D::resolve(ctx)?;
            Ok(vec![erase_arc(ctor(deps))])
        });
        self.register::<I>(lifetime, ctor, D::signature())
    }

    /// Registers a fallible singleton constructor for an interface type.
    pub fn add_singleton_try_impl<I, D, F>(&mut self, ctor: F) -> Registration<'_, I>
    where
        I: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
    {
        self.add_try_impl(Lifetime::Singleton, ctor)
    }

    /// Registers a fallible scoped constructor for an interface type.
    pub fn add_scoped_try_impl<I, D, F>(&mut self, ctor: F) -> Registration<'_, I>
    where
        I: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
    {
        self.add_try_impl(Lifetime::Scoped, ctor)
    }

    /// Registers a fallible transient constructor for an interface type.
    pub fn add_transient_try_impl<I, D, F>(&mut self, ctor: F) -> Registration<'_, I>
    where
        I: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
    {
        self.add_try_impl(Lifetime::Transient, ctor)
    }

    fn add_try_impl<I, D, F>(&mut self, lifetime: Lifetime, ctor: F) -> Registration<'_, I>
    where
        I: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(D) -> Result<Arc<I>, BoxError> + Send + Sync + 'static,
    {
        let ctor: CtorFn = Arc::new(move |ctx: &InjectionContext| {
            let deps = D::resolve(ctx)?;
            let value = ctor(deps).map_err(|source| DiError::Construction {
                type_name: std::any::type_name::<I>(),
                source,
            })?;
            Ok(vec![erase_arc(value)])
        });
        self.register::<I>(lifetime, ctor, D::signature())
    }

    // ----- Multi-output registrations -----

    /// Registers a constructor producing several services at once.
    ///
    /// All outputs of an [`OutSet`] share a single invocation per lifetime
    /// tick: resolving any one of them materializes the whole set. Builder
    /// options apply to the first output only; per-output keys and groups
    /// come from the `OutSet` implementation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rivet_di::{Resolver, ServiceCollection};
    ///
    /// struct Reader(u8);
    /// struct Writer(u8);
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_bundle(|_: ()| (Reader(1), Writer(2)));
    ///
    /// let provider = services.build().unwrap();
    /// assert_eq!(provider.get_required::<Reader>().0, 1);
    /// assert_eq!(provider.get_required::<Writer>().0, 2);
    /// ```
    pub fn add_singleton_bundle<B, D, F>(&mut self, ctor: F) -> Registration<'_, ()>
    where
        B: OutSet + 'static,
        D: DepSet,
        F: Fn(D) -> B + Send + Sync + 'static,
    {
        self.add_bundle(Lifetime::Singleton, ctor)
    }

    /// Registers a scoped multi-output constructor.
    pub fn add_scoped_bundle<B, D, F>(&mut self, ctor: F) -> Registration<'_, ()>
    where
        B: OutSet + 'static,
        D: DepSet,
        F: Fn(D) -> B + Send + Sync + 'static,
    {
        self.add_bundle(Lifetime::Scoped, ctor)
    }

    /// Registers a transient multi-output constructor.
    pub fn add_transient_bundle<B, D, F>(&mut self, ctor: F) -> Registration<'_, ()>
    where
        B: OutSet + 'static,
        D: DepSet,
        F: Fn(D) -> B + Send + Sync + 'static,
    {
        self.add_bundle(Lifetime::Transient, ctor)
    }

    fn add_bundle<B, D, F>(&mut self, lifetime: Lifetime, ctor: F) -> Registration<'_, ()>
    where
        B: OutSet + 'static,
        D: DepSet,
        F: Fn(D) -> B + Send + Sync + 'static,
    {
        let ctor: CtorFn = Arc::new(move |ctx: &InjectionContext| {
            let deps = D::resolve(ctx)?;
            Ok(ctor(deps)
                .into_instances()
                .into_iter()
                .map(|erased| erased.any)
                .collect())
        });

        let outputs = B::outputs()
            .into_iter()
            .enumerate()
            .map(|(index, spec)| PendingOutput {
                key: match spec.key {
                    Some(k) => Key::Keyed(spec.ty, spec.type_name, k),
                    None => Key::Type(spec.ty, spec.type_name),
                },
                own_key: spec.key,
                group: spec.group,
                source: index,
                project: None,
                inherit: index == 0 && spec.key.is_none() && spec.group.is_none(),
            })
            .collect();

        Registration {
            collection: self,
            pending: Some(Pending {
                lifetime,
                ctor,
                display_name: std::any::type_name::<B>(),
                signature: D::signature(),
                outputs,
                key: None,
                group: None,
                bound: false,
                dispose_hook: None,
                effect: false,
            }),
            _marker: std::marker::PhantomData,
        }
    }

    /// Registers a side-effect singleton: zero outputs, runs exactly once
    /// during build, dependency injection included. Useful for migrations
    /// or other build-time initialization.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use std::sync::Arc;
    /// use rivet_di::{BoxError, ServiceCollection};
    ///
    /// let ran = Arc::new(AtomicBool::new(false));
    /// let flag = ran.clone();
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_build_effect("warmup", move |_: ()| -> Result<(), BoxError> {
    ///     flag.store(true, Ordering::SeqCst);
    ///     Ok(())
    /// });
    ///
    /// let _provider = services.build().unwrap();
    /// assert!(ran.load(Ordering::SeqCst));
    /// ```
    pub fn add_build_effect<D, F>(&mut self, name: &'static str, effect: F) -> &mut Self
    where
        D: DepSet,
        F: Fn(D) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let ctor: CtorFn = Arc::new(move |ctx: &InjectionContext| {
            let deps = D::resolve(ctx)?;
            effect(deps).map_err(|source| DiError::Construction {
                type_name: name,
                source,
            })?;
            Ok(Vec::new())
        });
        let descriptor = Descriptor {
            id: 0,
            lifetime: Lifetime::Singleton,
            key: None,
            group: None,
            ctor,
            display_name: name,
            signature: D::signature(),
            outputs: Vec::new(),
            dispose_hook: None,
            slot: None,
            effect: true,
        };
        if let Err(error) = self.registry.add(descriptor) {
            self.pending_errors.push(error);
        }
        self
    }

    // ----- Decoration -----

    /// Registers a decorator for `T` (concrete or interface type).
    ///
    /// The first parameter receives the prior instance; further
    /// dependencies resolve through `D`. Decorators compose in registration
    /// order: registering `D1` then `D2` yields `D2(D1(base))`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use rivet_di::{Resolver, ServiceCollection};
    ///
    /// struct Greeting(String);
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Greeting("hello".into()));
    /// services.decorate::<Greeting, (), _>(|prev, _| {
    ///     Arc::new(Greeting(format!("{}, world", prev.0)))
    /// });
    ///
    /// let provider = services.build().unwrap();
    /// assert_eq!(provider.get_required::<Greeting>().0, "hello, world");
    /// ```
    pub fn decorate<T, D, F>(&mut self, decorator: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(Arc<T>, D) -> Arc<T> + Send + Sync + 'static,
    {
        self.registry.add_decorator(Decorator::new::<T, D, _>(decorator));
        self
    }

    /// Fallible variant of [`decorate`](Self::decorate); errors surface
    /// like constructor failures.
    pub fn try_decorate<T, D, F>(&mut self, decorator: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        D: DepSet,
        F: Fn(Arc<T>, D) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        self.registry
            .add_decorator(Decorator::new_try::<T, D, _>(decorator));
        self
    }

    // ----- Modules -----

    /// Registers every service of a module.
    pub fn add_module<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self> {
        module.register_services(self)?;
        Ok(self)
    }

    // ----- Registry operations -----

    /// Whether a plain registration for `T` exists.
    pub fn has<T: ?Sized + 'static>(&self) -> bool {
        self.registry.has(&key_of::<T>())
    }

    /// Whether a keyed registration for `T` exists.
    pub fn has_keyed<T: ?Sized + 'static>(&self, key: &'static str) -> bool {
        self.registry.has(&keyed_of::<T>(key))
    }

    /// Removes the plain registration for `T`, along with every other
    /// output of the same constructor. Returns whether anything was
    /// removed.
    pub fn remove<T: ?Sized + 'static>(&mut self) -> bool {
        self.registry.remove(&key_of::<T>())
    }

    /// Removes the keyed registration for `T`.
    pub fn remove_keyed<T: ?Sized + 'static>(&mut self, key: &'static str) -> bool {
        self.registry.remove(&keyed_of::<T>(key))
    }

    /// Introspection snapshot of every registration, in registration order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.registry.service_descriptors()
    }

    // ----- Build -----

    /// Builds the provider with default options: graph validation on,
    /// eager singleton construction, no timeouts.
    pub fn build(self) -> DiResult<ServiceProvider> {
        self.build_with_options(ProviderOptions::default())
    }

    /// Builds the provider with explicit [`ProviderOptions`].
    ///
    /// Surfaces the first queued registration error, runs graph validation
    /// (cycles, captive lifetimes, completeness), then constructs every
    /// singleton in dependency-first order.
    pub fn build_with_options(mut self, options: ProviderOptions) -> DiResult<ServiceProvider> {
        if !self.pending_errors.is_empty() {
            return Err(self.pending_errors.remove(0));
        }
        ServiceProvider::build(self.registry, options)
    }

    fn register<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        lifetime: Lifetime,
        ctor: CtorFn,
        signature: Vec<crate::signature::DepSpec>,
    ) -> Registration<'_, T> {
        Registration {
            collection: self,
            pending: Some(Pending {
                lifetime,
                ctor,
                display_name: std::any::type_name::<T>(),
                signature,
                outputs: vec![PendingOutput {
                    key: key_of::<T>(),
                    own_key: None,
                    group: None,
                    source: 0,
                    project: None,
                    inherit: true,
                }],
                key: None,
                group: None,
                bound: false,
                dispose_hook: None,
                effect: false,
            }),
            _marker: std::marker::PhantomData,
        }
    }

    fn commit(&mut self, pending: Pending) {
        if let Err(error) = self.try_commit(pending) {
            self.pending_errors.push(error);
        }
    }

    fn try_commit(&mut self, pending: Pending) -> DiResult<()> {
        if let Some(key) = pending.key {
            if !key_is_valid(key) {
                return Err(DiError::InvalidKey { key: key.into() });
            }
        }
        if let Some(group) = pending.group {
            if group.is_empty() {
                return Err(DiError::EmptyGroupName);
            }
        }
        if pending.key.is_some() && pending.group.is_some() {
            return Err(DiError::KeyGroupConflict {
                type_name: pending.display_name,
            });
        }

        let mut outputs = Vec::with_capacity(pending.outputs.len());
        for output in pending.outputs {
            if let Some(own) = output.own_key {
                if !key_is_valid(own) {
                    return Err(DiError::InvalidKey { key: own.into() });
                }
            }
            let effective_key = output.own_key.or(if output.inherit { pending.key } else { None });
            let effective_group = output.group.or(if output.inherit { pending.group } else { None });
            let key = match effective_key {
                Some(k) => Key::Keyed(output.key.type_id(), output.key.display_name(), k),
                None => output.key,
            };
            outputs.push(OutputDef {
                key,
                group: effective_group,
                source: output.source,
                project: output.project,
            });
        }

        let descriptor = Descriptor {
            id: 0,
            lifetime: pending.lifetime,
            key: pending.key,
            group: pending.group,
            ctor: pending.ctor,
            display_name: pending.display_name,
            signature: pending.signature,
            outputs,
            dispose_hook: pending.dispose_hook,
            slot: None,
            effect: pending.effect,
        };
        self.registry.add(descriptor).map(|_| ())
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

struct PendingOutput {
    key: Key,
    /// Key declared by an `OutputSpec`, validated at commit.
    own_key: Option<&'static str>,
    group: Option<&'static str>,
    source: usize,
    project: Option<ProjectFn>,
    /// Whether builder-level `named`/`in_group` options apply to this
    /// output.
    inherit: bool,
}

struct Pending {
    lifetime: Lifetime,
    ctor: CtorFn,
    display_name: &'static str,
    signature: Vec<crate::signature::DepSpec>,
    outputs: Vec<PendingOutput>,
    key: Option<&'static str>,
    group: Option<&'static str>,
    bound: bool,
    dispose_hook: Option<DisposeHook>,
    effect: bool,
}

/// In-flight registration, committed when dropped.
///
/// Returned by every `add_*` method; chain options off it before the
/// statement ends. Conflicts and invalid options are queued on the
/// collection and surfaced by `build()`.
pub struct Registration<'a, T: ?Sized> {
    collection: &'a mut ServiceCollection,
    pending: Option<Pending>,
    _marker: std::marker::PhantomData<fn() -> Box<T>>,
}

impl<'a, T: ?Sized + Send + Sync + 'static> Registration<'a, T> {
    /// Marks this registration as keyed. Keyed registrations are resolved
    /// with `get_keyed` and never satisfy plain lookups.
    pub fn named(mut self, key: &'static str) -> Self {
        if let Some(pending) = self.pending.as_mut() {
            pending.key = Some(key);
        }
        self
    }

    /// Adds this registration to group `group`. Group members are resolved
    /// together with `get_group`, in registration order; transient
    /// registrations are rejected.
    pub fn in_group(mut self, group: &'static str) -> Self {
        if let Some(pending) = self.pending.as_mut() {
            pending.group = Some(group);
        }
        self
    }

    /// Publishes this registration under interface `I` instead of the
    /// concrete type.
    ///
    /// The coercion function is the compile-time proof that `T` implements
    /// `I`; it is almost always the identity closure `|service| service`.
    /// May be called repeatedly to publish under several interfaces; the
    /// constructor still runs once per lifetime tick, and a grouped
    /// registration joins each interface's group exactly once.
    pub fn bind<I>(mut self, coerce: fn(Arc<T>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        if let Some(pending) = self.pending.as_mut() {
            if !pending.bound {
                // The concrete type is not registered once binds exist.
                pending.outputs.clear();
                pending.bound = true;
            }
            let project: ProjectFn = Arc::new(move |raw: &AnyArc| {
                let concrete = downcast_arc::<T>(raw)?;
                Ok(erase_arc(coerce(concrete)))
            });
            pending.outputs.push(PendingOutput {
                key: key_of::<I>(),
                own_key: None,
                group: None,
                source: 0,
                project: Some(project),
                inherit: true,
            });
        }
        self
    }

    /// Records instances of this registration for disposal when the owning
    /// scope (or the provider, for singletons) closes. Disposal runs in
    /// LIFO creation order.
    pub fn disposable(mut self) -> Self
    where
        T: Dispose,
    {
        if let Some(pending) = self.pending.as_mut() {
            pending.dispose_hook = Some(Arc::new(|any: &AnyArc| {
                let service = downcast_arc::<T>(any).ok()?;
                let thunk: DisposerFn = Box::new(move |_ctx: &Context| service.dispose());
                Some((std::any::type_name::<T>(), thunk))
            }));
        }
        self
    }

    /// Context-aware variant of [`disposable`](Self::disposable): the
    /// disposer receives the owning scope's context. When a type implements
    /// both disposal traits, prefer this richer shape.
    pub fn disposable_with_context(mut self) -> Self
    where
        T: ContextDispose,
    {
        if let Some(pending) = self.pending.as_mut() {
            pending.dispose_hook = Some(Arc::new(|any: &AnyArc| {
                let service = downcast_arc::<T>(any).ok()?;
                let thunk: DisposerFn = Box::new(move |ctx: &Context| service.dispose(ctx));
                Some((std::any::type_name::<T>(), thunk))
            }));
        }
        self
    }
}

impl<'a, T: ?Sized> Drop for Registration<'a, T> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.collection.commit(pending);
        }
    }
}
