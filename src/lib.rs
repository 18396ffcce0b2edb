//! # rivet-di
//!
//! Runtime dependency injection for Rust: lifetimes, a scope tree with
//! context-bound disposal, keyed and grouped services, decorators, and
//! build-time graph validation.
//!
//! ## Features
//!
//! - **Three lifetimes**: Singleton (provider-wide), Scoped (per scope),
//!   Transient (per resolution)
//! - **Declared dependencies**: constructors state their parameters through
//!   [`DepSet`], so the whole graph is validated before anything runs —
//!   cycles and captive dependencies fail at `build()`
//! - **Keyed and grouped registrations**: parallel registrations of one
//!   type by key, or insertion-ordered groups resolved as a sequence
//! - **Scope tree**: scopes own their instances and disposables, close
//!   LIFO, cascade to children, and react to context cancellation
//! - **Decorators**: wrap services at construction, with injected extras
//! - **Thread-safe**: per-slot once-latches mean racing resolvers run each
//!   constructor exactly once
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use rivet_di::{Resolver, ServiceCollection};
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! services.add_transient_ctor(|db: Arc<Database>| UserService { db });
//!
//! let provider = services.build().unwrap();
//! let users = provider.get_required::<UserService>();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Scopes and disposal
//!
//! ```rust
//! use rivet_di::{BoxError, Context, Dispose, Resolver, ServiceCollection};
//!
//! #[derive(Debug)]
//! struct Connection;
//!
//! impl Dispose for Connection {
//!     fn dispose(&self) -> Result<(), BoxError> {
//!         // close the connection
//!         Ok(())
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_scoped_ctor(|_: ()| Connection).disposable();
//!
//! let provider = services.build().unwrap();
//! let ctx = Context::new();
//! let scope = provider.create_scope(&ctx).unwrap();
//! let _conn = scope.get_required::<Connection>();
//!
//! // Cancelling the context disposes the scope, exactly like close().
//! ctx.cancel();
//! assert!(scope.get::<Connection>().unwrap_err().is_disposed());
//! ```
//!
//! ## Interfaces and groups
//!
//! ```rust
//! use std::sync::Arc;
//! use rivet_di::{Resolver, ServiceCollection};
//!
//! trait Handler: Send + Sync {
//!     fn name(&self) -> &'static str;
//! }
//!
//! struct Health;
//! impl Handler for Health {
//!     fn name(&self) -> &'static str { "health" }
//! }
//!
//! struct Metrics;
//! impl Handler for Metrics {
//!     fn name(&self) -> &'static str { "metrics" }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services
//!     .add_singleton_ctor(|_: ()| Health)
//!     .bind::<dyn Handler>(|h| h)
//!     .in_group("routes");
//! services
//!     .add_singleton_ctor(|_: ()| Metrics)
//!     .bind::<dyn Handler>(|h| h)
//!     .in_group("routes");
//!
//! let provider = services.build().unwrap();
//! let routes = provider.get_group::<dyn Handler>("routes").unwrap();
//! let names: Vec<_> = routes.iter().map(|h| h.name()).collect();
//! assert_eq!(names, ["health", "metrics"]);
//! ```

mod collection;
mod context;
mod decoration;
mod descriptor;
mod error;
mod graph;
mod internal;
mod key;
mod lifetime;
mod observer;
mod options;
mod provider;
mod registry;
mod signature;
mod traits;

pub use collection::{Registration, ServiceCollection, ServiceModule};
pub use context::Context;
pub use descriptor::ServiceDescriptor;
pub use error::{BoxError, DiError, DiResult};
pub use key::{key_of, keyed_of, Key};
pub use lifetime::Lifetime;
pub use observer::{DiObserver, TracingObserver};
pub use options::ProviderOptions;
pub use provider::{InjectionContext, Scope, ServiceProvider};
pub use signature::{Dep, DepSet, DepSpec, ErasedService, OutSet, OutputSpec};
pub use traits::{ContextDispose, Dispose, Resolver};
