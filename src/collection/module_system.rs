//! Modular service registration.

use crate::error::DiResult;

use super::ServiceCollection;

/// A reusable bundle of service registrations.
///
/// Modules let subsystems own their wiring: each implements this trait and
/// the application composes them with
/// [`ServiceCollection::add_module`](super::ServiceCollection::add_module).
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use rivet_di::{DiResult, Resolver, ServiceCollection, ServiceModule};
///
/// #[derive(Default)]
/// struct UserConfig;
/// struct UserService { _config: Arc<UserConfig> }
///
/// struct UserModule;
///
/// impl ServiceModule for UserModule {
///     fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
///         services.add_singleton(UserConfig);
///         services.add_scoped_ctor(|config: Arc<UserConfig>| UserService { _config: config });
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_module(UserModule).unwrap();
/// let provider = services.build().unwrap();
/// let _users = provider.get_required::<UserService>();
/// ```
pub trait ServiceModule {
    /// Registers this module's services.
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()>;
}
