//! Service lifetime definitions.

/// Service lifetimes controlling instance caching behavior.
///
/// Defines how service instances are created, cached, and shared within
/// the container. Lifetimes have a natural ordering: a Singleton outlives
/// a Scoped service, which outlives a Transient. The build-time validator
/// uses that ordering to reject captive dependencies (a longer-lived
/// consumer holding a shorter-lived dependency).
///
/// # Examples
///
/// ```rust
/// use rivet_di::{ServiceCollection, Resolver, Lifetime};
///
/// struct Config { port: u16 }
/// struct RequestId(u64);
///
/// let mut services = ServiceCollection::new();
///
/// // Singleton: one instance for the entire application
/// services.add_singleton(Config { port: 8080 });
///
/// // Scoped: one instance per scope
/// services.add_scoped_ctor(|_: ()| RequestId(7));
///
/// let provider = services.build().unwrap();
/// let config = provider.get_required::<Config>();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifetime {
    /// New instance per resolution, never cached.
    Transient,
    /// Single instance per scope, cached for the scope's lifetime.
    Scoped,
    /// Single instance per root provider, cached until the provider closes.
    Singleton,
}

impl Lifetime {
    /// Whether a consumer with this lifetime may depend on a service with
    /// `dependency`'s lifetime.
    ///
    /// Singleton consumers must not capture Scoped services, and neither may
    /// Transients: both would hold an instance past (or detached from) the
    /// scope that owns it. Every other pairing is allowed, including
    /// Singleton over Transient, where the transient is deliberately
    /// captured for the singleton's whole life.
    pub fn may_depend_on(self, dependency: Lifetime) -> bool {
        !matches!(
            (self, dependency),
            (Lifetime::Singleton, Lifetime::Scoped) | (Lifetime::Transient, Lifetime::Scoped)
        )
    }
}
