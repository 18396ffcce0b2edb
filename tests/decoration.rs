use std::sync::Arc;

use rivet_di::{Context, Resolver, ServiceCollection};

trait Logger: Send + Sync {
    fn describe(&self) -> String;
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn describe(&self) -> String {
        "console".into()
    }
}

#[test]
fn decorators_chain_in_registration_order() {
    struct Tag(String);

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Tag("base".into()));
    sc.decorate::<Tag, (), _>(|prev, _| Arc::new(Tag(format!("d1({})", prev.0))));
    sc.decorate::<Tag, (), _>(|prev, _| Arc::new(Tag(format!("d2({})", prev.0))));

    let sp = sc.build().unwrap();
    assert_eq!(sp.get_required::<Tag>().0, "d2(d1(base))");
}

#[test]
fn decorator_injects_through_wrapper() {
    struct Config {
        level: &'static str,
    }

    struct Wrapper {
        inner: Arc<dyn Logger>,
        config: Arc<Config>,
    }

    impl Logger for Wrapper {
        fn describe(&self) -> String {
            format!("{}@{}", self.inner.describe(), self.config.level)
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Config { level: "debug" });
    sc.add_singleton_impl(|_: ()| Arc::new(ConsoleLogger) as Arc<dyn Logger>);
    sc.decorate::<dyn Logger, Arc<Config>, _>(|inner, config| {
        Arc::new(Wrapper { inner, config }) as Arc<dyn Logger>
    });

    let sp = sc.build().unwrap();
    let logger = sp.get_required::<dyn Logger>();
    // The wrapper sees the originally constructed logger and the
    // registered config.
    assert_eq!(logger.describe(), "console@debug");
}

#[test]
fn singleton_decoration_happens_once() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static WRAPS: AtomicUsize = AtomicUsize::new(0);

    struct Tag(u32);

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Tag(0));
    sc.decorate::<Tag, (), _>(|prev, _| {
        WRAPS.fetch_add(1, Ordering::SeqCst);
        Arc::new(Tag(prev.0 + 1))
    });

    let sp = sc.build().unwrap();
    let a = sp.get_required::<Tag>();
    let b = sp.get_required::<Tag>();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.0, 1);
    assert_eq!(WRAPS.load(Ordering::SeqCst), 1);
}

#[test]
fn failing_decorator_surfaces_as_construction_error() {
    #[derive(Debug)]
    struct Tag;

    let mut sc = ServiceCollection::new();
    sc.add_transient_ctor(|_: ()| Tag);
    sc.try_decorate::<Tag, (), _>(|_prev, _| Err("wrap refused".into()));

    let sp = sc.build().unwrap();
    let error = sp.get::<Tag>().unwrap_err();
    assert!(error.is_construction());
    assert!(error.to_string().contains("wrap refused"));
}

#[test]
fn decorators_apply_to_bound_interfaces() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton_ctor(|_: ()| ConsoleLogger)
        .bind::<dyn Logger>(|l| l);
    sc.decorate::<dyn Logger, (), _>(|inner, _| {
        struct Shout(Arc<dyn Logger>);
        impl Logger for Shout {
            fn describe(&self) -> String {
                self.0.describe().to_uppercase()
            }
        }
        Arc::new(Shout(inner)) as Arc<dyn Logger>
    });

    let sp = sc.build().unwrap();
    assert_eq!(sp.get_required::<dyn Logger>().describe(), "CONSOLE");
}

#[test]
fn root_scope_rejects_post_build_decoration() {
    let mut sc = ServiceCollection::new();
    sc.add_scoped_ctor(|_: ()| ConsoleLogger);

    let sp = sc.build().unwrap();
    let error = sp
        .root_scope()
        .decorate::<ConsoleLogger, (), _>(|prev, _| prev)
        .unwrap_err();
    assert!(error.is_registration());
}

#[test]
fn child_scope_accepts_one_fresh_chain_per_type() {
    struct Tag(String);

    let mut sc = ServiceCollection::new();
    sc.add_scoped_ctor(|_: ()| Tag("base".into()));

    let sp = sc.build().unwrap();
    let scope = sp.create_scope(&Context::new()).unwrap();

    scope
        .decorate::<Tag, (), _>(|prev, _| Arc::new(Tag(format!("scoped({})", prev.0))))
        .unwrap();
    // A second fresh chain for the same type is rejected in this scope.
    assert!(scope
        .decorate::<Tag, (), _>(|prev, _| prev)
        .unwrap_err()
        .is_registration());

    assert_eq!(scope.get_required::<Tag>().0, "scoped(base)");

    // Sibling scopes are undecorated.
    let other = sp.create_scope(&Context::new()).unwrap();
    assert_eq!(other.get_required::<Tag>().0, "base");
}
