use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rivet_di::{Resolver, ServiceCollection};

#[test]
fn singleton_returns_same_instance() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(42usize);
    sc.add_singleton("hello".to_string());

    let sp = sc.build().unwrap();

    let num1 = sp.get_required::<usize>();
    let num2 = sp.get_required::<usize>();
    let str1 = sp.get_required::<String>();
    let str2 = sp.get_required::<String>();

    assert_eq!(*num1, 42);
    assert_eq!(*str1, "hello");
    assert!(Arc::ptr_eq(&num1, &num2));
    assert!(Arc::ptr_eq(&str1, &str2));
}

#[test]
fn singleton_graph_shares_transitive_dependencies() {
    struct Logger;
    struct Database {
        logger: Arc<Logger>,
    }
    struct Cache {
        logger: Arc<Logger>,
        db: Arc<Database>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Logger);
    sc.add_singleton_ctor(|logger: Arc<Logger>| Database { logger });
    sc.add_singleton_ctor(|(logger, db): (Arc<Logger>, Arc<Database>)| Cache { logger, db });

    let sp = sc.build().unwrap();
    let cache1 = sp.get_required::<Cache>();
    let cache2 = sp.get_required::<Cache>();

    assert!(Arc::ptr_eq(&cache1, &cache2));
    // The logger held transitively is the same reference everywhere.
    assert!(Arc::ptr_eq(&cache1.logger, &cache1.db.logger));
    assert!(Arc::ptr_eq(&cache1.logger, &sp.get_required::<Logger>()));
}

#[test]
fn transient_creates_new_instances() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();

    let mut sc = ServiceCollection::new();
    sc.add_transient_ctor(move |_: ()| {
        format!("instance-{}", counter_clone.fetch_add(1, Ordering::SeqCst) + 1)
    });

    let sp = sc.build().unwrap();

    let a = sp.get_required::<String>();
    let b = sp.get_required::<String>();
    let c = sp.get_required::<String>();

    assert_eq!(*a, "instance-1");
    assert_eq!(*b, "instance-2");
    assert_eq!(*c, "instance-3");
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&b, &c));
}

#[test]
fn not_found_error() {
    #[derive(Debug)]
    struct Unregistered;

    let sp = ServiceCollection::new().build().unwrap();
    let error = sp.get::<Unregistered>().unwrap_err();
    assert!(error.is_not_found());
}

#[test]
fn optional_dependency_injects_none_when_absent() {
    struct Metrics;
    struct Server {
        metrics: Option<Arc<Metrics>>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton_ctor(|metrics: Option<Arc<Metrics>>| Server { metrics });

    let sp = sc.build().unwrap();
    assert!(sp.get_required::<Server>().metrics.is_none());
}

#[test]
fn optional_dependency_injects_value_when_present() {
    struct Metrics;
    struct Server {
        metrics: Option<Arc<Metrics>>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Metrics);
    sc.add_singleton_ctor(|metrics: Option<Arc<Metrics>>| Server { metrics });

    let sp = sc.build().unwrap();
    assert!(sp.get_required::<Server>().metrics.is_some());
}

#[test]
fn invoke_resolves_parameters() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(10u64);
    sc.add_singleton("suffix".to_string());

    let sp = sc.build().unwrap();
    let result = sp
        .invoke(|(n, s): (Arc<u64>, Arc<String>)| format!("{n}-{s}"))
        .unwrap();
    assert_eq!(result, "10-suffix");
}

#[test]
fn fallible_constructor_error_propagates() {
    #[derive(Debug)]
    struct Flaky;

    let mut sc = ServiceCollection::new();
    sc.add_transient_try_ctor(|_: ()| -> Result<Flaky, rivet_di::BoxError> {
        Err("no capacity".into())
    });

    let sp = sc.build().unwrap();
    let error = sp.get::<Flaky>().unwrap_err();
    assert!(error.is_construction());
    assert!(error.to_string().contains("no capacity"));
}

#[test]
fn panicking_constructor_becomes_error() {
    #[derive(Debug)]
    struct Bomb;

    let mut sc = ServiceCollection::new();
    sc.add_transient_ctor(|_: ()| -> Bomb { panic!("fuse lit") });

    let sp = sc.build().unwrap();
    let error = sp.get::<Bomb>().unwrap_err();
    assert!(error.is_construction());
    assert!(error.to_string().contains("fuse lit"));
}

#[test]
fn singletons_are_constructed_eagerly_at_build() {
    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Eager;

    let mut sc = ServiceCollection::new();
    sc.add_singleton_ctor(|_: ()| {
        BUILT.fetch_add(1, Ordering::SeqCst);
        Eager
    });

    let sp = sc.build().unwrap();
    assert_eq!(BUILT.load(Ordering::SeqCst), 1);

    let _ = sp.get_required::<Eager>();
    let _ = sp.get_required::<Eager>();
    assert_eq!(BUILT.load(Ordering::SeqCst), 1);
}

#[test]
fn multi_output_constructor_runs_once() {
    static RUNS: AtomicUsize = AtomicUsize::new(0);

    struct Reader(u8);
    struct Writer(u8);

    let mut sc = ServiceCollection::new();
    sc.add_singleton_bundle(|_: ()| {
        RUNS.fetch_add(1, Ordering::SeqCst);
        (Reader(1), Writer(2))
    });

    let sp = sc.build().unwrap();
    assert_eq!(sp.get_required::<Reader>().0, 1);
    assert_eq!(sp.get_required::<Writer>().0, 2);
    assert_eq!(RUNS.load(Ordering::SeqCst), 1);
}
