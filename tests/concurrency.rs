use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rivet_di::{Context, Resolver, ServiceCollection};

#[test]
fn racing_resolutions_in_one_scope_run_the_constructor_once() {
    static SCOPED_BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct PerScope(u64);

    let mut sc = ServiceCollection::new();
    sc.add_scoped_ctor(|_: ()| {
        SCOPED_BUILDS.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        PerScope(9)
    });

    let sp = sc.build().unwrap();
    let scope = sp.create_scope(&Context::new()).unwrap();

    let results: Vec<u64> = crossbeam_utils::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let scope = &scope;
                s.spawn(move |_| scope.get_required::<PerScope>().0)
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert!(results.iter().all(|&v| v == 9));
    // The once-latch serialized the racers: exactly one construction.
    assert_eq!(SCOPED_BUILDS.load(Ordering::SeqCst), 1);
}

#[test]
fn distinct_scopes_resolve_in_parallel_without_sharing() {
    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct PerScope;

    let mut sc = ServiceCollection::new();
    sc.add_scoped_ctor(|_: ()| {
        BUILDS.fetch_add(1, Ordering::SeqCst);
        PerScope
    });

    let sp = sc.build().unwrap();

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..4 {
            let sp = sp.clone();
            s.spawn(move |_| {
                let scope = sp.create_scope(&Context::new()).unwrap();
                let _ = scope.get_required::<PerScope>();
                let _ = scope.get_required::<PerScope>();
                scope.close().unwrap();
            });
        }
    })
    .unwrap();

    assert_eq!(BUILDS.load(Ordering::SeqCst), 4);
}

#[test]
fn unrelated_keys_resolve_concurrently() {
    struct Slot(&'static str);

    let mut sc = ServiceCollection::new();
    for name in ["a", "b", "c", "d"] {
        sc.add_singleton_ctor(move |_: ()| Slot(name)).named(name);
    }

    let sp = sc.build().unwrap();

    crossbeam_utils::thread::scope(|s| {
        for name in ["a", "b", "c", "d"] {
            let sp = sp.clone();
            s.spawn(move |_| {
                for _ in 0..100 {
                    assert_eq!(sp.get_keyed_required::<Slot>(name).0, name);
                }
            });
        }
    })
    .unwrap();
}

#[test]
fn concurrent_scope_churn_with_disposal_is_safe() {
    use rivet_di::{BoxError, Dispose};

    static LIVE: AtomicUsize = AtomicUsize::new(0);

    struct Conn;

    impl Dispose for Conn {
        fn dispose(&self) -> Result<(), BoxError> {
            LIVE.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_scoped_ctor(|_: ()| {
        LIVE.fetch_add(1, Ordering::SeqCst);
        Conn
    })
    .disposable();

    let sp = sc.build().unwrap();

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..4 {
            let sp = sp.clone();
            s.spawn(move |_| {
                for _ in 0..25 {
                    let scope = sp.create_scope(&Context::new()).unwrap();
                    let _ = scope.get_required::<Conn>();
                    scope.close().unwrap();
                }
            });
        }
    })
    .unwrap();

    // Every scoped connection was disposed with its scope.
    assert_eq!(LIVE.load(Ordering::SeqCst), 0);
    sp.close().unwrap();
}
