use std::sync::{Arc, Mutex};

use rivet_di::{
    BoxError, Context, ContextDispose, Dispose, Resolver, ServiceCollection,
};

type Log = Arc<Mutex<Vec<&'static str>>>;

#[derive(Debug)]
struct Tracked {
    name: &'static str,
    log: Log,
}

impl Dispose for Tracked {
    fn dispose(&self) -> Result<(), BoxError> {
        self.log.lock().unwrap().push(self.name);
        Ok(())
    }
}

#[test]
fn scope_disposal_is_lifo_over_creation_order() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    for name in ["first", "second", "third"] {
        let log = log.clone();
        sc.add_scoped_ctor(move |_: ()| Tracked {
            name,
            log: log.clone(),
        })
        .named(name)
        .disposable();
    }

    let sp = sc.build().unwrap();
    let scope = sp.create_scope(&Context::new()).unwrap();

    // Creation order differs from registration order on purpose.
    let _ = scope.get_keyed_required::<Tracked>("second");
    let _ = scope.get_keyed_required::<Tracked>("first");
    let _ = scope.get_keyed_required::<Tracked>("third");

    scope.close().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["third", "first", "second"]);
}

#[test]
fn close_is_idempotent() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_scoped_ctor(move |_: ()| Tracked {
        name: "only",
        log: l.clone(),
    })
    .disposable();

    let sp = sc.build().unwrap();
    let scope = sp.create_scope(&Context::new()).unwrap();
    let _ = scope.get_required::<Tracked>();

    scope.close().unwrap();
    scope.close().unwrap();
    scope.close().unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);

    sp.close().unwrap();
    sp.close().unwrap();
}

#[test]
fn cancelled_context_disposes_the_scope() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_scoped_ctor(move |_: ()| Tracked {
        name: "request",
        log: l.clone(),
    })
    .disposable();

    let sp = sc.build().unwrap();
    let ctx = Context::new();
    let scope = sp.create_scope(&ctx).unwrap();
    let _ = scope.get_required::<Tracked>();

    ctx.cancel();

    assert_eq!(*log.lock().unwrap(), vec!["request"]);
    assert!(scope.get::<Tracked>().unwrap_err().is_disposed());
}

#[test]
fn transients_are_recorded_in_their_scope() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_transient_ctor(move |_: ()| Tracked {
        name: "transient",
        log: l.clone(),
    })
    .disposable();

    let sp = sc.build().unwrap();
    let scope = sp.create_scope(&Context::new()).unwrap();
    let _a = scope.get_required::<Tracked>();
    let _b = scope.get_required::<Tracked>();

    scope.close().unwrap();
    // Every transient construction was recorded, each disposed once.
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[test]
fn singleton_disposal_belongs_to_the_provider() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_singleton_ctor(move |_: ()| Tracked {
        name: "shared",
        log: l.clone(),
    })
    .disposable();

    let sp = sc.build().unwrap();
    let scope = sp.create_scope(&Context::new()).unwrap();
    let _ = scope.get_required::<Tracked>();

    // Closing the scope that touched the singleton must not dispose it.
    scope.close().unwrap();
    assert!(log.lock().unwrap().is_empty());

    sp.close().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["shared"]);
}

#[test]
fn disposer_errors_are_collected_not_short_circuited() {
    struct Faulty {
        log: Log,
    }

    impl Dispose for Faulty {
        fn dispose(&self) -> Result<(), BoxError> {
            self.log.lock().unwrap().push("faulty");
            Err("flush failed".into())
        }
    }

    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_scoped_ctor(move |_: ()| Tracked {
        name: "ok",
        log: l.clone(),
    })
    .disposable();
    let l = log.clone();
    sc.add_scoped_ctor(move |_: ()| Faulty { log: l.clone() }).disposable();

    let sp = sc.build().unwrap();
    let scope = sp.create_scope(&Context::new()).unwrap();
    let _ = scope.get_required::<Tracked>();
    let _ = scope.get_required::<Faulty>();

    let error = scope.close().unwrap_err();
    assert!(error.is_disposal());
    // Both disposers ran despite the failure.
    assert_eq!(*log.lock().unwrap(), vec!["faulty", "ok"]);

    // A second close after a failed one stays idempotent.
    scope.close().unwrap();
}

#[test]
fn context_aware_disposer_receives_the_scope_context() {
    struct Graceful {
        log: Log,
    }

    impl ContextDispose for Graceful {
        fn dispose(&self, ctx: &Context) -> Result<(), BoxError> {
            self.log
                .lock()
                .unwrap()
                .push(if ctx.is_cancelled() { "hard" } else { "graceful" });
            Ok(())
        }
    }

    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_scoped_ctor(move |_: ()| Graceful { log: l.clone() })
        .disposable_with_context();

    let sp = sc.build().unwrap();

    // Explicit close: the context is still live while disposers run.
    let scope = sp.create_scope(&Context::new()).unwrap();
    let _ = scope.get_required::<Graceful>();
    scope.close().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["graceful"]);

    // Cancellation-triggered close: the disposer observes the cancelled
    // context and can skip graceful teardown.
    let ctx = Context::new();
    let scope = sp.create_scope(&ctx).unwrap();
    let _ = scope.get_required::<Graceful>();
    ctx.cancel();
    assert_eq!(*log.lock().unwrap(), vec!["graceful", "hard"]);
}

#[test]
fn nested_scopes_dispose_children_before_parent_hooks() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let l = log.clone();
    sc.add_scoped_ctor(move |_: ()| Tracked {
        name: "conn",
        log: l.clone(),
    })
    .disposable();

    let sp = sc.build().unwrap();
    let parent = sp.create_scope(&Context::new()).unwrap();
    let child = parent.create_scope(&Context::new()).unwrap();

    let _parent_conn = parent.get_required::<Tracked>();
    let _child_conn = child.get_required::<Tracked>();

    parent.close().unwrap();
    // Child scopes close depth-first; each disposed its own instance.
    assert_eq!(log.lock().unwrap().len(), 2);
}
