use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rivet_di::{Context, Resolver, Scope, ServiceCollection, ServiceProvider};

#[derive(Debug)]
struct RequestId(u64);

fn request_id_services() -> ServiceCollection {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let mut sc = ServiceCollection::new();
    sc.add_scoped_ctor(|_: ()| RequestId(NEXT.fetch_add(1, Ordering::SeqCst)));
    sc
}

#[test]
fn scoped_instances_are_per_scope() {
    let sp = request_id_services().build().unwrap();

    let scope1 = sp.create_scope(&Context::new()).unwrap();
    let scope2 = sp.create_scope(&Context::new()).unwrap();

    let a1 = scope1.get_required::<RequestId>();
    let a2 = scope1.get_required::<RequestId>();
    let b = scope2.get_required::<RequestId>();

    assert!(Arc::ptr_eq(&a1, &a2));
    assert_eq!(a1.0, a2.0);
    assert_ne!(a1.0, b.0);
}

#[test]
fn scoped_services_resolve_at_the_root_scope() {
    let sp = request_id_services().build().unwrap();

    // The provider resolves through its root scope, which caches scoped
    // services like any other scope.
    let a = sp.get_required::<RequestId>();
    let b = sp.get_required::<RequestId>();
    assert!(Arc::ptr_eq(&a, &b));

    let scope = sp.create_scope(&Context::new()).unwrap();
    let c = scope.get_required::<RequestId>();
    assert_ne!(a.0, c.0);
}

#[test]
fn nested_scopes_have_independent_state() {
    let sp = request_id_services().build().unwrap();

    let parent = sp.create_scope(&Context::new()).unwrap();
    let child = parent.create_scope(&Context::new()).unwrap();

    let p = parent.get_required::<RequestId>();
    let c = child.get_required::<RequestId>();
    assert_ne!(p.0, c.0);
    assert_ne!(parent.id(), child.id());
}

#[test]
fn closing_parent_closes_children() {
    let sp = request_id_services().build().unwrap();

    let parent = sp.create_scope(&Context::new()).unwrap();
    let child = parent.create_scope(&Context::new()).unwrap();
    let grandchild = child.create_scope(&Context::new()).unwrap();

    parent.close().unwrap();

    assert!(child.get::<RequestId>().unwrap_err().is_disposed());
    assert!(grandchild.get::<RequestId>().unwrap_err().is_disposed());
    assert!(child.create_scope(&Context::new()).unwrap_err().is_disposed());
}

#[test]
fn disposed_scope_rejects_resolution_and_children() {
    let sp = request_id_services().build().unwrap();
    let scope = sp.create_scope(&Context::new()).unwrap();
    scope.close().unwrap();

    assert!(scope.get::<RequestId>().unwrap_err().is_disposed());
    assert!(scope.get_keyed::<RequestId>("k").unwrap_err().is_disposed());
    assert!(scope.create_scope(&Context::new()).unwrap_err().is_disposed());
}

#[test]
fn provider_close_disposes_every_scope() {
    let sp = request_id_services().build().unwrap();
    let scope = sp.create_scope(&Context::new()).unwrap();

    sp.close().unwrap();

    let error = scope.get::<RequestId>().unwrap_err();
    assert!(error.is_disposed());
}

#[test]
fn builtin_services_resolve_from_the_scope_frame() {
    struct Stamp;
    struct Inspector {
        ctx: Arc<Context>,
        scope: Arc<Scope>,
        provider: Arc<ServiceProvider>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton(Stamp);
    sc.add_scoped_ctor(
        |(ctx, scope, provider): (Arc<Context>, Arc<Scope>, Arc<ServiceProvider>)| Inspector {
            ctx,
            scope,
            provider,
        },
    );

    let sp = sc.build().unwrap();
    let ctx = Context::new();
    let scope = sp.create_scope(&ctx).unwrap();

    let inspector = scope.get_required::<Inspector>();
    assert_eq!(inspector.scope.id(), scope.id());
    assert!(!inspector.ctx.is_cancelled());

    // The provider handle shares the singleton store with the original.
    let stamp_via_builtin = inspector.provider.get_required::<Stamp>();
    assert!(Arc::ptr_eq(&stamp_via_builtin, &sp.get_required::<Stamp>()));

    // The served context is the scope's derived context: cancelling the
    // caller-supplied one propagates into it.
    ctx.cancel();
    assert!(inspector.ctx.is_cancelled());
}

#[test]
fn user_registration_shadows_builtin() {
    let mut sc = ServiceCollection::new();
    let marker = Context::new().with_value(7u32);
    sc.add_singleton(marker);

    let sp = sc.build().unwrap();
    let scope = sp.create_scope(&Context::new()).unwrap();

    let resolved = scope.get_required::<Context>();
    assert_eq!(resolved.value::<u32>().as_deref(), Some(&7));
}
