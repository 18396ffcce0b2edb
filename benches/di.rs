use criterion::{criterion_group, criterion_main, Criterion};

use rivet_di::{Context, Resolver, ServiceCollection};

struct Config {
    _port: u16,
}

struct Session(u64);

struct Message(u64);

fn bench_resolution(c: &mut Criterion) {
    let mut services = ServiceCollection::new();
    services.add_singleton(Config { _port: 8080 });
    services.add_scoped_ctor(|_: ()| Session(1));
    services.add_transient_ctor(|_: ()| Message(2));
    services.add_singleton(7u64).named("limit");

    let provider = services.build().unwrap();
    let scope = provider.create_scope(&Context::new()).unwrap();

    c.bench_function("singleton_hit", |b| {
        b.iter(|| provider.get_required::<Config>())
    });

    c.bench_function("scoped_hit", |b| b.iter(|| scope.get_required::<Session>()));

    c.bench_function("transient_construct", |b| {
        b.iter(|| scope.get_required::<Message>())
    });

    c.bench_function("keyed_singleton_hit", |b| {
        b.iter(|| provider.get_keyed_required::<u64>("limit"))
    });

    c.bench_function("scope_create_close", |b| {
        b.iter(|| {
            let scope = provider.create_scope(&Context::new()).unwrap();
            scope.close().unwrap();
        })
    });
}

criterion_group!(benches, bench_resolution);
criterion_main!(benches);
