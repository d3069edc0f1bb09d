#![allow(dead_code, clippy::uninlined_format_args, clippy::print_stdout)]
//! 容器构建与实例获取的性能基准测试

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use injectgraph::{Candidate, Injector, InjectorBuilder, ReusePolicy};
use std::sync::Arc;

/// 测试用的配置
struct Settings {
    retries: u32,
}

/// 依赖配置的连接池
struct Pool {
    settings: Arc<Settings>,
}

/// 依赖连接池的仓储
struct Repository {
    pool: Arc<Pool>,
}

/// 依赖仓储的服务
struct Service {
    repository: Arc<Repository>,
}

/// 请求作用域标记
struct Request {
    id: u64,
}

/// 请求作用域内的处理器
struct Handler {
    request_id: u64,
    service: Arc<Service>,
}

fn candidates() -> Vec<Candidate> {
    vec![
        Candidate::constructor("Settings::new", |()| Settings { retries: 3 }),
        Candidate::constructor("Pool::new", |(settings,): (Arc<Settings>,)| Pool { settings }),
        Candidate::constructor("Repository::new", |(pool,): (Arc<Pool>,)| Repository { pool }),
        Candidate::constructor("Service::new", |(repository,): (Arc<Repository>,)| Service { repository }),
    ]
}

fn build(policy: ReusePolicy) -> Injector {
    InjectorBuilder::new()
        .with_candidates(candidates())
        .with_type_policy::<Settings>(policy)
        .with_type_policy::<Service>(policy)
        .with_scope::<Request, _>(|scope| {
            scope.with_custom_type(|(request, service): (Arc<Request>, Arc<Service>)| Handler {
                request_id: request.id,
                service,
            })
        })
        .build()
        .unwrap()
}

/// 构建：解析、生成定义并校验循环依赖
fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    group.bench_function("transitive_chain", |b| {
        b.iter(|| black_box(build(ReusePolicy::Prototype)))
    });

    group.bench_function("eager_singletons", |b| {
        b.iter(|| black_box(build(ReusePolicy::EagerSingleton)))
    });

    group.finish();
}

/// 获取实例：原型每次实例化整条依赖链，单例命中缓存
fn bench_get_instance(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_instance");

    for (name, policy) in [
        ("prototype", ReusePolicy::Prototype),
        ("lazy_singleton", ReusePolicy::LazySingleton),
    ] {
        let injector = build(policy);
        group.bench_with_input(BenchmarkId::from_parameter(name), &injector, |b, injector| {
            b.iter(|| black_box(injector.get_instance::<Service>().unwrap()))
        });
    }

    group.finish();
}

/// 进入作用域并在其中获取实例
fn bench_enter_scope(c: &mut Criterion) {
    let mut group = c.benchmark_group("enter_scope");
    let injector = build(ReusePolicy::LazySingleton);

    for request_count in [1u64, 10, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(request_count),
            &request_count,
            |b, &request_count| {
                b.iter(|| {
                    for id in 0..request_count {
                        let scoped = injector.enter_scope(Request { id }).unwrap();
                        black_box(scoped.get_instance::<Handler>().unwrap());
                    }
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_get_instance, bench_enter_scope);
criterion_main!(benches);
