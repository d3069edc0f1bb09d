//! 作用域的集成测试：作用域对象、作用域内单例、嵌套与覆盖

#![allow(clippy::uninlined_format_args, clippy::print_stdout)]

use injectgraph::{Candidate, InjectError, Injector, InjectorBuilder, ReusePolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 测试用的请求作用域标记，同时作为作用域对象
struct Request {
    id: u32,
}

/// 测试用的会话作用域标记
struct Session {
    user: String,
}

/// 未声明的作用域标记
struct Batch;

/// 所有作用域共享的根单例
#[derive(Debug)]
struct SharedClock;

/// 请求作用域内的单例，依赖作用域对象和根单例
#[derive(Debug)]
struct BookingPolicies {
    request_id: u32,
    clock: Arc<SharedClock>,
}

/// 嵌套作用域中的类型
struct AuditTrail {
    request_id: u32,
    user: String,
}

/// 急切单例，进入作用域时创建
struct ScopedWarmup;

/// 作用域内依赖容器自身的类型
struct RequestHandler {
    injector: Arc<Injector>,
}

fn booking_builder() -> InjectorBuilder {
    InjectorBuilder::new()
        .with_candidates([Candidate::constructor("SharedClock::new", |()| SharedClock)])
        .with_type_policy::<SharedClock>(ReusePolicy::LazySingleton)
        .with_scope::<Request, _>(|scope| {
            scope.with_custom_type_policy(
                |(request, clock): (Arc<Request>, Arc<SharedClock>)| BookingPolicies {
                    request_id: request.id,
                    clock,
                },
                ReusePolicy::LazySingleton,
            )
        })
}

#[test]
fn test_scope_object_is_available_in_scope() {
    let injector = booking_builder().build().unwrap();
    let request = injector.enter_scope(Request { id: 7 }).unwrap();

    assert_eq!(request.get_instance::<Request>().unwrap().id, 7);
    assert_eq!(request.scope().render(), "/Request");
    assert_eq!(request.get_instance::<BookingPolicies>().unwrap().request_id, 7);
}

#[test]
fn test_scoped_type_receives_scoped_injector() {
    let injector = InjectorBuilder::new()
        .with_scope::<Request, _>(|scope| {
            scope.with_custom_type(|(injector,): (Arc<Injector>,)| RequestHandler { injector })
        })
        .build()
        .unwrap();
    let request = injector.enter_scope(Request { id: 3 }).unwrap();

    let handler = request.get_instance::<RequestHandler>().unwrap();
    assert_eq!(handler.injector.id(), request.id());
    assert_ne!(handler.injector.id(), injector.id());
    assert_eq!(handler.injector.scope().render(), "/Request");
    assert_eq!(handler.injector.get_instance::<Request>().unwrap().id, 3);
}

#[test]
fn test_scoped_singletons_are_per_scope_instance() {
    let injector = booking_builder().build().unwrap();
    let first = injector.enter_scope(Request { id: 1 }).unwrap();
    let second = injector.enter_scope(Request { id: 2 }).unwrap();

    let a = first.get_instance::<BookingPolicies>().unwrap();
    let b = first.get_instance::<BookingPolicies>().unwrap();
    let c = second.get_instance::<BookingPolicies>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(c.request_id, 2);

    // 外层单例由根容器持有，在所有作用域间共享
    assert!(Arc::ptr_eq(&a.clock, &c.clock));
    assert!(Arc::ptr_eq(&a.clock, &injector.get_instance::<SharedClock>().unwrap()));
}

#[test]
fn test_scoped_type_not_visible_from_root() {
    let injector = booking_builder().build().unwrap();
    assert!(!injector.can_instantiate::<BookingPolicies>());
    let error = injector.get_instance::<BookingPolicies>().unwrap_err();
    assert!(matches!(error, InjectError::NotVisibleInScope { .. }));
    assert_eq!(error.to_string(), "Tried to instantiate unregistered type 'BookingPolicies'");
}

#[test]
fn test_entering_unknown_scope() {
    let injector = booking_builder().build().unwrap();
    let error = injector.enter_scope(Batch).unwrap_err();
    assert_eq!(
        error.to_string(),
        "Tried to enter unknown scope '/Batch'. Registered scopes: [/, /Request]"
    );
    assert!(injector.enter_scope_if_exists(Batch).unwrap().is_none());
    assert!(injector.enter_scope_if_exists(Request { id: 3 }).unwrap().is_some());
}

#[test]
fn test_nested_scopes() {
    let injector = InjectorBuilder::new()
        .with_scope::<Request, _>(|request_scope| {
            request_scope.with_scope::<Session, _>(|session_scope| {
                session_scope.with_custom_type(|(request, session): (Arc<Request>, Arc<Session>)| AuditTrail {
                    request_id: request.id,
                    user: session.user.clone(),
                })
            })
        })
        .build()
        .unwrap();

    let request = injector.enter_scope(Request { id: 11 }).unwrap();
    assert!(!request.can_instantiate::<AuditTrail>());
    let session = request
        .enter_scope(Session {
            user: "alice".to_string(),
        })
        .unwrap();
    assert_eq!(session.scope().render(), "/Request/Session");

    let trail = session.get_instance::<AuditTrail>().unwrap();
    assert_eq!(trail.request_id, 11);
    assert_eq!(trail.user, "alice");

    // 会话作用域只能从请求作用域进入
    assert!(injector
        .enter_scope_if_exists(Session {
            user: "bob".to_string()
        })
        .unwrap()
        .is_none());
}

#[test]
fn test_inner_declaration_overrides_outer() {
    let injector = InjectorBuilder::new()
        .with_constant(String::from("root"))
        .with_scope::<Request, _>(|scope| scope.with_constant(String::from("request")))
        .build()
        .unwrap();

    let request = injector.enter_scope(Request { id: 1 }).unwrap();
    assert_eq!(request.get_cloned::<String>().unwrap(), "request");
    assert_eq!(injector.get_cloned::<String>().unwrap(), "root");
}

#[test]
fn test_eager_singletons_are_created_on_scope_entry() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let injector = InjectorBuilder::new()
        .with_scope::<Request, _>(move |scope| {
            scope.with_custom_type_policy(
                move |()| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ScopedWarmup
                },
                ReusePolicy::EagerSingleton,
            )
        })
        .build()
        .unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 0);

    let request = injector.enter_scope(Request { id: 1 }).unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 1);
    request.get_instance::<ScopedWarmup>().unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 1);

    injector.enter_scope(Request { id: 2 }).unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[test]
fn test_reentering_scope_block_merges_declarations() {
    let injector = InjectorBuilder::new()
        .with_scope::<Request, _>(|scope| scope.with_constant(1u8))
        .with_scope::<Request, _>(|scope| scope.with_constant(2u16))
        .build()
        .unwrap();

    let request = injector.enter_scope(Request { id: 1 }).unwrap();
    assert_eq!(*request.get_instance::<u8>().unwrap(), 1);
    assert_eq!(*request.get_instance::<u16>().unwrap(), 2);
}

#[test]
fn test_detection_failure_in_scope_names_the_scope() {
    let error = InjectorBuilder::new()
        .with_scope::<Request, _>(|scope| scope.with_type::<SharedClock>())
        .build()
        .unwrap_err();
    assert!(error
        .to_string()
        .starts_with("Cannot decide how to instantiate type 'SharedClock' in scope '/Request':\n"));
}

#[test]
fn test_scope_marker_cannot_be_used_in_two_places() {
    let error = InjectorBuilder::new()
        .with_scope::<Request, _>(|scope| scope)
        .with_scope::<Session, _>(|scope| scope.with_scope::<Request, _>(|inner| inner))
        .build()
        .unwrap_err();
    assert!(matches!(error, InjectError::Configuration(_)));
}
