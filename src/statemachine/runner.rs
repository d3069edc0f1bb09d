//! 解析循环：反复推进所有请求直到不动点

use super::root_cause::root_cause_paths;
use super::{Context, State, States};
use crate::detection::TypeIntrospector;
use crate::errors::{InjectError, ResolutionFailure};
use crate::logging::OperationTimer;

/// 驱动状态机，返回全部已解析的请求
///
/// 每一轮先为所有未解析的请求检测实例化器，再解析本轮开始时已存在请求的依赖；
/// 新发现的依赖留到下一轮。所有请求进入终态后，若有失败则一次性汇总报告。
pub fn resolve(mut states: States, introspector: &dyn TypeIntrospector) -> Result<Vec<Context>, InjectError> {
    let timer = OperationTimer::new("resolve").with_metadata("declared", &states.len().to_string());
    let mut rounds = 0usize;
    while !states.all_final() {
        rounds += 1;
        for index in 0..states.len() {
            states.detect_instantiator(index, introspector);
        }
        let known = states.len();
        for index in 0..known {
            states.resolve_dependencies(index);
        }
    }

    let contexts = states.into_contexts();
    let failures: Vec<ResolutionFailure> = contexts
        .iter()
        .enumerate()
        .filter_map(|(index, context)| match &context.state {
            State::Failed(message) => Some(ResolutionFailure {
                type_name: context.key.description(),
                scope: context.scope.render(),
                message: message.clone(),
                root_causes: root_cause_paths(&contexts, index),
            }),
            _ => None,
        })
        .collect();

    tracing::debug!(
        rounds,
        contexts = contexts.len(),
        failures = failures.len(),
        "Resolution finished"
    );
    timer.finish();

    if failures.is_empty() {
        Ok(contexts)
    } else {
        Err(InjectError::resolution(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Candidate, RegistryIntrospector};
    use crate::scope::Scope;
    use crate::statemachine::{Detection, Reason};
    use crate::types::{ReusePolicy, TypeKey};
    use std::sync::Arc;

    /// 测试用的叶子依赖
    struct Database;

    /// 测试用的中间服务
    struct Repository {
        _database: Arc<Database>,
    }

    /// 测试用的顶层服务
    struct Service {
        _repository: Arc<Repository>,
    }

    fn auto<T: 'static>() -> Detection {
        Detection::Auto { creating: TypeKey::of::<T>() }
    }

    fn declare<T: 'static>(states: &mut States) {
        states
            .add_or_fail_if_present(TypeKey::of::<T>(), Scope::root(), auto::<T>(), ReusePolicy::Prototype, false)
            .unwrap();
    }

    #[test]
    fn test_transitive_dependencies_are_discovered() {
        let mut registry = RegistryIntrospector::new();
        registry
            .register(Candidate::constructor("Database::new", |()| Database))
            .register(Candidate::constructor("Repository::new", |(database,): (Arc<Database>,)| Repository {
                _database: database,
            }))
            .register(Candidate::constructor("Service::new", |(repository,): (Arc<Repository>,)| Service {
                _repository: repository,
            }));

        let mut states = States::new();
        declare::<Service>(&mut states);
        let contexts = resolve(states, &registry).unwrap();

        let keys: Vec<TypeKey> = contexts.iter().map(|context| context.key).collect();
        assert_eq!(
            keys,
            vec![TypeKey::of::<Service>(), TypeKey::of::<Repository>(), TypeKey::of::<Database>()]
        );
        assert!(contexts.iter().all(|context| matches!(context.state, State::Resolved)));
        assert_eq!(contexts[2].reasons, vec![Reason::BecauseOf(1)]);
    }

    #[test]
    fn test_failures_are_aggregated_with_root_causes() {
        let mut registry = RegistryIntrospector::new();
        registry.register(Candidate::constructor("Repository::new", |(database,): (Arc<Database>,)| Repository {
            _database: database,
        }));
        registry.register(Candidate::constructor("Service::new", |(repository,): (Arc<Repository>,)| Service {
            _repository: repository,
        }));

        let mut states = States::new();
        declare::<Service>(&mut states);
        let error = resolve(states, &registry).err().unwrap();
        let InjectError::Resolution { failures } = &error else {
            panic!("unexpected error: {error}");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].type_name, "Database");
        assert_eq!(
            failures[0].root_causes,
            vec!["because of Repository -> because of Service -> manually added".to_string()]
        );
        assert!(error
            .to_string()
            .starts_with("Cannot decide how to instantiate type 'Database':\nNo public constructors or static factory methods found"));
    }

    #[test]
    fn test_singleton_mark_promotes_prototype() {
        let mut registry = RegistryIntrospector::new();
        registry.register(Candidate::constructor("Database::new", |()| Database));
        registry.mark_singleton(TypeKey::of::<Database>());

        let mut states = States::new();
        declare::<Database>(&mut states);
        let contexts = resolve(states, &registry).unwrap();
        assert_eq!(contexts[0].reuse_policy, ReusePolicy::DefaultSingleton);
    }
}
