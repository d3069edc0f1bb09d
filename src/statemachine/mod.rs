//! 解析状态机
//!
//! 每个 (类型, 作用域) 请求对应一个 [`Context`]，全部保存在 [`States`] 这个
//! 竞技场里，通过下标互相引用。驱动循环见 [`runner`]。

pub mod root_cause;
pub mod runner;

pub use runner::resolve;

use crate::detection::{self, TypeIntrospector};
use crate::errors::InjectError;
use crate::instantiator::Instantiator;
use crate::scope::Scope;
use crate::types::{ReusePolicy, TypeKey};
use std::sync::Arc;

/// 实例化器的来源
#[derive(Clone)]
pub enum Detection {
    /// 通过内省自动检测，`creating` 为提供候选的类型（工厂注册时与目标不同）
    Auto { creating: TypeKey },
    /// 用户直接提供，跳过检测
    Provided(Arc<dyn Instantiator>),
}

/// 请求所处的状态
#[derive(Clone)]
pub enum State {
    Unresolved(Detection),
    ResolvingDependencies,
    Resolved,
    Failed(String),
}

impl State {
    pub fn is_final(&self) -> bool {
        matches!(self, State::Resolved | State::Failed(_))
    }

    fn name(&self) -> &'static str {
        match self {
            State::Unresolved(_) => "Unresolved",
            State::ResolvingDependencies => "ResolvingDependencies",
            State::Resolved => "Resolved",
            State::Failed(_) => "Failed",
        }
    }
}

/// 请求被加入的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    ManuallyAdded,
    /// 被竞技场中该下标的请求所依赖
    BecauseOf(usize),
}

/// 单个 (类型, 作用域) 请求的解析期记录
#[derive(Clone)]
pub struct Context {
    pub key: TypeKey,
    pub scope: Scope,
    pub reuse_policy: ReusePolicy,
    pub instantiator: Option<Arc<dyn Instantiator>>,
    pub state: State,
    pub reasons: Vec<Reason>,
}

impl Context {
    /// 同一类型，且本请求的作用域对 `scope` 可见
    fn matches(&self, key: &TypeKey, scope: &Scope) -> bool {
        self.key == *key && self.scope.contains(scope)
    }
}

/// 全部请求的竞技场
#[derive(Clone, Default)]
pub struct States {
    contexts: Vec<Context>,
}

impl States {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn into_contexts(self) -> Vec<Context> {
        self.contexts
    }

    /// 加入一个显式声明
    ///
    /// 同一作用域重复声明同一类型是配置错误；`allow_duplicates_if_same` 时
    /// 复用策略一致的重复声明会被忽略。
    pub fn add_or_fail_if_present(
        &mut self,
        key: TypeKey,
        scope: Scope,
        detection: Detection,
        reuse_policy: ReusePolicy,
        allow_duplicates_if_same: bool,
    ) -> Result<(), InjectError> {
        let existing = self
            .contexts
            .iter()
            .find(|context| context.key == key && context.scope == scope);
        if let Some(existing) = existing {
            if allow_duplicates_if_same && existing.reuse_policy == reuse_policy {
                return Ok(());
            }
            return Err(InjectError::Configuration(format!(
                "Type '{}' has already been registered in scope '{}'",
                key.description(),
                scope.render()
            )));
        }
        self.contexts.push(Context {
            key,
            scope,
            reuse_policy,
            instantiator: None,
            state: State::Unresolved(detection),
            reasons: vec![Reason::ManuallyAdded],
        });
        Ok(())
    }

    /// 找到对 `scope` 可见、最具体的同类型请求
    fn find_matching(&self, key: &TypeKey, scope: &Scope) -> Option<usize> {
        self.contexts
            .iter()
            .enumerate()
            .filter(|(_, context)| context.matches(key, scope))
            .max_by_key(|(_, context)| context.scope.depth())
            .map(|(index, _)| index)
    }

    pub fn all_final(&self) -> bool {
        self.contexts.iter().all(|context| context.state.is_final())
    }

    /// `Unresolved` → `ResolvingDependencies` | `Failed`
    pub(crate) fn detect_instantiator(&mut self, index: usize, introspector: &dyn TypeIntrospector) {
        let context = &mut self.contexts[index];
        let State::Unresolved(source) = &context.state else {
            return;
        };
        let next = match source.clone() {
            Detection::Provided(instantiator) => {
                context.instantiator = Some(instantiator);
                State::ResolvingDependencies
            }
            Detection::Auto { creating } => {
                if context.reuse_policy == ReusePolicy::Prototype && introspector.is_marked_singleton(context.key) {
                    context.reuse_policy = ReusePolicy::DefaultSingleton;
                }
                match detection::detect(context.key, creating, &context.scope, introspector) {
                    Ok(instantiator) => {
                        context.instantiator = Some(instantiator);
                        State::ResolvingDependencies
                    }
                    Err(message) => State::Failed(message),
                }
            }
        };
        tracing::trace!(
            type_name = %context.key,
            scope = %context.scope,
            from = context.state.name(),
            to = next.name(),
            "State transition"
        );
        context.state = next;
    }

    /// `ResolvingDependencies` → `Resolved`，同时登记新发现的依赖请求
    pub(crate) fn resolve_dependencies(&mut self, index: usize) {
        if !matches!(self.contexts[index].state, State::ResolvingDependencies) {
            return;
        }
        let scope = self.contexts[index].scope.clone();
        let dependencies = self.contexts[index]
            .instantiator
            .as_ref()
            .map(|instantiator| instantiator.dependencies())
            .unwrap_or_default();
        for dependency in dependencies {
            let reason = Reason::BecauseOf(index);
            match self.find_matching(&dependency, &scope) {
                Some(existing) => {
                    let reasons = &mut self.contexts[existing].reasons;
                    if !reasons.contains(&reason) {
                        reasons.push(reason);
                    }
                }
                None => {
                    tracing::trace!(type_name = %dependency, scope = %scope, "Discovered dependency");
                    self.contexts.push(Context {
                        key: dependency,
                        scope: scope.clone(),
                        reuse_policy: ReusePolicy::Prototype,
                        instantiator: None,
                        state: State::Unresolved(Detection::Auto { creating: dependency }),
                        reasons: vec![reason],
                    });
                }
            }
        }
        self.contexts[index].state = State::Resolved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instantiator::ConstantInstantiator;

    struct Config;

    fn constant<T: Send + Sync + 'static>(value: T) -> Detection {
        Detection::Provided(Arc::new(ConstantInstantiator::new(TypeKey::of::<T>(), Arc::new(value))))
    }

    #[test]
    fn test_duplicate_registration_in_same_scope() {
        let mut states = States::new();
        states
            .add_or_fail_if_present(TypeKey::of::<Config>(), Scope::root(), constant(Config), ReusePolicy::Prototype, false)
            .unwrap();
        let error = states
            .add_or_fail_if_present(TypeKey::of::<Config>(), Scope::root(), constant(Config), ReusePolicy::Prototype, false)
            .unwrap_err();
        assert_eq!(error.to_string(), "Type 'Config' has already been registered in scope '/'");

        // 不同作用域可以共存
        let child = Scope::root().child(TypeKey::of::<String>());
        assert!(states
            .add_or_fail_if_present(TypeKey::of::<Config>(), child, constant(Config), ReusePolicy::Prototype, false)
            .is_ok());
    }

    #[test]
    fn test_duplicates_tolerated_when_same_policy() {
        let mut states = States::new();
        let scope = Scope::root().child(TypeKey::of::<String>());
        for _ in 0..2 {
            states
                .add_or_fail_if_present(TypeKey::of::<Config>(), scope.clone(), constant(Config), ReusePolicy::Prototype, true)
                .unwrap();
        }
        assert_eq!(states.len(), 1);
        assert!(states
            .add_or_fail_if_present(TypeKey::of::<Config>(), scope, constant(Config), ReusePolicy::LazySingleton, true)
            .is_err());
    }

    #[test]
    fn test_find_matching_prefers_most_specific_scope() {
        let mut states = States::new();
        let child = Scope::root().child(TypeKey::of::<String>());
        states
            .add_or_fail_if_present(TypeKey::of::<Config>(), Scope::root(), constant(Config), ReusePolicy::Prototype, false)
            .unwrap();
        states
            .add_or_fail_if_present(TypeKey::of::<Config>(), child.clone(), constant(Config), ReusePolicy::Prototype, false)
            .unwrap();

        assert_eq!(states.find_matching(&TypeKey::of::<Config>(), &child), Some(1));
        assert_eq!(states.find_matching(&TypeKey::of::<Config>(), &Scope::root()), Some(0));
        assert_eq!(states.find_matching(&TypeKey::of::<u8>(), &child), None);
    }
}
