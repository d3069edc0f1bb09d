//! 构造策略检测
//!
//! 候选构造器/工厂方法由外部的 [`TypeIntrospector`] 提供，
//! 本模块只负责在候选之间做出唯一选择。

mod candidate;
mod disambiguators;
mod registry;

pub use candidate::Candidate;
pub use disambiguators::{disambiguate, Disambiguation, Disambiguator};
pub use registry::{CompositeIntrospector, Injectable, RegistryIntrospector};

use crate::infrastructure::container::Injector;
use crate::instantiator::{Instantiator, SelfInstantiator};
use crate::scope::Scope;
use crate::types::TypeKey;
use std::sync::Arc;

/// 某个类型可用的全部构造方式
#[derive(Clone, Default)]
pub struct InstantiationOptions {
    pub constructors: Vec<Candidate>,
    pub static_factories: Vec<Candidate>,
    pub non_static_factories: Vec<Candidate>,
}

impl InstantiationOptions {
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty() && self.static_factories.is_empty() && self.non_static_factories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constructors.len() + self.static_factories.len() + self.non_static_factories.len()
    }

    pub fn extend(&mut self, other: InstantiationOptions) {
        self.constructors.extend(other.constructors);
        self.static_factories.extend(other.static_factories);
        self.non_static_factories.extend(other.non_static_factories);
    }

    /// 按构造器、静态工厂、非静态工厂的顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.constructors
            .iter()
            .chain(self.static_factories.iter())
            .chain(self.non_static_factories.iter())
    }
}

/// 类型内省能力
///
/// `creating` 与 `target` 相同时枚举 `target` 自身的构造器与静态工厂；
/// 不同时枚举工厂类型 `creating` 上返回 `target` 的静态与非静态工厂方法。
pub trait TypeIntrospector: Send + Sync {
    fn instantiation_options(&self, target: TypeKey, creating: TypeKey) -> InstantiationOptions;

    /// 类型本身是否被标记为单例
    fn is_marked_singleton(&self, _target: TypeKey) -> bool {
        false
    }
}

/// 为 `target` 检测实例化器，失败时返回完整的错误描述
pub fn detect(
    target: TypeKey,
    creating: TypeKey,
    scope: &Scope,
    introspector: &dyn TypeIntrospector,
) -> Result<Arc<dyn Instantiator>, String> {
    if target == TypeKey::of::<Injector>() {
        return Ok(Arc::new(SelfInstantiator));
    }
    let options = introspector.instantiation_options(target, creating);
    disambiguate(&options)
        .map(Candidate::into_instantiator)
        .map_err(|reasons| {
            let factory_qualifier = if target == creating {
                String::new()
            } else {
                format!(" from factory '{}'", creating.description())
            };
            let scope_qualifier = if scope.is_root() {
                String::new()
            } else {
                format!(" in scope '{}'", scope.render())
            };
            format!(
                "Cannot decide how to instantiate type '{}'{}{}:\n{}",
                target.description(),
                factory_qualifier,
                scope_qualifier,
                reasons
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试用的无参类型
    struct Clock;

    /// 测试用的工厂类型
    struct ClockFactory;

    #[test]
    fn test_detect_self_type() {
        let registry = RegistryIntrospector::new();
        let instantiator = detect(TypeKey::of::<Injector>(), TypeKey::of::<Injector>(), &Scope::root(), &registry).unwrap();
        assert_eq!(instantiator.description(), "injector");
    }

    #[test]
    fn test_detect_failure_message() {
        let registry = RegistryIntrospector::new();
        let error = detect(TypeKey::of::<Clock>(), TypeKey::of::<Clock>(), &Scope::root(), &registry)
            .err()
            .unwrap();
        assert_eq!(
            error,
            "Cannot decide how to instantiate type 'Clock':\n\
             No public constructors or static factory methods found\n\
             No annotations have been detected\n\
             No public constructors found\n\
             No static factory methods have been found"
        );

        let request = Scope::root().child(TypeKey::of::<ClockFactory>());
        let error = detect(TypeKey::of::<Clock>(), TypeKey::of::<ClockFactory>(), &request, &registry)
            .err()
            .unwrap();
        assert!(error.starts_with(
            "Cannot decide how to instantiate type 'Clock' from factory 'ClockFactory' in scope '/ClockFactory':\n"
        ));
    }

    #[test]
    fn test_detect_single_constructor() {
        let mut registry = RegistryIntrospector::new();
        registry.register(Candidate::constructor("Clock::new", |()| Clock));
        let instantiator = detect(TypeKey::of::<Clock>(), TypeKey::of::<Clock>(), &Scope::root(), &registry).unwrap();
        assert_eq!(instantiator.description(), "constructor 'Clock::new'");
        assert!(instantiator.dependencies().is_empty());
    }
}
