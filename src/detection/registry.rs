use super::{Candidate, InstantiationOptions, TypeIntrospector};
use crate::instantiator::FactoryKind;
use crate::types::TypeKey;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 能描述自身构造方式的类型
///
/// 通常由宏或手写实现提供，等价于反射扫描结果。
pub trait Injectable: Any + Send + Sync {
    fn candidates() -> Vec<Candidate>;

    /// 类型是否带单例标记
    fn singleton() -> bool {
        false
    }
}

/// 基于显式注册的内省实现
///
/// 候选按声明它的类型（构造器的目标类型，或工厂方法所在的类型）分组保存。
#[derive(Clone, Default)]
pub struct RegistryIntrospector {
    candidates: HashMap<TypeKey, Vec<Candidate>>,
    singletons: HashSet<TypeKey>,
}

impl RegistryIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, candidate: Candidate) -> &mut Self {
        self.candidates.entry(candidate.owner()).or_default().push(candidate);
        self
    }

    pub fn register_all(&mut self, candidates: impl IntoIterator<Item = Candidate>) -> &mut Self {
        for candidate in candidates {
            self.register(candidate);
        }
        self
    }

    pub fn mark_singleton(&mut self, key: TypeKey) -> &mut Self {
        self.singletons.insert(key);
        self
    }

    /// 注册一个自描述类型的全部候选及其单例标记
    pub fn register_injectable<T: Injectable>(&mut self) -> &mut Self {
        self.register_all(T::candidates());
        if T::singleton() {
            self.mark_singleton(TypeKey::of::<T>());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.singletons.is_empty()
    }
}

impl TypeIntrospector for RegistryIntrospector {
    fn instantiation_options(&self, target: TypeKey, creating: TypeKey) -> InstantiationOptions {
        let mut options = InstantiationOptions::default();
        let Some(candidates) = self.candidates.get(&creating) else {
            return options;
        };
        for candidate in candidates.iter().filter(|candidate| candidate.produces() == target) {
            match candidate.kind() {
                FactoryKind::Constructor if target == creating => options.constructors.push(candidate.clone()),
                FactoryKind::StaticFactory => options.static_factories.push(candidate.clone()),
                FactoryKind::NonStaticFactory if target != creating => {
                    options.non_static_factories.push(candidate.clone())
                }
                _ => {}
            }
        }
        options
    }

    fn is_marked_singleton(&self, target: TypeKey) -> bool {
        self.singletons.contains(&target)
    }
}

/// 依次询问多个内省实现并合并结果
#[derive(Clone, Default)]
pub struct CompositeIntrospector {
    introspectors: Vec<Arc<dyn TypeIntrospector>>,
}

impl CompositeIntrospector {
    pub fn new(introspectors: Vec<Arc<dyn TypeIntrospector>>) -> Self {
        Self { introspectors }
    }
}

impl TypeIntrospector for CompositeIntrospector {
    fn instantiation_options(&self, target: TypeKey, creating: TypeKey) -> InstantiationOptions {
        let mut options = InstantiationOptions::default();
        for introspector in &self.introspectors {
            options.extend(introspector.instantiation_options(target, creating));
        }
        options
    }

    fn is_marked_singleton(&self, target: TypeKey) -> bool {
        self.introspectors
            .iter()
            .any(|introspector| introspector.is_marked_singleton(target))
    }
}
