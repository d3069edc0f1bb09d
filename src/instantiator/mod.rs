//! 实例化器：描述“给定已解析的依赖，如何构造某个类型的值”

use crate::infrastructure::container::Injector;
use crate::scope::ScopeManager;
use crate::types::{BoxError, Instance, TypeKey};
use std::fmt;
use std::sync::Arc;

/// 类型擦除的工厂函数，参数按 `dependencies()` 的顺序排列
pub type FactoryFn = Arc<dyn Fn(Vec<Instance>) -> Result<Instance, BoxError> + Send + Sync>;

/// 实例化器
pub trait Instantiator: Send + Sync {
    /// 构造前需要先解析的依赖
    fn dependencies(&self) -> Vec<TypeKey>;

    /// 用已解析的依赖构造实例
    fn instantiate(
        &self,
        dependencies: Vec<Instance>,
        scope_objects: &ScopeManager,
        injector: &Injector,
    ) -> Result<Instance, BoxError>;

    /// 诊断信息中使用的描述
    fn description(&self) -> String;
}

impl fmt::Debug for dyn Instantiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// 构造器或工厂方法的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryKind {
    Constructor,
    StaticFactory,
    NonStaticFactory,
}

/// 由 TypeIntrospector 提供的构造器/工厂方法调用
pub struct FactoryInstantiator {
    kind: FactoryKind,
    name: String,
    dependencies: Vec<TypeKey>,
    factory: FactoryFn,
}

impl FactoryInstantiator {
    pub fn new(kind: FactoryKind, name: String, dependencies: Vec<TypeKey>, factory: FactoryFn) -> Self {
        Self {
            kind,
            name,
            dependencies,
            factory,
        }
    }
}

impl Instantiator for FactoryInstantiator {
    fn dependencies(&self) -> Vec<TypeKey> {
        self.dependencies.clone()
    }

    fn instantiate(
        &self,
        dependencies: Vec<Instance>,
        _scope_objects: &ScopeManager,
        _injector: &Injector,
    ) -> Result<Instance, BoxError> {
        (self.factory)(dependencies)
    }

    fn description(&self) -> String {
        match self.kind {
            FactoryKind::Constructor => format!("constructor '{}'", self.name),
            FactoryKind::StaticFactory => format!("static method '{}'", self.name),
            FactoryKind::NonStaticFactory => format!("method '{}'", self.name),
        }
    }
}

/// 常量
pub struct ConstantInstantiator {
    key: TypeKey,
    value: Instance,
}

impl ConstantInstantiator {
    pub fn new(key: TypeKey, value: Instance) -> Self {
        Self { key, value }
    }
}

impl Instantiator for ConstantInstantiator {
    fn dependencies(&self) -> Vec<TypeKey> {
        Vec::new()
    }

    fn instantiate(&self, _: Vec<Instance>, _: &ScopeManager, _: &Injector) -> Result<Instance, BoxError> {
        Ok(self.value.clone())
    }

    fn description(&self) -> String {
        format!("constant of type '{}'", self.key.description())
    }
}

/// 接口到实现的绑定，通过转换函数把实现包装成接口类型的值
pub struct BindInstantiator {
    implementation: TypeKey,
    cast: Arc<dyn Fn(Instance) -> Result<Instance, BoxError> + Send + Sync>,
}

impl BindInstantiator {
    pub fn new(
        implementation: TypeKey,
        cast: Arc<dyn Fn(Instance) -> Result<Instance, BoxError> + Send + Sync>,
    ) -> Self {
        Self { implementation, cast }
    }
}

impl Instantiator for BindInstantiator {
    fn dependencies(&self) -> Vec<TypeKey> {
        vec![self.implementation]
    }

    fn instantiate(&self, mut dependencies: Vec<Instance>, _: &ScopeManager, _: &Injector) -> Result<Instance, BoxError> {
        let implementation = dependencies
            .pop()
            .ok_or_else(|| format!("missing implementation '{}'", self.implementation.description()))?;
        (self.cast)(implementation)
    }

    fn description(&self) -> String {
        format!("delegation to implementation '{}'", self.implementation.description())
    }
}

/// 用户自定义的工厂函数，依赖显式声明
pub struct CustomInstantiator {
    key: TypeKey,
    dependencies: Vec<TypeKey>,
    factory: FactoryFn,
}

impl CustomInstantiator {
    pub fn new(key: TypeKey, dependencies: Vec<TypeKey>, factory: FactoryFn) -> Self {
        Self {
            key,
            dependencies,
            factory,
        }
    }
}

impl Instantiator for CustomInstantiator {
    fn dependencies(&self) -> Vec<TypeKey> {
        self.dependencies.clone()
    }

    fn instantiate(&self, dependencies: Vec<Instance>, _: &ScopeManager, _: &Injector) -> Result<Instance, BoxError> {
        (self.factory)(dependencies)
    }

    fn description(&self) -> String {
        format!("custom instantiation of '{}'", self.key.description())
    }
}

/// 返回容器自身（当前作用域的那个容器）
pub struct SelfInstantiator;

impl Instantiator for SelfInstantiator {
    fn dependencies(&self) -> Vec<TypeKey> {
        Vec::new()
    }

    fn instantiate(&self, _: Vec<Instance>, _: &ScopeManager, injector: &Injector) -> Result<Instance, BoxError> {
        Ok(Arc::new(injector.clone()))
    }

    fn description(&self) -> String {
        "injector".to_string()
    }
}

/// 返回进入作用域时绑定的作用域对象
pub struct ScopeInstantiator {
    marker: TypeKey,
}

impl ScopeInstantiator {
    pub fn new(marker: TypeKey) -> Self {
        Self { marker }
    }
}

impl Instantiator for ScopeInstantiator {
    fn dependencies(&self) -> Vec<TypeKey> {
        Vec::new()
    }

    fn instantiate(&self, _: Vec<Instance>, scope_objects: &ScopeManager, _: &Injector) -> Result<Instance, BoxError> {
        scope_objects
            .scope_object(&self.marker)
            .ok_or_else(|| format!("no scope object bound for '{}'", self.marker.description()).into())
    }

    fn description(&self) -> String {
        format!("scope object of type '{}'", self.marker.description())
    }
}
