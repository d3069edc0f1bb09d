use crate::dependencies::{downcast_instance, Dependencies};
use crate::instantiator::{FactoryFn, FactoryInstantiator, FactoryKind, Instantiator};
use crate::types::{BoxError, Instance, TypeKey};
use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

/// 一个候选的构造器或工厂方法
///
/// 相当于反射扫描到的一个公开构造器/方法：带描述、参数列表、
/// 是否被标注为注入入口，以及实际调用它的函数。
#[derive(Clone)]
pub struct Candidate {
    kind: FactoryKind,
    owner: TypeKey,
    produces: TypeKey,
    name: String,
    parameters: Vec<TypeKey>,
    marked_for_injection: bool,
    factory: FactoryFn,
}

impl Candidate {
    /// `T` 自身的构造器
    pub fn constructor<T, D, F>(name: impl Into<String>, constructor: F) -> Self
    where
        T: Any + Send + Sync,
        D: Dependencies,
        F: Fn(D) -> T + Send + Sync + 'static,
    {
        Self::try_constructor::<T, D, Infallible, _>(name, move |deps| Ok(constructor(deps)))
    }

    /// 可能失败的构造器
    pub fn try_constructor<T, D, E, F>(name: impl Into<String>, constructor: F) -> Self
    where
        T: Any + Send + Sync,
        D: Dependencies,
        E: Into<BoxError>,
        F: Fn(D) -> Result<T, E> + Send + Sync + 'static,
    {
        Self {
            kind: FactoryKind::Constructor,
            owner: TypeKey::of::<T>(),
            produces: TypeKey::of::<T>(),
            name: name.into(),
            parameters: D::keys(),
            marked_for_injection: false,
            factory: erase(constructor),
        }
    }

    /// `Owner` 上返回 `T` 的静态工厂方法
    pub fn static_factory<Owner, T, D, F>(name: impl Into<String>, factory: F) -> Self
    where
        Owner: Any,
        T: Any + Send + Sync,
        D: Dependencies,
        F: Fn(D) -> T + Send + Sync + 'static,
    {
        Self::try_static_factory::<Owner, T, D, Infallible, _>(name, move |deps| Ok(factory(deps)))
    }

    pub fn try_static_factory<Owner, T, D, E, F>(name: impl Into<String>, factory: F) -> Self
    where
        Owner: Any,
        T: Any + Send + Sync,
        D: Dependencies,
        E: Into<BoxError>,
        F: Fn(D) -> Result<T, E> + Send + Sync + 'static,
    {
        Self {
            kind: FactoryKind::StaticFactory,
            owner: TypeKey::of::<Owner>(),
            produces: TypeKey::of::<T>(),
            name: name.into(),
            parameters: D::keys(),
            marked_for_injection: false,
            factory: erase(factory),
        }
    }

    /// `Owner` 实例上返回 `T` 的方法，`Owner` 本身成为第一个依赖
    pub fn non_static_factory<Owner, T, D, F>(name: impl Into<String>, method: F) -> Self
    where
        Owner: Any + Send + Sync,
        T: Any + Send + Sync,
        D: Dependencies,
        F: Fn(&Owner, D) -> T + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move |mut instances: Vec<Instance>| -> Result<Instance, BoxError> {
            if instances.is_empty() {
                return Err(format!("missing receiver '{}'", TypeKey::of::<Owner>().description()).into());
            }
            let receiver = downcast_instance::<Owner>(instances.remove(0))?;
            let deps = D::extract(instances)?;
            Ok(Arc::new(method(&receiver, deps)) as Instance)
        });
        Self {
            kind: FactoryKind::NonStaticFactory,
            owner: TypeKey::of::<Owner>(),
            produces: TypeKey::of::<T>(),
            name: name.into(),
            parameters: D::keys(),
            marked_for_injection: false,
            factory,
        }
    }

    /// 标注为注入入口，多个候选时优先选择
    pub fn mark_for_injection(mut self) -> Self {
        self.marked_for_injection = true;
        self
    }

    pub fn kind(&self) -> FactoryKind {
        self.kind
    }

    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    pub fn produces(&self) -> TypeKey {
        self.produces
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_marked_for_injection(&self) -> bool {
        self.marked_for_injection
    }

    /// 实例化器看到的依赖：非静态工厂额外依赖其接收者
    pub fn dependencies(&self) -> Vec<TypeKey> {
        match self.kind {
            FactoryKind::NonStaticFactory => {
                let mut dependencies = Vec::with_capacity(self.parameters.len() + 1);
                dependencies.push(self.owner);
                dependencies.extend_from_slice(&self.parameters);
                dependencies
            }
            _ => self.parameters.clone(),
        }
    }

    pub fn into_instantiator(self) -> Arc<dyn Instantiator> {
        let dependencies = self.dependencies();
        Arc::new(FactoryInstantiator::new(self.kind, self.name, dependencies, self.factory))
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("produces", &self.produces)
            .field("marked_for_injection", &self.marked_for_injection)
            .finish()
    }
}

fn erase<T, D, E, F>(function: F) -> FactoryFn
where
    T: Any + Send + Sync,
    D: Dependencies,
    E: Into<BoxError>,
    F: Fn(D) -> Result<T, E> + Send + Sync + 'static,
{
    Arc::new(move |instances: Vec<Instance>| -> Result<Instance, BoxError> {
        let deps = D::extract(instances)?;
        let value = function(deps).map_err(Into::<BoxError>::into)?;
        Ok(Arc::new(value) as Instance)
    })
}
