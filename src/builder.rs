//! 声明阶段：收集类型声明，构建时解析并校验

use crate::config::InjectorConfig;
use crate::cycle::validate_no_circular_dependencies;
use crate::definitions::Definitions;
use crate::dependencies::{downcast_instance, Dependencies};
use crate::detection::{Candidate, CompositeIntrospector, Injectable, RegistryIntrospector, TypeIntrospector};
use crate::errors::InjectError;
use crate::infrastructure::container::interception::{Interceptor, TimingInterceptor};
use crate::infrastructure::container::lifecycle::{Closeable, Closers, LifecycleManager};
use crate::infrastructure::container::{Injector, RootParts};
use crate::instantiator::{BindInstantiator, ConstantInstantiator, CustomInstantiator, FactoryFn, Instantiator, ScopeInstantiator};
use crate::logging::OperationTimer;
use crate::scope::{Scope, Scopes};
use crate::statemachine::{self, Detection, States};
use crate::types::{BoxError, Instance, ReusePolicy, SingletonType, TypeKey};
use std::any::Any;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

/// 容器构建器
///
/// 所有声明方法都可以链式调用；声明阶段发现的配置错误会被记录下来，由 [`build`](Self::build) 统一返回。
pub struct InjectorBuilder {
    states: States,
    scopes: Scopes,
    scope: Scope,
    errors: Vec<InjectError>,
    registry: RegistryIntrospector,
    introspectors: Vec<Arc<dyn TypeIntrospector>>,
    default_singleton_type: SingletonType,
    lifecycle_management: bool,
    closers: Closers,
    interceptors: Vec<Arc<dyn Interceptor>>,
    max_instantiation_time: Option<Duration>,
    max_scope_entry_time: Option<Duration>,
}

impl Default for InjectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InjectorBuilder {
    pub fn new() -> Self {
        Self {
            states: States::new(),
            scopes: Scopes::new(),
            scope: Scope::root(),
            errors: Vec::new(),
            registry: RegistryIntrospector::new(),
            introspectors: Vec::new(),
            default_singleton_type: SingletonType::default(),
            lifecycle_management: false,
            closers: Closers::new(),
            interceptors: Vec::new(),
            max_instantiation_time: None,
            max_scope_entry_time: None,
        }
    }

    /// 应用配置文件/环境变量中的设置，只覆盖配置中出现的项
    pub fn with_config(mut self, config: &InjectorConfig) -> Self {
        if let Some(singleton_type) = config.default_singleton_type {
            self.default_singleton_type = singleton_type;
        }
        self.lifecycle_management |= config.lifecycle_management;
        if config.max_instantiation_time.is_some() {
            self.max_instantiation_time = config.max_instantiation_time;
        }
        if config.max_scope_entry_time.is_some() {
            self.max_scope_entry_time = config.max_scope_entry_time;
        }
        self
    }

    fn declare(mut self, key: TypeKey, detection: Detection, reuse_policy: ReusePolicy, allow_duplicates_if_same: bool) -> Self {
        let scope = self.scope.clone();
        if let Err(error) = self
            .states
            .add_or_fail_if_present(key, scope, detection, reuse_policy, allow_duplicates_if_same)
        {
            self.errors.push(error);
        }
        self
    }

    /// 声明类型，构造方式通过内省自动检测
    pub fn with_type<T: Any + Send + Sync>(self) -> Self {
        self.with_type_policy::<T>(ReusePolicy::Prototype)
    }

    pub fn with_type_policy<T: Any + Send + Sync>(self, reuse_policy: ReusePolicy) -> Self {
        let key = TypeKey::of::<T>();
        self.declare(key, Detection::Auto { creating: key }, reuse_policy, false)
    }

    /// 声明类型 `T`，由工厂类型 `F` 上的工厂方法构造
    pub fn with_factory<T: Any + Send + Sync, F: Any + Send + Sync>(self) -> Self {
        self.with_factory_policy::<T, F>(ReusePolicy::Prototype)
    }

    pub fn with_factory_policy<T: Any + Send + Sync, F: Any + Send + Sync>(self, reuse_policy: ReusePolicy) -> Self {
        let creating = TypeKey::of::<F>();
        self.declare(TypeKey::of::<T>(), Detection::Auto { creating }, reuse_policy, false)
    }

    /// 把接口 `I` 绑定到实现 `Impl`，`cast` 把实现包装成接口值
    ///
    /// 接口本身按原型处理，复用策略作用在实现上。
    pub fn with_implementation<I, Impl, C>(self, cast: C) -> Self
    where
        I: Any + Send + Sync,
        Impl: Any + Send + Sync,
        C: Fn(Arc<Impl>) -> I + Send + Sync + 'static,
    {
        self.with_implementation_policy::<I, Impl, C>(cast, ReusePolicy::Prototype)
    }

    pub fn with_implementation_policy<I, Impl, C>(self, cast: C, reuse_policy: ReusePolicy) -> Self
    where
        I: Any + Send + Sync,
        Impl: Any + Send + Sync,
        C: Fn(Arc<Impl>) -> I + Send + Sync + 'static,
    {
        let implementation = TypeKey::of::<Impl>();
        let erased_cast = Arc::new(move |instance: Instance| -> Result<Instance, BoxError> {
            let typed = downcast_instance::<Impl>(instance)?;
            Ok(Arc::new(cast(typed)) as Instance)
        });
        let instantiator: Arc<dyn Instantiator> = Arc::new(BindInstantiator::new(implementation, erased_cast));
        self.declare(
            TypeKey::of::<I>(),
            Detection::Provided(instantiator),
            ReusePolicy::Prototype,
            false,
        )
        .declare(
            implementation,
            Detection::Auto { creating: implementation },
            reuse_policy,
            true,
        )
    }

    /// 用显式依赖元组和工厂函数声明类型
    pub fn with_custom_type<T, D, F>(self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        D: Dependencies,
        F: Fn(D) -> T + Send + Sync + 'static,
    {
        self.with_custom_type_policy(factory, ReusePolicy::Prototype)
    }

    pub fn with_custom_type_policy<T, D, F>(self, factory: F, reuse_policy: ReusePolicy) -> Self
    where
        T: Any + Send + Sync,
        D: Dependencies,
        F: Fn(D) -> T + Send + Sync + 'static,
    {
        self.with_fallible_custom_type::<T, D, Infallible, _>(move |deps| Ok(factory(deps)), reuse_policy)
    }

    /// 工厂函数可能失败，错误会被包装为实例化错误
    pub fn with_fallible_custom_type<T, D, E, F>(self, factory: F, reuse_policy: ReusePolicy) -> Self
    where
        T: Any + Send + Sync,
        D: Dependencies,
        E: Into<BoxError>,
        F: Fn(D) -> Result<T, E> + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        let erased: FactoryFn = Arc::new(move |instances: Vec<Instance>| -> Result<Instance, BoxError> {
            let deps = D::extract(instances)?;
            let value = factory(deps).map_err(Into::<BoxError>::into)?;
            Ok(Arc::new(value) as Instance)
        });
        let instantiator: Arc<dyn Instantiator> = Arc::new(CustomInstantiator::new(key, D::keys(), erased));
        self.with_instantiator(key, instantiator, reuse_policy)
    }

    /// 声明常量，每次获取都返回同一个值
    pub fn with_constant<T: Any + Send + Sync>(self, value: T) -> Self {
        let key = TypeKey::of::<T>();
        let instantiator: Arc<dyn Instantiator> = Arc::new(ConstantInstantiator::new(key, Arc::new(value)));
        self.with_instantiator(key, instantiator, ReusePolicy::Prototype)
    }

    /// 直接提供实例化器
    pub fn with_instantiator(self, key: TypeKey, instantiator: Arc<dyn Instantiator>, reuse_policy: ReusePolicy) -> Self {
        self.declare(key, Detection::Provided(instantiator), reuse_policy, false)
    }

    /// 在以 `S` 为标记的子作用域中声明
    ///
    /// 子作用域中 `S` 本身可以被获取，其值为进入作用域时传入的对象。
    pub fn with_scope<S, F>(mut self, configure: F) -> Self
    where
        S: Any + Send + Sync,
        F: FnOnce(InjectorBuilder) -> InjectorBuilder,
    {
        let marker = TypeKey::of::<S>();
        if let Err(error) = self.scopes.validate_marker_not_used_elsewhere(marker, &self.scope) {
            self.errors.push(error);
            return self;
        }
        let outer = self.scope.clone();
        let child = outer.child(marker);
        let first_entry = !self.scopes.contains(&child);
        self.scopes.add(child.clone());
        self.scope = child;
        if first_entry {
            let instantiator: Arc<dyn Instantiator> = Arc::new(ScopeInstantiator::new(marker));
            self = self.declare(marker, Detection::Provided(instantiator), ReusePolicy::Prototype, true);
        }
        let mut configured = configure(self);
        configured.scope = outer;
        configured
    }

    pub fn using_default_singleton_type(mut self, singleton_type: SingletonType) -> Self {
        self.default_singleton_type = singleton_type;
        self
    }

    pub fn with_lifecycle_management(mut self) -> Self {
        self.lifecycle_management = true;
        self
    }

    /// 为类型 `T` 的实例登记关闭函数，同时启用生命周期管理
    pub fn closing_instances_of_type<T, E, F>(mut self, closer: F) -> Self
    where
        T: Any + Send + Sync,
        E: Into<BoxError>,
        F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
    {
        self.closers.add::<T, E, F>(closer);
        self
    }

    pub fn closing_closeables<T: Closeable>(mut self) -> Self {
        self.closers.add_closeable::<T>();
        self
    }

    /// 预先配置的拦截器，子作用域会继承
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn enforcing_max_instantiation_time(mut self, max: Duration) -> Self {
        self.max_instantiation_time = Some(max);
        self
    }

    pub fn enforcing_max_scope_entry_time(mut self, max: Duration) -> Self {
        self.max_scope_entry_time = Some(max);
        self
    }

    /// 追加一个内省实现，与内置注册表合并使用
    pub fn with_introspector(mut self, introspector: Arc<dyn TypeIntrospector>) -> Self {
        self.introspectors.push(introspector);
        self
    }

    /// 向内置注册表添加候选构造器/工厂方法
    pub fn with_candidates(mut self, candidates: impl IntoIterator<Item = Candidate>) -> Self {
        self.registry.register_all(candidates);
        self
    }

    /// 注册自描述类型的候选并在当前作用域声明它
    pub fn with_injectable<T: Injectable>(mut self) -> Self {
        self.registry.register_injectable::<T>();
        self.with_type::<T>()
    }

    /// 解析全部声明，校验循环依赖，创建根容器并预加载急切单例
    pub fn build(self) -> Result<Injector, InjectError> {
        let timer = OperationTimer::new("build");
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let mut introspectors: Vec<Arc<dyn TypeIntrospector>> = vec![Arc::new(self.registry)];
        introspectors.extend(self.introspectors);
        let introspector = CompositeIntrospector::new(introspectors);

        let contexts = statemachine::resolve(self.states, &introspector)?;
        let definitions = Definitions::new(contexts, self.scopes, self.default_singleton_type)?;
        validate_no_circular_dependencies(&definitions)?;

        let lifecycle_enabled = self.lifecycle_management || !self.closers.is_empty();
        let lifecycle = LifecycleManager::root(lifecycle_enabled, self.closers);

        let mut interceptors = self.interceptors;
        if let Some(max) = self.max_instantiation_time {
            interceptors.push(Arc::new(TimingInterceptor::new(max)));
        }

        let injector = Injector::new_root(RootParts {
            definitions,
            lifecycle,
            interceptors,
            max_scope_entry_time: self.max_scope_entry_time,
        })?;
        timer.finish();
        Ok(injector)
    }
}
