//! 运行期容器
//!
//! 构建后的 [`Injector`] 只读地共享同一份 [`Definitions`]；每进入一次作用域就派生一个子容器，
//! 子容器拥有自己的单例缓存、拦截器列表和生命周期管理器，外层定义的单例委托给父容器。

pub mod interception;
pub mod lifecycle;
pub mod singleton_store;
pub mod timing;

use crate::definitions::{Definition, Definitions};
use crate::dependencies::downcast_instance;
use crate::errors::{CloseFailure, InjectError};
use crate::logging::OperationTimer;
use crate::scope::{Scope, ScopeManager};
use crate::types::{Instance, TypeKey};
use interception::{FnInterceptor, InstantiationEvent, Interceptor, OverwritingInterceptor};
use lifecycle::LifecycleManager;
use parking_lot::{Mutex, RwLock};
use singleton_store::SingletonStore;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use timing::{ErasedTimedInstantiation, InstantiationTime, InstantiationTimes, TimedInstantiation};
use uuid::Uuid;

/// 依赖注入容器句柄，克隆后指向同一个容器
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

struct InjectorInner {
    id: Uuid,
    definitions: Arc<Definitions>,
    scope: Scope,
    scope_objects: ScopeManager,
    singletons: Arc<SingletonStore>,
    lifecycle: Arc<LifecycleManager>,
    interceptors: RwLock<Vec<Arc<dyn Interceptor>>>,
    max_scope_entry_time: Option<Duration>,
    instantiation_times: InstantiationTimes,
    children: Mutex<Vec<Injector>>,
    parent: Option<Weak<InjectorInner>>,
}

/// 构建根容器所需的部件
pub(crate) struct RootParts {
    pub definitions: Definitions,
    pub lifecycle: Arc<LifecycleManager>,
    pub interceptors: Vec<Arc<dyn Interceptor>>,
    pub max_scope_entry_time: Option<Duration>,
}

impl Injector {
    /// 创建根容器并预加载急切单例
    pub(crate) fn new_root(parts: RootParts) -> Result<Self, InjectError> {
        let injector = Self {
            inner: Arc::new(InjectorInner {
                id: Uuid::new_v4(),
                definitions: Arc::new(parts.definitions),
                scope: Scope::root(),
                scope_objects: ScopeManager::new(),
                singletons: SingletonStore::root(),
                lifecycle: parts.lifecycle,
                interceptors: RwLock::new(parts.interceptors),
                max_scope_entry_time: parts.max_scope_entry_time,
                instantiation_times: InstantiationTimes::new(),
                children: Mutex::new(Vec::new()),
                parent: None,
            }),
        };
        injector.load_eager_singletons()?;
        tracing::debug!(
            injector_id = %injector.inner.id,
            definitions = injector.inner.definitions.len(),
            scopes = injector.inner.definitions.all_scopes().as_slice().len(),
            "Injector built"
        );
        Ok(injector)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// 当前容器所在的作用域
    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    /// 获取类型 `T` 的实例
    pub fn get_instance<T: Any + Send + Sync>(&self) -> Result<Arc<T>, InjectError> {
        let instance = self.get_instance_by_key(TypeKey::of::<T>())?;
        downcast_instance::<T>(instance)
    }

    /// 获取实例的克隆，适合 `Arc<dyn Trait>` 这类接口值
    pub fn get_cloned<T: Clone + Any + Send + Sync>(&self) -> Result<T, InjectError> {
        Ok(T::clone(&*self.get_instance::<T>()?))
    }

    /// 按类型标识获取类型擦除的实例
    pub fn get_instance_by_key(&self, key: TypeKey) -> Result<Instance, InjectError> {
        self.get_timed(key, key).map(|timed| timed.instance)
    }

    /// 获取实例以及本次实例化的耗时树
    pub fn get_instance_timed<T: Any + Send + Sync>(&self) -> Result<TimedInstantiation<T>, InjectError> {
        let key = TypeKey::of::<T>();
        let TimedInstantiation { instance, time } = self.get_timed(key, key)?;
        Ok(TimedInstantiation {
            instance: downcast_instance::<T>(instance)?,
            time,
        })
    }

    pub fn can_instantiate<T: Any>(&self) -> bool {
        self.can_instantiate_key(&TypeKey::of::<T>())
    }

    pub fn can_instantiate_key(&self, key: &TypeKey) -> bool {
        self.inner.definitions.has_definition_for(key, &self.inner.scope)
    }

    /// 进入以 `S` 为标记的子作用域，`scope_object` 在子作用域中可以作为 `S` 被获取
    pub fn enter_scope<S: Any + Send + Sync>(&self, scope_object: S) -> Result<Injector, InjectError> {
        self.enter_scope_with_key(TypeKey::of::<S>(), Arc::new(scope_object))
    }

    pub fn enter_scope_with_key(&self, marker: TypeKey, scope_object: Instance) -> Result<Injector, InjectError> {
        self.enter_scope_enforced(marker, scope_object, self.inner.max_scope_entry_time)
    }

    /// 作用域未声明时返回 `None`
    pub fn enter_scope_if_exists<S: Any + Send + Sync>(&self, scope_object: S) -> Result<Option<Injector>, InjectError> {
        self.enter_scope_if_exists_with_key(TypeKey::of::<S>(), Arc::new(scope_object))
    }

    pub fn enter_scope_if_exists_with_key(
        &self,
        marker: TypeKey,
        scope_object: Instance,
    ) -> Result<Option<Injector>, InjectError> {
        self.create_child(marker, scope_object)
    }

    /// 进入作用域，耗时超过 `max` 时报错
    pub fn enter_scope_with_timeout<S: Any + Send + Sync>(
        &self,
        scope_object: S,
        max: Duration,
    ) -> Result<Injector, InjectError> {
        self.enter_scope_enforced(TypeKey::of::<S>(), Arc::new(scope_object), Some(max))
    }

    fn enter_scope_enforced(
        &self,
        marker: TypeKey,
        scope_object: Instance,
        max: Option<Duration>,
    ) -> Result<Injector, InjectError> {
        let start = Instant::now();
        let child_scope = self.inner.scope.child(marker);
        let scoped = self
            .create_child(marker, scope_object)?
            .ok_or_else(|| InjectError::UnknownScope {
                scope: child_scope.render(),
                registered: self.inner.definitions.all_scopes().render_sorted(),
            })?;
        let elapsed = start.elapsed();
        match max {
            Some(max) if elapsed > max => {
                let error = InjectError::ScopeEntryTimeExceeded {
                    scope: child_scope.render(),
                    elapsed_ms: elapsed.as_millis(),
                    max_ms: max.as_millis(),
                    instantiation_times: scoped.inner.instantiation_times.render(),
                };
                if let Err(close_error) = scoped.close() {
                    tracing::warn!(error = %close_error, "Failed to close aborted scope");
                }
                Err(error)
            }
            _ => Ok(scoped),
        }
    }

    fn create_child(&self, marker: TypeKey, scope_object: Instance) -> Result<Option<Injector>, InjectError> {
        let child_scope = self.inner.scope.child(marker);
        if !self.inner.definitions.all_scopes().contains(&child_scope) {
            return Ok(None);
        }
        let timer = OperationTimer::new("enter_scope").with_metadata("scope", &child_scope.render());

        let current: Vec<Arc<dyn Interceptor>> = self.inner.interceptors.read().clone();
        let mut interceptors = Vec::with_capacity(current.len());
        for interceptor in &current {
            let scoped = interceptor.enter_scope(marker, &scope_object)?;
            interceptors.push(scoped.unwrap_or_else(|| Arc::clone(interceptor)));
        }

        let child = Injector {
            inner: Arc::new(InjectorInner {
                id: Uuid::new_v4(),
                definitions: Arc::clone(&self.inner.definitions),
                scope: child_scope.clone(),
                scope_objects: self.inner.scope_objects.add(marker, scope_object),
                singletons: self.inner.singletons.child(marker),
                lifecycle: self.inner.lifecycle.child(child_scope.clone()),
                interceptors: RwLock::new(interceptors),
                max_scope_entry_time: self.inner.max_scope_entry_time,
                instantiation_times: InstantiationTimes::new(),
                children: Mutex::new(Vec::new()),
                parent: Some(Arc::downgrade(&self.inner)),
            }),
        };
        // 急切单例失败时立即关闭已创建的实例，父容器不持有失败的子容器
        if let Err(error) = child.load_eager_singletons() {
            if let Err(close_error) = child.close() {
                tracing::warn!(error = %close_error, "Failed to close aborted scope");
            }
            return Err(error);
        }
        // 只有需要关闭时才由父容器持有子容器
        if self.inner.lifecycle.is_enabled() {
            self.inner.children.lock().push(child.clone());
        }

        tracing::debug!(
            parent_id = %self.inner.id,
            injector_id = %child.inner.id,
            scope = %child_scope,
            "Entered scope"
        );
        timer.finish();
        Ok(Some(child))
    }

    fn load_eager_singletons(&self) -> Result<(), InjectError> {
        self.initialize_definitions(|definition| definition.reuse_policy.is_eager(), None)
    }

    /// 立即创建当前作用域可见的所有单例，已创建的不会重复创建
    pub fn initialize_all_singletons(&self) -> Result<(), InjectError> {
        self.initialize_definitions(|definition| definition.reuse_policy.is_singleton(), None)
    }

    pub fn initialize_all_singletons_with_timeout(&self, max: Duration) -> Result<(), InjectError> {
        self.initialize_definitions(|definition| definition.reuse_policy.is_singleton(), Some(max))
    }

    fn initialize_definitions(
        &self,
        predicate: impl Fn(&Definition) -> bool,
        max: Option<Duration>,
    ) -> Result<(), InjectError> {
        let start = Instant::now();
        let keys: Vec<TypeKey> = self
            .inner
            .definitions
            .visible_from(&self.inner.scope)
            .into_iter()
            .filter(|definition| predicate(definition))
            .map(|definition| definition.key)
            .collect();
        for key in keys {
            let timed = self.get_timed(key, key)?;
            self.inner.instantiation_times.add(timed.time);
        }
        let elapsed = start.elapsed();
        match max {
            Some(max) if elapsed > max => Err(InjectError::InitializationTimeExceeded {
                elapsed_ms: elapsed.as_millis(),
                max_ms: max.as_millis(),
                instantiation_times: self.inner.instantiation_times.render(),
            }),
            _ => Ok(()),
        }
    }

    /// 初始化阶段记录的耗时
    pub fn instantiation_times(&self) -> &InstantiationTimes {
        &self.inner.instantiation_times
    }

    /// 添加一个前置拦截器：返回 `Some` 时直接使用该实例
    pub fn add_interceptor<F>(&self, intercept: F)
    where
        F: Fn(TypeKey) -> Option<Instance> + Send + Sync + 'static,
    {
        self.register_interceptor(Arc::new(FnInterceptor::new(intercept)));
    }

    pub fn register_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        self.inner.interceptors.write().push(interceptor);
    }

    /// 对 `overlay` 能提供的类型，改用 `overlay` 的实例
    pub fn overwrite_with(&self, overlay: &Injector) {
        self.register_interceptor(Arc::new(OverwritingInterceptor::new(overlay.clone())));
    }

    /// 把容器外创建的对象纳入当前作用域的生命周期管理
    pub fn register_external_object<T: Any + Send + Sync>(&self, object: Arc<T>) -> Result<(), InjectError> {
        let instance: Instance = object;
        self.inner
            .lifecycle
            .register_instance(TypeKey::of::<T>(), &instance, &self.inner.scope)
    }

    /// 全部定义的调试输出
    pub fn debug_information(&self) -> String {
        self.inner.definitions.dump()
    }

    /// 先关闭子容器，再按登记逆序关闭本容器跟踪的实例，最后从父容器中移除自身
    pub fn close(&self) -> Result<(), InjectError> {
        let mut failures = Vec::new();
        self.close_into(&mut failures);
        tracing::debug!(
            injector_id = %self.inner.id,
            scope = %self.inner.scope,
            failures = failures.len(),
            "Injector closed"
        );
        if failures.is_empty() {
            return Ok(());
        }
        tracing::warn!(failures = failures.len(), "Exceptions during close");
        Err(InjectError::Close { failures })
    }

    fn close_into(&self, failures: &mut Vec<CloseFailure>) {
        let children = std::mem::take(&mut *self.inner.children.lock());
        for child in &children {
            child.close_into(failures);
        }
        self.inner.lifecycle.close_all(failures);
        if let Some(parent) = self.inner.parent.as_ref().and_then(Weak::upgrade) {
            parent
                .children
                .lock()
                .retain(|child| !Arc::ptr_eq(&child.inner, &self.inner));
        }
    }

    fn get_timed(&self, key: TypeKey, root: TypeKey) -> Result<ErasedTimedInstantiation, InjectError> {
        let interceptors: Vec<Arc<dyn Interceptor>> = self.inner.interceptors.read().clone();
        let start = Instant::now();
        for interceptor in &interceptors {
            if let Some(instance) = interceptor.intercept_before_instantiation(key, root)? {
                tracing::trace!(type_name = %key, "Instantiation intercepted");
                return Ok(TimedInstantiation {
                    instance,
                    time: InstantiationTime::leaf(key, start.elapsed()),
                });
            }
        }

        let definition = self.inner.definitions.definition_for(&key, &self.inner.scope)?;
        let TimedInstantiation { mut instance, mut time } = self.create_and_register(definition, root)?;

        let event = InstantiationEvent {
            key,
            root,
            reuse_policy: definition.reuse_policy,
            elapsed: time.elapsed(),
        };
        let after = Instant::now();
        for interceptor in &interceptors {
            instance = interceptor.intercept_after_instantiation(&event, instance)?;
        }
        time.add(after.elapsed());
        Ok(TimedInstantiation { instance, time })
    }

    fn create_and_register(&self, definition: &Definition, root: TypeKey) -> Result<ErasedTimedInstantiation, InjectError> {
        if !definition.reuse_policy.is_singleton() {
            let timed = self.instantiate(definition, root)?;
            self.inner
                .lifecycle
                .register_instance(definition.key, &timed.instance, &definition.scope)?;
            return Ok(timed);
        }

        let start = Instant::now();
        let mut fresh = None;
        let (instance, created) = self
            .inner
            .singletons
            .get_or_create(definition.key, &definition.scope, || {
                let timed = self.instantiate(definition, root)?;
                self.inner
                    .lifecycle
                    .register_instance(definition.key, &timed.instance, &definition.scope)?;
                fresh = Some(timed.time);
                Ok(timed.instance)
            })?;
        let time = match fresh {
            Some(time) if created => time,
            _ => InstantiationTime::leaf(definition.key, start.elapsed()),
        };
        Ok(TimedInstantiation { instance, time })
    }

    fn instantiate(&self, definition: &Definition, root: TypeKey) -> Result<ErasedTimedInstantiation, InjectError> {
        let start = Instant::now();
        let instantiator = &definition.instantiator;
        let dependencies = instantiator.dependencies();
        let mut instances = Vec::with_capacity(dependencies.len());
        let mut times = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let timed = self.get_timed(dependency, root)?;
            instances.push(timed.instance);
            times.push(timed.time);
        }

        let instance = instantiator
            .instantiate(instances, &self.inner.scope_objects, self)
            .map_err(|source| InjectError::Instantiation {
                type_name: definition.key.description(),
                instantiator: instantiator.description(),
                source,
            })?;
        tracing::trace!(
            type_name = %definition.key,
            scope = %definition.scope,
            reuse_policy = %definition.reuse_policy,
            "Instantiated"
        );
        Ok(TimedInstantiation {
            instance,
            time: InstantiationTime::new(definition.key, start.elapsed(), times),
        })
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("id", &self.inner.id)
            .field("scope", &self.inner.scope)
            .finish()
    }
}
