//! 实例化拦截

use super::Injector;
use crate::errors::InjectError;
use crate::types::{Instance, ReusePolicy, TypeKey};
use std::sync::Arc;
use std::time::Duration;

/// 一次完成的实例化
#[derive(Debug, Clone, Copy)]
pub struct InstantiationEvent {
    pub key: TypeKey,
    /// 触发这次实例化的最外层请求类型
    pub root: TypeKey,
    pub reuse_policy: ReusePolicy,
    pub elapsed: Duration,
}

/// 拦截器
///
/// 实例化前按注册顺序询问，第一个返回值的拦截器短路实例化（此时不再运行后置钩子）；
/// 实例化后按注册顺序依次处理实例，每个都可以替换它。
pub trait Interceptor: Send + Sync {
    fn intercept_before_instantiation(&self, _key: TypeKey, _root: TypeKey) -> Result<Option<Instance>, InjectError> {
        Ok(None)
    }

    fn intercept_after_instantiation(
        &self,
        _event: &InstantiationEvent,
        instance: Instance,
    ) -> Result<Instance, InjectError> {
        Ok(instance)
    }

    /// 进入子作用域时为子容器派生拦截器，`None` 表示沿用自身
    fn enter_scope(&self, _marker: TypeKey, _scope_object: &Instance) -> Result<Option<Arc<dyn Interceptor>>, InjectError> {
        Ok(None)
    }
}

/// 由闭包实现的前置拦截器
pub struct FnInterceptor<F> {
    intercept: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(TypeKey) -> Option<Instance> + Send + Sync,
{
    pub fn new(intercept: F) -> Self {
        Self { intercept }
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(TypeKey) -> Option<Instance> + Send + Sync,
{
    fn intercept_before_instantiation(&self, key: TypeKey, _root: TypeKey) -> Result<Option<Instance>, InjectError> {
        Ok((self.intercept)(key))
    }
}

/// 单次实例化超过上限时报错
pub struct TimingInterceptor {
    max: Duration,
}

impl TimingInterceptor {
    pub fn new(max: Duration) -> Self {
        Self { max }
    }
}

impl Interceptor for TimingInterceptor {
    fn intercept_after_instantiation(
        &self,
        event: &InstantiationEvent,
        instance: Instance,
    ) -> Result<Instance, InjectError> {
        if event.elapsed <= self.max {
            return Ok(instance);
        }
        tracing::warn!(
            type_name = %event.key,
            elapsed_ms = event.elapsed.as_millis(),
            max_ms = self.max.as_millis(),
            "Instantiation exceeded enforced maximum"
        );
        Err(InjectError::InstantiationTimeExceeded {
            type_name: event.key.description(),
            root_type_name: event.root.description(),
            instance,
            elapsed_ms: event.elapsed.as_millis(),
            max_ms: self.max.as_millis(),
            reuse_policy: event.reuse_policy.to_string(),
        })
    }
}

/// 用另一个容器能提供的实例覆盖本容器的实例化
pub struct OverwritingInterceptor {
    overlay: Injector,
}

impl OverwritingInterceptor {
    pub fn new(overlay: Injector) -> Self {
        Self { overlay }
    }
}

impl Interceptor for OverwritingInterceptor {
    fn intercept_before_instantiation(&self, key: TypeKey, _root: TypeKey) -> Result<Option<Instance>, InjectError> {
        if !self.overlay.can_instantiate_key(&key) {
            return Ok(None);
        }
        self.overlay.get_instance_by_key(key).map(Some)
    }

    fn enter_scope(&self, marker: TypeKey, scope_object: &Instance) -> Result<Option<Arc<dyn Interceptor>>, InjectError> {
        let scoped = self
            .overlay
            .enter_scope_if_exists_with_key(marker, Arc::clone(scope_object))?;
        Ok(scoped.map(|overlay| Arc::new(OverwritingInterceptor::new(overlay)) as Arc<dyn Interceptor>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[test]
    fn test_timing_interceptor() {
        let interceptor = TimingInterceptor::new(Duration::from_millis(10));
        let event = InstantiationEvent {
            key: TypeKey::of::<Slow>(),
            root: TypeKey::of::<Slow>(),
            reuse_policy: ReusePolicy::LazySingleton,
            elapsed: Duration::from_millis(25),
        };
        let error = interceptor
            .intercept_after_instantiation(&event, Arc::new(Slow))
            .err()
            .unwrap();
        assert_eq!(
            error.to_string(),
            "took 25ms to instantiate object of type Slow but only 10ms allowed\nreuse policy: LAZY_SINGLETON"
        );

        let fast = InstantiationEvent {
            elapsed: Duration::from_millis(2),
            ..event
        };
        assert!(interceptor.intercept_after_instantiation(&fast, Arc::new(Slow)).is_ok());
    }

    #[test]
    fn test_fn_interceptor_short_circuits_selected_types() {
        let interceptor = FnInterceptor::new(|key: TypeKey| {
            (key == TypeKey::of::<String>()).then(|| Arc::new(String::from("mock")) as Instance)
        });
        assert!(interceptor
            .intercept_before_instantiation(TypeKey::of::<String>(), TypeKey::of::<String>())
            .unwrap()
            .is_some());
        assert!(interceptor
            .intercept_before_instantiation(TypeKey::of::<u8>(), TypeKey::of::<u8>())
            .unwrap()
            .is_none());
    }
}
