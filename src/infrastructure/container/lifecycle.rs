//! 生命周期管理：跟踪需要关闭的实例，关闭容器时统一关闭

use crate::errors::{CloseFailure, InjectError};
use crate::scope::Scope;
use crate::types::{BoxError, Instance, TypeKey};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// 可以被容器关闭的类型
pub trait Closeable: Any + Send + Sync {
    fn close(&self) -> Result<(), BoxError>;
}

/// 类型擦除的关闭函数
pub type CloserFn = Arc<dyn Fn(&Instance) -> Result<(), BoxError> + Send + Sync>;

/// 按类型登记的关闭函数
#[derive(Clone, Default)]
pub struct Closers {
    closers: HashMap<TypeKey, CloserFn>,
}

impl Closers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为类型 `T` 登记关闭函数
    pub fn add<T, E, F>(&mut self, closer: F)
    where
        T: Any + Send + Sync,
        E: Into<BoxError>,
        F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
    {
        let erased: CloserFn = Arc::new(move |instance: &Instance| -> Result<(), BoxError> {
            let typed = instance
                .downcast_ref::<T>()
                .ok_or_else(|| format!("instance is not of type '{}'", TypeKey::of::<T>().description()))?;
            closer(typed).map_err(Into::<BoxError>::into)
        });
        self.closers.insert(TypeKey::of::<T>(), erased);
    }

    pub fn add_closeable<T: Closeable>(&mut self) {
        self.add::<T, BoxError, _>(|instance: &T| instance.close());
    }

    pub fn closer_for(&self, key: &TypeKey) -> Option<CloserFn> {
        self.closers.get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.closers.is_empty()
    }
}

struct Tracked {
    key: TypeKey,
    instance: Instance,
    closer: CloserFn,
}

/// 单个作用域的生命周期管理器
///
/// 实例登记到其定义所在作用域的管理器中，子作用域关闭时不会关闭外层实例。
pub struct LifecycleManager {
    enabled: bool,
    scope: Scope,
    closers: Arc<Closers>,
    tracked: Mutex<Vec<Tracked>>,
    parent: Option<Arc<LifecycleManager>>,
}

impl LifecycleManager {
    pub fn root(enabled: bool, closers: Closers) -> Arc<Self> {
        Arc::new(Self {
            enabled,
            scope: Scope::root(),
            closers: Arc::new(closers),
            tracked: Mutex::new(Vec::new()),
            parent: None,
        })
    }

    pub fn child(self: &Arc<Self>, scope: Scope) -> Arc<Self> {
        Arc::new(Self {
            enabled: self.enabled,
            scope,
            closers: Arc::clone(&self.closers),
            tracked: Mutex::new(Vec::new()),
            parent: Some(Arc::clone(self)),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 登记实例；没有对应关闭函数的类型会被忽略
    pub fn register_instance(&self, key: TypeKey, instance: &Instance, scope: &Scope) -> Result<(), InjectError> {
        if !self.enabled {
            return Ok(());
        }
        if self.scope != *scope {
            return match &self.parent {
                Some(parent) => parent.register_instance(key, instance, scope),
                None => Err(InjectError::Configuration(format!(
                    "Unable to register closeable instance of type '{}' in scope '{}'",
                    key.description(),
                    scope.render()
                ))),
            };
        }
        if let Some(closer) = self.closers.closer_for(&key) {
            tracing::trace!(type_name = %key, scope = %self.scope, "Tracking instance for close");
            self.tracked.lock().push(Tracked {
                key,
                instance: Arc::clone(instance),
                closer,
            });
        }
        Ok(())
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().len()
    }

    /// 按登记的逆序关闭全部实例，失败追加到 `failures`
    ///
    /// 已关闭的实例会被移出列表，重复调用不会再次关闭。
    pub fn close_all(&self, failures: &mut Vec<CloseFailure>) {
        let tracked = std::mem::take(&mut *self.tracked.lock());
        for entry in tracked.into_iter().rev() {
            if let Err(source) = (entry.closer)(&entry.instance) {
                failures.push(CloseFailure {
                    type_name: entry.key.description(),
                    source,
                });
            }
        }
    }
}
