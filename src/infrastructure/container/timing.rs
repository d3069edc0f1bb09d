//! 实例化耗时记录

use crate::types::TypeKey;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// 单次实例化的耗时，连同其依赖的耗时构成一棵树
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiationTime {
    key: TypeKey,
    elapsed: Duration,
    dependencies: Vec<InstantiationTime>,
}

impl InstantiationTime {
    pub fn new(key: TypeKey, elapsed: Duration, dependencies: Vec<InstantiationTime>) -> Self {
        Self {
            key,
            elapsed,
            dependencies,
        }
    }

    /// 没有依赖的叶子节点（拦截或缓存命中）
    pub fn leaf(key: TypeKey, elapsed: Duration) -> Self {
        Self::new(key, elapsed, Vec::new())
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn millis(&self) -> u128 {
        self.elapsed.as_millis()
    }

    pub fn dependencies(&self) -> &[InstantiationTime] {
        &self.dependencies
    }

    pub(crate) fn add(&mut self, extra: Duration) {
        self.elapsed += extra;
    }

    /// 每层缩进一个制表符：`<ms>ms <Type>`
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        self.render_into("", &mut lines);
        lines.join("\n")
    }

    fn render_into(&self, indentation: &str, lines: &mut Vec<String>) {
        lines.push(format!("{}{}ms {}", indentation, self.millis(), self.key.description()));
        let child_indentation = format!("{}\t", indentation);
        for dependency in &self.dependencies {
            dependency.render_into(&child_indentation, lines);
        }
    }
}

/// 实例及其耗时
pub struct TimedInstantiation<T: ?Sized> {
    pub instance: Arc<T>,
    pub time: InstantiationTime,
}

/// 类型擦除的实例及其耗时
pub type ErasedTimedInstantiation = TimedInstantiation<dyn Any + Send + Sync>;

/// 容器记录的初始化耗时（预加载与 `initialize_all_singletons`）
#[derive(Default)]
pub struct InstantiationTimes {
    times: Mutex<BTreeMap<TypeKey, InstantiationTime>>,
}

impl InstantiationTimes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, time: InstantiationTime) {
        self.times.lock().insert(time.key(), time);
    }

    pub fn time_for(&self, key: &TypeKey) -> Option<InstantiationTime> {
        self.times.lock().get(key).cloned()
    }

    pub fn all(&self) -> Vec<InstantiationTime> {
        self.times.lock().values().cloned().collect()
    }

    /// 按类型名排序后逐棵渲染
    pub fn render(&self) -> String {
        self.times
            .lock()
            .values()
            .map(InstantiationTime::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
