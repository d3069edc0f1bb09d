//! 类型标识与复用策略
//!
//! 容器内部全部通过 [`TypeKey`] 引用类型，实例统一擦除为 [`Instance`]。

use serde::Deserialize;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 类型擦除后的实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 用户工厂、关闭器等返回的通用错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 类型标识
///
/// 相等性与哈希只看 `TypeId`；排序按完整类型名，保证输出稳定。
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// 获取类型 `T` 的标识
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// 完整类型名（含模块路径）
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 去掉模块路径后的类型描述，泛型参数同样处理
    ///
    /// `alloc::sync::Arc<dyn app::Greeter>` 会被渲染为 `Arc<dyn Greeter>`。
    pub fn description(&self) -> String {
        simplify_type_name(self.name)
    }

    /// 判断实例是否确实是该类型的值
    pub fn matches(&self, instance: &Instance) -> bool {
        (**instance).type_id() == self.id
    }
}

fn simplify_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.truncate(segment_start);
        } else if c.is_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push(c);
            segment_start = out.len();
        }
    }
    out
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(other.name).then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// 实例复用策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReusePolicy {
    /// 每次获取都创建新实例
    Prototype,
    /// 首次获取时创建并缓存
    LazySingleton,
    /// 容器构建或进入作用域时立即创建
    EagerSingleton,
    /// 构建时按容器默认单例类型转换为 Lazy 或 Eager
    DefaultSingleton,
}

impl ReusePolicy {
    pub fn is_singleton(&self) -> bool {
        !matches!(self, ReusePolicy::Prototype)
    }

    pub fn is_eager(&self) -> bool {
        matches!(self, ReusePolicy::EagerSingleton)
    }

    /// 将 `DefaultSingleton` 落到具体的单例类型
    pub fn with_default(self, default: SingletonType) -> Self {
        match self {
            ReusePolicy::DefaultSingleton => default.into(),
            other => other,
        }
    }
}

impl fmt::Display for ReusePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReusePolicy::Prototype => "PROTOTYPE",
            ReusePolicy::LazySingleton => "LAZY_SINGLETON",
            ReusePolicy::EagerSingleton => "EAGER_SINGLETON",
            ReusePolicy::DefaultSingleton => "DEFAULT_SINGLETON",
        };
        f.write_str(name)
    }
}

/// 容器级默认单例类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SingletonType {
    #[default]
    Lazy,
    Eager,
}

impl From<SingletonType> for ReusePolicy {
    fn from(value: SingletonType) -> Self {
        match value {
            SingletonType::Lazy => ReusePolicy::LazySingleton,
            SingletonType::Eager => ReusePolicy::EagerSingleton,
        }
    }
}

impl std::str::FromStr for SingletonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lazy" => Ok(SingletonType::Lazy),
            "eager" => Ok(SingletonType::Eager),
            other => Err(format!("unknown singleton type '{}', expected 'lazy' or 'eager'", other)),
        }
    }
}
