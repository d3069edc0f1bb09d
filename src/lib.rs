//! injectgraph：组件图解析与分作用域的依赖注入运行时
//!
//! 构建阶段把类型声明解析为无环的构造计划（[`Definitions`]），运行阶段由 [`Injector`]
//! 按计划实例化，支持单例缓存、嵌套作用域、拦截器和生命周期管理。

pub mod builder;
pub mod config;
pub mod cycle;
pub mod definitions;
pub mod dependencies;
pub mod detection;
pub mod errors;
pub mod infrastructure;
pub mod instantiator;
pub mod logging;
pub mod scope;
pub mod statemachine;
pub mod types;

// Re-export commonly used items for convenience
pub use builder::InjectorBuilder;
pub use config::{ConfigLoader, InjectorConfig};
pub use definitions::{Definition, Definitions};
pub use dependencies::Dependencies;
pub use detection::{Candidate, Injectable, RegistryIntrospector, TypeIntrospector};
pub use errors::{ConfigError, InjectError};
pub use infrastructure::{
    Closeable, Injector, InstantiationEvent, InstantiationTime, Interceptor, TimedInstantiation,
};
pub use scope::Scope;
pub use types::{BoxError, Instance, ReusePolicy, SingletonType, TypeKey};
