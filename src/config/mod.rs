//! 配置：`injectgraph.toml` 加环境变量覆盖

pub mod injector_config;
pub mod loader;

pub use injector_config::{InjectorConfig, PartialInjectorConfig};
pub use loader::{ConfigLoader, CONFIG_FILE_NAME};
