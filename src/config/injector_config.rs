use crate::errors::ConfigError;
use crate::types::SingletonType;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const ENV_DEFAULT_SINGLETON: &str = "INJECTGRAPH_DEFAULT_SINGLETON";
pub const ENV_LIFECYCLE_MANAGEMENT: &str = "INJECTGRAPH_LIFECYCLE_MANAGEMENT";
pub const ENV_MAX_INSTANTIATION_TIME_MS: &str = "INJECTGRAPH_MAX_INSTANTIATION_TIME_MS";
pub const ENV_MAX_SCOPE_ENTRY_TIME_MS: &str = "INJECTGRAPH_MAX_SCOPE_ENTRY_TIME_MS";

/// 容器级配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectorConfig {
    /// `DefaultSingleton` 落到的单例类型，未设置时沿用构建器的取值（默认 Lazy）
    pub default_singleton_type: Option<SingletonType>,
    /// 是否跟踪并关闭实例
    pub lifecycle_management: bool,
    /// 单次实例化的耗时上限
    pub max_instantiation_time: Option<Duration>,
    /// 进入作用域的耗时上限
    pub max_scope_entry_time: Option<Duration>,
}

/// 配置文件中的可选字段
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialInjectorConfig {
    pub default_singleton_type: Option<SingletonType>,
    pub lifecycle_management: Option<bool>,
    pub max_instantiation_time_ms: Option<u64>,
    pub max_scope_entry_time_ms: Option<u64>,
}

impl InjectorConfig {
    /// 合并配置文件与环境变量，环境变量优先
    pub fn from_partial_and_env(
        partial: Option<PartialInjectorConfig>,
        env_map: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let partial = partial.unwrap_or_default();

        let default_singleton_type = match env_map.get(ENV_DEFAULT_SINGLETON) {
            Some(value) => Some(value.parse::<SingletonType>().map_err(|message| ConfigError::InvalidValue {
                key: ENV_DEFAULT_SINGLETON.to_string(),
                message,
            })?),
            None => partial.default_singleton_type,
        };

        let lifecycle_management = match env_map.get(ENV_LIFECYCLE_MANAGEMENT) {
            Some(value) => parse_bool(ENV_LIFECYCLE_MANAGEMENT, value)?,
            None => partial.lifecycle_management.unwrap_or(false),
        };

        let max_instantiation_time = match env_map.get(ENV_MAX_INSTANTIATION_TIME_MS) {
            Some(value) => Some(parse_millis(ENV_MAX_INSTANTIATION_TIME_MS, value)?),
            None => partial.max_instantiation_time_ms.map(Duration::from_millis),
        };

        let max_scope_entry_time = match env_map.get(ENV_MAX_SCOPE_ENTRY_TIME_MS) {
            Some(value) => Some(parse_millis(ENV_MAX_SCOPE_ENTRY_TIME_MS, value)?),
            None => partial.max_scope_entry_time_ms.map(Duration::from_millis),
        };

        Ok(Self {
            default_singleton_type,
            lifecycle_management,
            max_instantiation_time,
            max_scope_entry_time,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected milliseconds, got '{}': {}", value, e),
        })
}
