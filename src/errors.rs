use crate::types::{BoxError, Instance};
use std::fmt;
use thiserror::Error;

/// 容器构建与运行期间的所有错误
#[derive(Debug, Error)]
pub enum InjectError {
    /// 声明阶段的非法配置
    #[error("{0}")]
    Configuration(String),

    /// 所有检测失败的汇总，解析到不动点后一次性报告
    #[error("{}", render_resolution_failures(.failures))]
    Resolution { failures: Vec<ResolutionFailure> },

    #[error("Illegal circular dependency in scope '{scope}' detected: {path}")]
    CircularDependency { scope: String, path: String },

    /// 类型在任何作用域中都没有声明
    #[error("Cannot instantiate unregistered type '{type_name}'")]
    UnregisteredType { type_name: String },

    /// 类型只声明在当前作用域不可见的作用域中
    #[error("Tried to instantiate unregistered type '{type_name}'")]
    NotVisibleInScope { type_name: String },

    #[error("Tried to enter unknown scope '{scope}'. Registered scopes: {registered}")]
    UnknownScope { scope: String, registered: String },

    #[error("Exception during instantiation of '{type_name}' using {instantiator}")]
    Instantiation {
        type_name: String,
        instantiator: String,
        #[source]
        source: BoxError,
    },

    #[error("Type cast failed: expected {expected}, got {actual}")]
    TypeCastFailed { expected: String, actual: String },

    #[error("exception(s) during close:\n{}", render_close_failures(.failures))]
    Close { failures: Vec<CloseFailure> },

    #[error(
        "took {elapsed_ms}ms to instantiate object of type {type_name}{} but only {max_ms}ms allowed\nreuse policy: {reuse_policy}",
        render_dependency_of(.type_name, .root_type_name)
    )]
    InstantiationTimeExceeded {
        type_name: String,
        root_type_name: String,
        instance: Instance,
        elapsed_ms: u128,
        max_ms: u128,
        reuse_policy: String,
    },

    #[error("took {elapsed_ms}ms to enter scope {scope} but only {max_ms}ms allowed\ninstantiation times: {instantiation_times}")]
    ScopeEntryTimeExceeded {
        scope: String,
        elapsed_ms: u128,
        max_ms: u128,
        instantiation_times: String,
    },

    #[error("initializing all singletons must not take longer than {max_ms}ms but took {elapsed_ms}ms.\nIndividual instantiation times:\n{instantiation_times}")]
    InitializationTimeExceeded {
        elapsed_ms: u128,
        max_ms: u128,
        instantiation_times: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// 配置文件与环境变量相关错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from '{0}': {1}")]
    Parse(String, #[source] toml::de::Error),
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// 单个类型在单个作用域中的检测失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub type_name: String,
    pub scope: String,
    pub message: String,
    pub root_causes: Vec<String>,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\nWhy it has been registered:", self.message)?;
        for path in &self.root_causes {
            write!(f, "\n{}", path)?;
        }
        Ok(())
    }
}

/// 关闭某个实例时的失败，保留原始错误
#[derive(Debug)]
pub struct CloseFailure {
    pub type_name: String,
    pub source: BoxError,
}

impl fmt::Display for CloseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.source)
    }
}

fn render_resolution_failures(failures: &[ResolutionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_close_failures(failures: &[CloseFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_dependency_of(type_name: &str, root_type_name: &str) -> String {
    if type_name == root_type_name {
        String::new()
    } else {
        format!(" as a dependency of type {}", root_type_name)
    }
}

impl InjectError {
    /// 把检测失败按类型与作用域排序，保证错误信息稳定
    pub(crate) fn resolution(mut failures: Vec<ResolutionFailure>) -> Self {
        failures.sort_by(|a, b| {
            a.type_name
                .cmp(&b.type_name)
                .then_with(|| a.scope.cmp(&b.scope))
        });
        InjectError::Resolution { failures }
    }

    /// 关闭失败中保留的原始错误
    pub fn close_failures(&self) -> &[CloseFailure] {
        match self {
            InjectError::Close { failures } => failures,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_resolution_failures_are_sorted_and_joined() {
        let failure = |name: &str| ResolutionFailure {
            type_name: name.to_string(),
            scope: "/".to_string(),
            message: format!("Cannot decide how to instantiate type '{}':\nNo public constructors found", name),
            root_causes: vec!["manually added".to_string()],
        };
        let error = InjectError::resolution(vec![failure("Zebra"), failure("Apple")]);
        assert_eq!(
            error.to_string(),
            "Cannot decide how to instantiate type 'Apple':\nNo public constructors found\n\
             Why it has been registered:\nmanually added\n\n\
             Cannot decide how to instantiate type 'Zebra':\nNo public constructors found\n\
             Why it has been registered:\nmanually added"
        );
    }

    #[test]
    fn test_close_failure_rendering() {
        let error = InjectError::Close {
            failures: vec![
                CloseFailure {
                    type_name: "Pool".to_string(),
                    source: "failed to close".into(),
                },
                CloseFailure {
                    type_name: "Cache".to_string(),
                    source: "still in use".into(),
                },
            ],
        };
        assert_eq!(
            error.to_string(),
            "exception(s) during close:\nPool: failed to close\nCache: still in use"
        );
        assert_eq!(error.close_failures().len(), 2);
    }

    #[test]
    fn test_instantiation_time_message() {
        let error = InjectError::InstantiationTimeExceeded {
            type_name: "Slow".to_string(),
            root_type_name: "Service".to_string(),
            instance: Arc::new(1u8),
            elapsed_ms: 120,
            max_ms: 50,
            reuse_policy: "PROTOTYPE".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "took 120ms to instantiate object of type Slow as a dependency of type Service but only 50ms allowed\nreuse policy: PROTOTYPE"
        );
    }
}
