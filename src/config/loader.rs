use super::injector_config::{
    InjectorConfig, PartialInjectorConfig, ENV_DEFAULT_SINGLETON, ENV_LIFECYCLE_MANAGEMENT,
    ENV_MAX_INSTANTIATION_TIME_MS, ENV_MAX_SCOPE_ENTRY_TIME_MS,
};
use crate::errors::ConfigError;
use std::{collections::HashMap, env, fs, path::Path, path::PathBuf};

/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "injectgraph.toml";

/// Configuration loader responsible for loading config from files and environment
pub struct ConfigLoader {
    base_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader reading from the working directory
    pub fn new() -> Self {
        Self { base_path: None }
    }

    /// Create a config loader with custom base path (for testing)
    pub fn with_base_path(base_path: PathBuf) -> Self {
        Self {
            base_path: Some(base_path),
        }
    }

    /// Load configuration: file first, then environment overrides
    pub fn load_config(&self) -> Result<InjectorConfig, ConfigError> {
        let config_path = self.config_path();
        let partial_config = self.load_partial_config(&config_path)?;
        let env_map = self.collect_env_vars();
        let config = InjectorConfig::from_partial_and_env(partial_config, &env_map)?;
        tracing::debug!(path = ?config_path, config = ?config, "Configuration loaded");
        Ok(config)
    }

    /// Parse configuration from a TOML string, without environment overrides
    pub fn parse_str(content: &str) -> Result<InjectorConfig, ConfigError> {
        let partial: PartialInjectorConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse("<string>".to_string(), e))?;
        InjectorConfig::from_partial_and_env(Some(partial), &HashMap::new())
    }

    fn config_path(&self) -> PathBuf {
        match &self.base_path {
            Some(base_path) => base_path.join(CONFIG_FILE_NAME),
            None => PathBuf::from(CONFIG_FILE_NAME),
        }
    }

    /// Load partial configuration from TOML file
    fn load_partial_config(&self, config_path: &Path) -> Result<Option<PartialInjectorConfig>, ConfigError> {
        if !config_path.exists() {
            tracing::debug!(path = ?config_path, "配置文件不存在，使用默认配置");
            return Ok(None);
        }

        let content = fs::read_to_string(config_path)
            .map_err(|e| ConfigError::FileRead(config_path.to_string_lossy().to_string(), e))?;

        let partial_config: PartialInjectorConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(config_path.to_string_lossy().to_string(), e))?;

        Ok(Some(partial_config))
    }

    /// Collect relevant environment variables
    fn collect_env_vars(&self) -> HashMap<String, String> {
        let env_keys = [
            ENV_DEFAULT_SINGLETON,
            ENV_LIFECYCLE_MANAGEMENT,
            ENV_MAX_INSTANTIATION_TIME_MS,
            ENV_MAX_SCOPE_ENTRY_TIME_MS,
        ];

        let mut env_map = HashMap::new();
        for key in &env_keys {
            if let Ok(value) = env::var(key) {
                env_map.insert(key.to_string(), value);
            }
        }
        env_map
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
