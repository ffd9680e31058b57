use std::{collections::HashMap, env, fs, path::Path};

use crate::errors::ConfigError;

use super::container_config::{
    ContainerConfig, PartialContainerConfig, ENV_HEALTH_AUTO_CHECK, ENV_HEALTH_DEGRADED_MS,
    ENV_HEALTH_INTERVAL_MS, ENV_HEALTH_TIMEOUT_MS, ENV_LOG_FORMAT, ENV_LOG_LEVEL,
    ENV_MONITOR_ENABLED, ENV_SLOW_RESOLVE_MS,
};

/// 配置加载器，负责从文件和环境变量加载配置
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// 从文件加载配置，文件不存在时使用默认值
    pub fn load_from_path(&self, config_path: &Path) -> Result<ContainerConfig, ConfigError> {
        let partial_config = self.load_partial_config(config_path)?;
        let env_map = self.collect_env_vars();
        ContainerConfig::from_partial_and_env(partial_config, &env_map)
    }

    /// 仅从环境变量加载配置
    pub fn load_from_env(&self) -> Result<ContainerConfig, ConfigError> {
        ContainerConfig::from_partial_and_env(None, &self.collect_env_vars())
    }

    /// 从 TOML 文件加载部分配置
    fn load_partial_config(
        &self,
        config_path: &Path,
    ) -> Result<Option<PartialContainerConfig>, ConfigError> {
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "Config file not found, using defaults");
            return Ok(None);
        }

        let path_label = config_path.to_string_lossy().to_string();
        let content = fs::read_to_string(config_path)
            .map_err(|e| ConfigError::FileRead(path_label.clone(), e))?;

        let partial_config: PartialContainerConfig =
            toml::from_str(&content).map_err(|e| ConfigError::TomlParse(path_label, e))?;

        Ok(Some(partial_config))
    }

    /// 收集相关环境变量
    fn collect_env_vars(&self) -> HashMap<String, String> {
        let env_keys = [
            ENV_MONITOR_ENABLED,
            ENV_SLOW_RESOLVE_MS,
            ENV_HEALTH_INTERVAL_MS,
            ENV_HEALTH_DEGRADED_MS,
            ENV_HEALTH_TIMEOUT_MS,
            ENV_HEALTH_AUTO_CHECK,
            ENV_LOG_LEVEL,
            ENV_LOG_FORMAT,
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
