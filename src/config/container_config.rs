use serde::Deserialize;
use std::{collections::HashMap, path::Path, time::Duration};

use super::loader::ConfigLoader;
use crate::errors::ConfigError;

// 环境变量覆盖键
pub const ENV_MONITOR_ENABLED: &str = "LINCHPIN_MONITOR_ENABLED";
pub const ENV_SLOW_RESOLVE_MS: &str = "LINCHPIN_SLOW_RESOLVE_MS";
pub const ENV_HEALTH_INTERVAL_MS: &str = "LINCHPIN_HEALTH_INTERVAL_MS";
pub const ENV_HEALTH_DEGRADED_MS: &str = "LINCHPIN_HEALTH_DEGRADED_MS";
pub const ENV_HEALTH_TIMEOUT_MS: &str = "LINCHPIN_HEALTH_TIMEOUT_MS";
pub const ENV_HEALTH_AUTO_CHECK: &str = "LINCHPIN_HEALTH_AUTO_CHECK";
pub const ENV_LOG_LEVEL: &str = "LINCHPIN_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LINCHPIN_LOG_FORMAT";

/// 容器配置
#[derive(Debug, Clone, Default)]
pub struct ContainerConfig {
    pub monitor: MonitorConfig,
    pub health: HealthCheckConfig,
    pub graph: GraphConfig,
    pub logging: LogSettings,
}

/// 解析监控配置
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub enabled: bool,
    /// 解析耗时超过该值时记录警告
    pub slow_resolve_threshold: Duration,
}

/// 健康检查配置
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// 由 `update()` 驱动的自动检查间隔
    pub check_interval: Duration,
    /// 成功但耗时超过该值的解析记为 `Degraded`
    pub degraded_threshold: Duration,
    /// 成功但耗时超过该值的解析记为 `Unhealthy`
    pub timeout: Duration,
    pub auto_check_on_start: bool,
}

/// 依赖图配置
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub default_tree_depth: usize,
    /// 注册在静态依赖图中形成环时发出警告
    pub warn_on_cycles: bool,
}

/// 日志配置段，由日志模块转换为 `LoggingConfig`
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub format: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            slow_resolve_threshold: Duration::from_millis(default_slow_resolve_ms()),
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_millis(default_health_interval_ms()),
            degraded_threshold: Duration::from_millis(default_degraded_ms()),
            timeout: Duration::from_millis(default_timeout_ms()),
            auto_check_on_start: false,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_tree_depth: default_tree_depth(),
            warn_on_cycles: true,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// 从文件加载的部分配置
#[derive(Deserialize, Debug, Default)]
pub struct PartialContainerConfig {
    monitor: Option<PartialMonitorConfig>,
    health: Option<PartialHealthCheckConfig>,
    graph: Option<PartialGraphConfig>,
    logging: Option<PartialLogSettings>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PartialMonitorConfig {
    enabled: Option<bool>,
    slow_resolve_threshold_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PartialHealthCheckConfig {
    check_interval_ms: Option<u64>,
    degraded_threshold_ms: Option<u64>,
    timeout_ms: Option<u64>,
    auto_check_on_start: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PartialGraphConfig {
    default_tree_depth: Option<usize>,
    warn_on_cycles: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PartialLogSettings {
    level: Option<String>,
    format: Option<String>,
}

impl ContainerConfig {
    /// 从 TOML 文件加载配置并应用 `LINCHPIN_*` 覆盖
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigLoader::new().load_from_path(path.as_ref())
    }

    /// 默认值加 `LINCHPIN_*` 覆盖
    pub fn from_env() -> Result<Self, ConfigError> {
        ConfigLoader::new().load_from_env()
    }

    /// 解析 TOML 文档，不读取环境变量
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let partial: PartialContainerConfig = toml::from_str(content)
            .map_err(|e| ConfigError::TomlParse("<inline>".to_string(), e))?;
        Self::from_partial_and_env(Some(partial), &HashMap::new())
    }

    /// 由部分文件配置和环境变量覆盖创建配置
    pub fn from_partial_and_env(
        partial: Option<PartialContainerConfig>,
        env_map: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let partial = partial.unwrap_or_default();

        let monitor = partial.monitor.unwrap_or_default();
        let monitor = MonitorConfig {
            enabled: env_bool(env_map, ENV_MONITOR_ENABLED)?
                .or(monitor.enabled)
                .unwrap_or(true),
            slow_resolve_threshold: Duration::from_millis(
                env_u64(env_map, ENV_SLOW_RESOLVE_MS)?
                    .or(monitor.slow_resolve_threshold_ms)
                    .unwrap_or_else(default_slow_resolve_ms),
            ),
        };

        let health = partial.health.unwrap_or_default();
        let health = HealthCheckConfig {
            check_interval: Duration::from_millis(
                env_u64(env_map, ENV_HEALTH_INTERVAL_MS)?
                    .or(health.check_interval_ms)
                    .unwrap_or_else(default_health_interval_ms),
            ),
            degraded_threshold: Duration::from_millis(
                env_u64(env_map, ENV_HEALTH_DEGRADED_MS)?
                    .or(health.degraded_threshold_ms)
                    .unwrap_or_else(default_degraded_ms),
            ),
            timeout: Duration::from_millis(
                env_u64(env_map, ENV_HEALTH_TIMEOUT_MS)?
                    .or(health.timeout_ms)
                    .unwrap_or_else(default_timeout_ms),
            ),
            auto_check_on_start: env_bool(env_map, ENV_HEALTH_AUTO_CHECK)?
                .or(health.auto_check_on_start)
                .unwrap_or(false),
        };

        let graph = partial.graph.unwrap_or_default();
        let graph = GraphConfig {
            default_tree_depth: graph.default_tree_depth.unwrap_or_else(default_tree_depth),
            warn_on_cycles: graph.warn_on_cycles.unwrap_or(true),
        };

        let logging = partial.logging.unwrap_or_default();
        let logging = LogSettings {
            level: env_map
                .get(ENV_LOG_LEVEL)
                .cloned()
                .or(logging.level)
                .unwrap_or_else(default_log_level),
            format: env_map
                .get(ENV_LOG_FORMAT)
                .cloned()
                .or(logging.format)
                .unwrap_or_else(default_log_format),
        };

        let config = Self {
            monitor,
            health,
            graph,
            logging,
        };
        config.validate()?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.health.check_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "health.check_interval_ms".to_string(),
                value: "0".to_string(),
            });
        }
        if self.health.degraded_threshold > self.health.timeout {
            return Err(ConfigError::InvalidValue {
                key: "health.degraded_threshold_ms".to_string(),
                value: format!(
                    "{} exceeds timeout {}",
                    self.health.degraded_threshold.as_millis(),
                    self.health.timeout.as_millis()
                ),
            });
        }
        if !matches!(
            self.logging.format.to_ascii_lowercase().as_str(),
            "pretty" | "compact" | "json"
        ) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }
        Ok(())
    }
}

fn env_u64(env_map: &HashMap<String, String>, key: &str) -> Result<Option<u64>, ConfigError> {
    env_map
        .get(key)
        .map(|value| {
            value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.clone(),
            })
        })
        .transpose()
}

fn env_bool(env_map: &HashMap<String, String>, key: &str) -> Result<Option<bool>, ConfigError> {
    env_map
        .get(key)
        .map(|value| match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.clone(),
            }),
        })
        .transpose()
}

// 默认值函数
fn default_slow_resolve_ms() -> u64 {
    100
}

fn default_health_interval_ms() -> u64 {
    30_000
}

fn default_degraded_ms() -> u64 {
    100
}

fn default_timeout_ms() -> u64 {
    1_000
}

fn default_tree_depth() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
