pub mod container_config;
pub mod loader;

// 重新导出常用类型
pub use container_config::{
    ContainerConfig, GraphConfig, HealthCheckConfig, LogSettings, MonitorConfig,
    PartialContainerConfig,
};
pub use loader::ConfigLoader;
