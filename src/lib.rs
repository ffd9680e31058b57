//! linchpin - 依赖注入容器
//!
//! 服务契约通过 [`ServiceKey`] 标识，实现类型通过 [`Injectable`] 声明公共构造函数，
//! 容器负责按生命周期缓存实例、递归解析依赖，并记录依赖图、解析性能与健康状况。

pub mod config;
pub mod container;
pub mod diagnostics;
pub mod errors;
pub mod global;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::ContainerConfig;
pub use container::{
    Constructor, ConstructorArgs, Dispose, Injectable, Provides, Resolver, ServiceContainer,
    ServiceDescriptor, ServiceInstance, ServiceKey, ServiceLifetime,
};
pub use diagnostics::{HealthStatus, ServiceStatus};
pub use errors::{BoxError, ConfigError, ContainerError, ErrorKind};
