//! 诊断：依赖图、解析性能监控与健康检查

pub mod graph;
pub mod health;
pub mod monitor;

pub use graph::{DependencyGraph, GraphStatistics, ServiceNode, ServiceStatus};
pub use health::{HealthChecker, HealthProbe, HealthResult, HealthStatus};
pub use monitor::{ResolveTicket, ServiceMetrics, ServiceMonitor};
