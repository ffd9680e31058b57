//! 依赖注入容器实现
//!
//! 提供类型安全的服务注册和解析功能，支持：
//! - 单例、作用域与瞬态生命周期
//! - 基于构造函数的递归解析
//! - 工厂与预构建实例
//! - 解析期循环依赖检测

mod descriptor;
mod injectable;
mod key;
mod lifetime_store;
mod registry;
mod resolver;
mod service_container;

pub use descriptor::{Activation, FactoryFn, ServiceDescriptor};
pub use injectable::{
    select_constructor, Constructor, ConstructorArgs, Dispose, ErasedConstructor, Injectable,
    Parameter, ParameterKind, Provides,
};
pub use key::{ServiceInstance, ServiceKey};
pub use lifetime_store::LifetimeStore;
pub use registry::ServiceRegistry;
pub use resolver::Resolver;
pub use service_container::{ContainerStatistics, ServiceContainer};

/// 服务生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
    /// 单例 - 容器生命周期内只有一个实例
    Singleton,
    /// 瞬态 - 每次解析都创建新实例
    Transient,
    /// 作用域 - 在当前作用域内共享实例，`clear_scope` 时释放
    Scoped,
}
