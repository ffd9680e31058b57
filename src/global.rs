//! 进程级容器槽位
//!
//! 仅为需要环境式访问的宿主提供。槽位必须显式安装和卸载，
//! 推荐做法仍然是从组合根显式传递 [`ServiceContainer`]。

use parking_lot::RwLock;

use crate::container::ServiceContainer;

lazy_static::lazy_static! {
    static ref CURRENT_CONTAINER: RwLock<Option<ServiceContainer>> = RwLock::new(None);
}

/// 安装容器，返回之前安装的容器
pub fn install(container: ServiceContainer) -> Option<ServiceContainer> {
    tracing::debug!(container_id = %container.id(), "Installing process-wide container");
    CURRENT_CONTAINER.write().replace(container)
}

/// 当前安装的容器
pub fn current() -> Option<ServiceContainer> {
    CURRENT_CONTAINER.read().clone()
}

/// 卸载容器；是否释放由调用方决定
pub fn uninstall() -> Option<ServiceContainer> {
    CURRENT_CONTAINER.write().take()
}

/// 在当前容器上执行操作，未安装时返回 `None`
pub fn with_current<R>(f: impl FnOnce(&ServiceContainer) -> R) -> Option<R> {
    let container = current()?;
    Some(f(&container))
}
