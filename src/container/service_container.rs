//! 容器门面 - 组合注册表、生命周期存储、依赖图、监控与健康检查

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::descriptor::{Activation, FactoryFn, ServiceDescriptor};
use super::injectable::{Dispose, Injectable, Provides};
use super::key::{ServiceInstance, ServiceKey};
use super::lifetime_store::LifetimeStore;
use super::registry::ServiceRegistry;
use super::resolver::Resolver;
use super::ServiceLifetime;
use crate::config::ContainerConfig;
use crate::diagnostics::{
    DependencyGraph, GraphStatistics, HealthChecker, HealthProbe, HealthResult, HealthStatus,
    ServiceMonitor, ServiceStatus,
};
use crate::errors::{BoxError, ContainerError};
use crate::logging::OperationTimer;

/// 容器内部状态，由所有克隆共享
pub(crate) struct ContainerInner {
    pub(crate) id: Uuid,
    pub(crate) config: ContainerConfig,
    pub(crate) registry: ServiceRegistry,
    pub(crate) store: LifetimeStore,
    pub(crate) graph: RwLock<DependencyGraph>,
    pub(crate) monitor: ServiceMonitor,
    pub(crate) health: HealthChecker,
    created_at: DateTime<Utc>,
    disposed: AtomicBool,
}

impl ContainerInner {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl HealthProbe for ContainerInner {
    fn registered_keys(&self) -> Vec<ServiceKey> {
        self.registry.keys()
    }

    fn probe(&self, key: ServiceKey) -> Result<(), ContainerError> {
        Resolver::new(self).resolve_key(key).map(|_| ())
    }

    fn display_name(&self, key: &ServiceKey) -> String {
        self.registry
            .get_descriptor(key)
            .map(|descriptor| descriptor.display_name())
            .unwrap_or_else(|_| key.short_name())
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Serialize)]
pub struct ContainerStatistics {
    pub container_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// 服务注册数量
    pub registered_services: usize,
    /// 活跃单例数量
    pub active_singletons: usize,
    /// 活跃作用域实例数量
    pub active_scoped_instances: usize,
    /// 总解析次数（含嵌套解析）
    pub total_resolutions: u64,
    pub failed_resolutions: u64,
    pub graph: GraphStatistics,
    pub disposed: bool,
}

impl ContainerStatistics {
    /// 平铺为键值映射
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = self.graph.to_map();
        map.insert("registered_services".to_string(), self.registered_services as f64);
        map.insert("active_singletons".to_string(), self.active_singletons as f64);
        map.insert(
            "active_scoped_instances".to_string(),
            self.active_scoped_instances as f64,
        );
        map.insert("total_resolutions".to_string(), self.total_resolutions as f64);
        map.insert("failed_resolutions".to_string(), self.failed_resolutions as f64);
        map
    }

    /// 获取性能指标摘要
    pub fn summary(&self) -> String {
        format!(
            "Container {}: {} registered services, {} active singletons, {} scoped instances, {} resolutions ({} failed), {} dependency cycles",
            self.container_id,
            self.registered_services,
            self.active_singletons,
            self.active_scoped_instances,
            self.total_resolutions,
            self.failed_resolutions,
            self.graph.cycle_count
        )
    }
}

/// 依赖注入容器
///
/// 克隆开销很小，所有克隆共享同一份内部状态。
#[derive(Clone)]
pub struct ServiceContainer {
    inner: Arc<ContainerInner>,
}

impl ServiceContainer {
    /// 创建新的容器实例
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// 使用指定配置创建容器
    pub fn with_config(config: ContainerConfig) -> Self {
        let inner = ContainerInner {
            id: Uuid::new_v4(),
            registry: ServiceRegistry::new(),
            store: LifetimeStore::new(),
            graph: RwLock::new(DependencyGraph::new()),
            monitor: ServiceMonitor::new(&config.monitor),
            health: HealthChecker::new(config.health.clone()),
            config,
            created_at: Utc::now(),
            disposed: AtomicBool::new(false),
        };
        tracing::debug!(container_id = %inner.id, "Service container created");
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    // ---- 注册 ----

    /// 通过构造函数把实现 `I` 注册为服务 `S`
    pub fn register<S, I>(&self, lifetime: ServiceLifetime) -> Result<(), ContainerError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Provides<S>,
    {
        self.register_descriptor(ServiceDescriptor::for_type::<S, I>(lifetime))
    }

    /// 注册单例服务
    pub fn register_singleton<S, I>(&self) -> Result<(), ContainerError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Provides<S>,
    {
        self.register::<S, I>(ServiceLifetime::Singleton)
    }

    /// 注册瞬态服务
    pub fn register_transient<S, I>(&self) -> Result<(), ContainerError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Provides<S>,
    {
        self.register::<S, I>(ServiceLifetime::Transient)
    }

    /// 注册作用域服务
    pub fn register_scoped<S, I>(&self) -> Result<(), ContainerError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Provides<S>,
    {
        self.register::<S, I>(ServiceLifetime::Scoped)
    }

    /// 带优先级、执行顺序和显示名称的注册
    pub fn register_with_order<S, I>(
        &self,
        lifetime: ServiceLifetime,
        priority: i32,
        order: i32,
        name: Option<&str>,
    ) -> Result<(), ContainerError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Provides<S>,
    {
        let mut descriptor = ServiceDescriptor::for_type::<S, I>(lifetime)
            .with_priority(priority)
            .with_order(order);
        if let Some(name) = name {
            descriptor = descriptor.with_name(name);
        }
        self.register_descriptor(descriptor)
    }

    /// 注册工厂
    pub fn register_factory<S, F>(&self, factory: F, lifetime: ServiceLifetime) -> Result<(), ContainerError>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&mut Resolver<'_>) -> Result<Arc<S>, BoxError> + Send + Sync + 'static,
    {
        self.register_descriptor(ServiceDescriptor::factory::<S, F>(factory, lifetime))
    }

    /// 注册工厂，缓存实例在释放时调用 [`Dispose::dispose`]
    pub fn register_disposable_factory<S, F>(
        &self,
        factory: F,
        lifetime: ServiceLifetime,
    ) -> Result<(), ContainerError>
    where
        S: Dispose + 'static,
        F: Fn(&mut Resolver<'_>) -> Result<Arc<S>, BoxError> + Send + Sync + 'static,
    {
        let key = ServiceKey::of::<S>();
        let factory: FactoryFn = Arc::new(
            move |resolver: &mut Resolver<'_>| -> Result<ServiceInstance, BoxError> {
                let value = factory(resolver)?;
                let disposer: Arc<dyn Dispose> = value.clone();
                Ok(ServiceInstance::new::<S>(value).with_disposer(disposer))
            },
        );
        self.register_descriptor(ServiceDescriptor::new(
            key,
            key,
            lifetime,
            Activation::Factory(factory),
        ))
    }

    /// 注册预构建实例（单例）
    pub fn register_instance<S>(&self, instance: Arc<S>) -> Result<(), ContainerError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.register_descriptor(ServiceDescriptor::instance(ServiceInstance::new::<S>(instance)))
    }

    /// 注册预构建实例，容器释放时调用其 [`Dispose::dispose`]
    pub fn register_disposable_instance<S>(&self, instance: Arc<S>) -> Result<(), ContainerError>
    where
        S: Dispose + 'static,
    {
        let disposer: Arc<dyn Dispose> = instance.clone();
        let instance = ServiceInstance::new::<S>(instance).with_disposer(disposer);
        self.register_descriptor(ServiceDescriptor::instance(instance))
    }

    /// 注册任意描述符（动态注册的入口，包含运行时契约校验）
    ///
    /// 覆盖已有注册时，旧的缓存实例会被移除并释放，依赖图节点重置。
    pub fn register_descriptor(&self, descriptor: ServiceDescriptor) -> Result<(), ContainerError> {
        self.ensure_not_disposed()?;

        let key = descriptor.service();
        let implementation = descriptor.implementation();
        let lifetime = descriptor.lifetime();
        let name = descriptor.display_name();
        let dependencies = descriptor.static_dependencies();
        let prebuilt = match descriptor.activation() {
            Activation::Instance(instance) => Some(instance.clone()),
            _ => None,
        };

        let replaced = self.inner.registry.register(descriptor)?;

        let evicted = self.inner.store.evict(&key);
        for instance in &evicted {
            instance.dispose();
        }
        // 预构建实例立即进入单例缓存，未解析过也会在释放时调用钩子
        if let Some(instance) = &prebuilt {
            self.inner
                .store
                .store(key, ServiceLifetime::Singleton, instance.clone());
        }

        let closes_cycle = {
            let mut graph = self.inner.graph.write();
            graph.reset_service(key, name.clone());
            if prebuilt.is_some() {
                graph.update_service_status(&key, ServiceStatus::Initialized);
            }
            for dependency in &dependencies {
                graph.add_dependency(key, *dependency);
            }
            self.inner.config.graph.warn_on_cycles
                && !dependencies.is_empty()
                && graph.detect_circular_dependencies()
        };
        if closes_cycle {
            tracing::warn!(
                service = %name,
                "Registration leaves a cycle in the dependency graph"
            );
        }

        tracing::debug!(
            service = %key,
            implementation = %implementation,
            lifetime = ?lifetime,
            dependencies = dependencies.len(),
            replaced = replaced.is_some(),
            evicted = evicted.len(),
            "Service registered"
        );
        Ok(())
    }

    // ---- 解析 ----

    /// 解析服务
    pub fn resolve<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>, ContainerError> {
        Resolver::new(&self.inner).resolve::<S>()
    }

    /// 尝试解析服务，失败时返回 `None`
    pub fn try_resolve<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        match self.resolve::<S>() {
            Ok(service) => Some(service),
            Err(err) => {
                tracing::debug!(
                    service = %ServiceKey::of::<S>(),
                    error = %err,
                    "Optional resolution failed"
                );
                None
            }
        }
    }

    /// 按服务键解析（供不知道静态类型的调用方使用）
    pub fn resolve_key(&self, key: ServiceKey) -> Result<ServiceInstance, ContainerError> {
        Resolver::new(&self.inner).resolve_key(key)
    }

    pub fn is_registered<S: ?Sized + 'static>(&self) -> bool {
        self.is_key_registered(&ServiceKey::of::<S>())
    }

    pub fn is_key_registered(&self, key: &ServiceKey) -> bool {
        !self.inner.is_disposed() && self.inner.registry.is_registered(key)
    }

    pub fn get_descriptor(&self, key: &ServiceKey) -> Result<ServiceDescriptor, ContainerError> {
        self.ensure_not_disposed()?;
        self.inner.registry.get_descriptor(key)
    }

    /// 按执行顺序列出所有注册
    pub fn registered_services(&self) -> Vec<ServiceDescriptor> {
        self.inner.registry.ordered()
    }

    /// 按执行顺序预先解析所有单例，返回解析数量
    pub fn warm_up(&self) -> Result<usize, ContainerError> {
        self.ensure_not_disposed()?;
        let timer = OperationTimer::new("warm_up");
        let mut resolved = 0;
        for descriptor in self.inner.registry.ordered() {
            if descriptor.lifetime() != ServiceLifetime::Singleton {
                continue;
            }
            self.resolve_key(descriptor.service())?;
            resolved += 1;
        }
        timer.with_metadata("singletons", resolved).finish();
        Ok(resolved)
    }

    // ---- 生命周期 ----

    /// 清空注册、缓存、依赖图与监控数据；缓存实例会被释放
    pub fn clear(&self) -> Result<(), ContainerError> {
        self.ensure_not_disposed()?;
        let drained = self.inner.store.drain_all();
        self.inner.registry.clear();
        self.inner.graph.write().clear();
        self.inner.monitor.clear();
        self.inner.health.clear();
        for instance in &drained {
            instance.dispose();
        }
        tracing::info!(
            container_id = %self.inner.id,
            disposed_instances = drained.len(),
            "Container cleared"
        );
        Ok(())
    }

    /// 结束当前作用域：释放并移除所有作用域实例，单例不受影响
    pub fn clear_scope(&self) -> Result<usize, ContainerError> {
        self.ensure_not_disposed()?;
        let drained = self.inner.store.clear_scope();
        {
            let mut graph = self.inner.graph.write();
            for instance in &drained {
                graph.update_service_status(&instance.service_key(), ServiceStatus::Disposed);
            }
        }
        for instance in &drained {
            instance.dispose();
        }
        tracing::info!(scoped_instances = drained.len(), "Scope cleared");
        Ok(drained.len())
    }

    /// 释放容器
    ///
    /// 先释放作用域实例，再按创建逆序释放单例，随后清空注册、依赖图、
    /// 监控指标与健康检查结果。重复调用无效果。
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.health.stop_auto_check();

        let drained = self.inner.store.drain_all();
        for instance in &drained {
            instance.dispose();
        }
        self.inner.registry.clear();
        self.inner.graph.write().clear();
        self.inner.monitor.clear();
        self.inner.health.clear();

        tracing::info!(
            container_id = %self.inner.id,
            disposed_instances = drained.len(),
            "Container disposed"
        );
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    // ---- 诊断 ----

    /// 依赖图快照
    pub fn dependency_graph(&self) -> DependencyGraph {
        self.inner.graph.read().clone()
    }

    pub fn monitor(&self) -> &ServiceMonitor {
        &self.inner.monitor
    }

    pub fn health_checker(&self) -> &HealthChecker {
        &self.inner.health
    }

    /// 使用配置中的默认深度展开依赖树
    pub fn get_dependency_tree(&self, key: &ServiceKey) -> String {
        self.get_dependency_tree_with_depth(key, self.inner.config.graph.default_tree_depth)
    }

    pub fn get_dependency_tree_with_depth(&self, key: &ServiceKey, max_depth: usize) -> String {
        self.inner.graph.read().get_dependency_tree(key, max_depth)
    }

    pub fn detect_circular_dependencies(&self) -> bool {
        self.inner.graph.read().detect_circular_dependencies()
    }

    pub fn service_statistics(&self) -> ContainerStatistics {
        ContainerStatistics {
            container_id: self.inner.id,
            created_at: self.inner.created_at,
            registered_services: self.inner.registry.len(),
            active_singletons: self.inner.store.singleton_count(),
            active_scoped_instances: self.inner.store.scoped_count(),
            total_resolutions: self.inner.monitor.total_resolves(),
            failed_resolutions: self.inner.monitor.total_errors(),
            graph: self.inner.graph.read().get_statistics(),
            disposed: self.inner.is_disposed(),
        }
    }

    pub fn generate_performance_report(&self) -> String {
        self.inner.monitor.generate_performance_report()
    }

    pub fn export_metrics_as_json(&self) -> serde_json::Result<String> {
        self.inner.monitor.export_metrics_as_json()
    }

    pub fn generate_health_report(&self) -> String {
        self.inner.health.generate_health_report()
    }

    // ---- 健康检查 ----

    pub fn check_service_health(&self, key: ServiceKey) -> HealthResult {
        self.inner.health.check_service_health(&*self.inner, key)
    }

    pub fn check_all_services_health(&self) -> std::collections::HashMap<ServiceKey, HealthResult> {
        self.inner.health.check_all_services_health(&*self.inner)
    }

    pub async fn check_all_services_health_async(
        &self,
    ) -> std::collections::HashMap<ServiceKey, HealthResult> {
        self.inner
            .health
            .check_all_services_health_async(&*self.inner)
            .await
    }

    pub fn overall_health(&self) -> HealthStatus {
        self.inner.health.overall_health()
    }

    pub fn start_auto_check(&self) {
        self.inner.health.start_auto_check();
    }

    pub fn stop_auto_check(&self) {
        self.inner.health.stop_auto_check();
    }

    /// 宿主每个循环调用一次；到期时执行健康检查
    pub fn update(&self) -> bool {
        if self.inner.is_disposed() {
            return false;
        }
        self.inner.health.update(&*self.inner)
    }

    /// 启动自动检查并在 tokio 上按间隔驱动 `update()`
    ///
    /// 自动检查停止或容器释放后任务退出。
    pub fn spawn_health_task(&self) -> JoinHandle<()> {
        self.start_auto_check();
        let container = self.clone();
        let period = self.inner.config.health.check_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if container.is_disposed() || !container.inner.health.is_auto_check_enabled() {
                    break;
                }
                container.update();
            }
            tracing::debug!(container_id = %container.inner.id, "Health task stopped");
        })
    }

    fn ensure_not_disposed(&self) -> Result<(), ContainerError> {
        if self.inner.is_disposed() {
            Err(ContainerError::ObjectDisposed)
        } else {
            Ok(())
        }
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("id", &self.inner.id)
            .field("registered_services", &self.inner.registry.len())
            .field("disposed", &self.inner.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Constructor;
    use crate::errors::ErrorKind;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct Counter {
        disposed: Arc<AtomicUsize>,
    }

    impl Dispose for Counter {
        fn dispose(&self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Settings {
        url: String,
    }

    impl Injectable for Settings {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|args| {
                Ok(Settings {
                    url: args.next_value::<String>()?,
                })
            })
            .param::<String>()]
        }
    }

    struct Abstract;

    impl Injectable for Abstract {
        fn constructors() -> Vec<Constructor<Self>> {
            Vec::new()
        }
    }

    #[test]
    fn test_primitive_parameter_resolves_without_graph_edge() {
        let container = ServiceContainer::new();
        container
            .register_instance(Arc::new("postgres://db".to_string()))
            .unwrap();
        container.register_singleton::<Settings, Settings>().unwrap();

        let settings = container.resolve::<Settings>().unwrap();
        assert_eq!(settings.url, "postgres://db");
        assert!(container
            .dependency_graph()
            .get_dependencies(&ServiceKey::of::<Settings>())
            .is_empty());
    }

    #[test]
    fn test_no_public_constructor() {
        let container = ServiceContainer::new();
        container.register_transient::<Abstract, Abstract>().unwrap();
        let err = container
            .resolve::<Abstract>()
            .err()
            .expect("abstract type has no constructor");
        assert_eq!(err.kind(), ErrorKind::NoPublicConstructor);
    }

    #[test]
    fn test_reregistration_evicts_and_disposes() {
        let container = ServiceContainer::new();
        let disposed = Arc::new(AtomicUsize::new(0));
        let flag = disposed.clone();
        container
            .register_disposable_factory::<Counter, _>(
                move |_| Ok(Arc::new(Counter { disposed: flag.clone() })),
                ServiceLifetime::Singleton,
            )
            .unwrap();
        let first = container.resolve::<Counter>().unwrap();

        let flag = disposed.clone();
        container
            .register_disposable_factory::<Counter, _>(
                move |_| Ok(Arc::new(Counter { disposed: flag.clone() })),
                ServiceLifetime::Singleton,
            )
            .unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);

        let second = container.resolve::<Counter>().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_dispose_order_scoped_then_singletons_newest_first() {
        struct Tagged(&'static str, Arc<Mutex<Vec<&'static str>>>);
        impl Dispose for Tagged {
            fn dispose(&self) {
                self.1.lock().unwrap().push(self.0);
            }
        }
        struct First(Tagged);
        struct Second(Tagged);
        struct Third(Tagged);
        impl Dispose for First {
            fn dispose(&self) {
                self.0.dispose();
            }
        }
        impl Dispose for Second {
            fn dispose(&self) {
                self.0.dispose();
            }
        }
        impl Dispose for Third {
            fn dispose(&self) {
                self.0.dispose();
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let container = ServiceContainer::new();
        let l = log.clone();
        container
            .register_disposable_factory::<First, _>(
                move |_| Ok(Arc::new(First(Tagged("first", l.clone())))),
                ServiceLifetime::Singleton,
            )
            .unwrap();
        let l = log.clone();
        container
            .register_disposable_factory::<Second, _>(
                move |_| Ok(Arc::new(Second(Tagged("second", l.clone())))),
                ServiceLifetime::Singleton,
            )
            .unwrap();
        let l = log.clone();
        container
            .register_disposable_factory::<Third, _>(
                move |_| Ok(Arc::new(Third(Tagged("scoped", l.clone())))),
                ServiceLifetime::Scoped,
            )
            .unwrap();

        container.resolve::<First>().unwrap();
        container.resolve::<Second>().unwrap();
        container.resolve::<Third>().unwrap();

        container.dispose();
        container.dispose();
        assert_eq!(*log.lock().unwrap(), vec!["scoped", "second", "first"]);
    }

    #[test]
    fn test_clear_scope_marks_graph_nodes_disposed() {
        let container = ServiceContainer::new();
        container
            .register_factory::<u64, _>(|_| Ok(Arc::new(7_u64)), ServiceLifetime::Scoped)
            .unwrap();
        container.resolve::<u64>().unwrap();

        assert_eq!(container.clear_scope().unwrap(), 1);
        let graph = container.dependency_graph();
        assert_eq!(
            graph.node(&ServiceKey::of::<u64>()).unwrap().status,
            ServiceStatus::Disposed
        );
    }

    #[test]
    fn test_statistics_map() {
        let container = ServiceContainer::new();
        container.register_instance(Arc::new(1_u8)).unwrap();
        container.resolve::<u8>().unwrap();

        let stats = container.service_statistics();
        assert_eq!(stats.registered_services, 1);
        assert_eq!(stats.active_singletons, 1);
        assert_eq!(stats.total_resolutions, 1);
        let map = stats.to_map();
        assert_eq!(map["node_count"], 1.0);
        assert_eq!(map["registered_services"], 1.0);
        assert!(stats.summary().contains("1 registered services"));
    }

    #[test]
    fn test_dispose_clears_all_internal_state() {
        let container = ServiceContainer::new();
        container.register_instance(Arc::new(1_u8)).unwrap();
        container.resolve::<u8>().unwrap();
        container.check_all_services_health();
        assert_eq!(container.monitor().total_resolves(), 2);
        assert_eq!(container.health_checker().last_results().len(), 1);

        container.dispose();

        assert!(container.is_disposed());
        assert!(!container.is_registered::<u8>());
        assert!(container.try_resolve::<u8>().is_none());
        assert_eq!(container.monitor().total_resolves(), 0);
        assert!(container.health_checker().last_results().is_empty());
        assert!(container
            .generate_performance_report()
            .contains("no resolutions recorded"));

        let stats = container.service_statistics();
        assert_eq!(stats.registered_services, 0);
        assert_eq!(stats.active_singletons, 0);
        assert!(stats.disposed);
        assert_eq!(container.clear().unwrap_err().kind(), ErrorKind::ObjectDisposed);
    }

    #[test]
    fn test_unresolved_disposable_instance_is_disposed() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let container = ServiceContainer::new();
        container
            .register_disposable_instance(Arc::new(Counter {
                disposed: disposed.clone(),
            }))
            .unwrap();
        assert_eq!(container.service_statistics().active_singletons, 1);

        container.dispose();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_replaced_instance_is_disposed_without_resolution() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let container = ServiceContainer::new();
        let first = Arc::new(Counter {
            disposed: disposed.clone(),
        });
        container.register_disposable_instance(first).unwrap();

        let second = Arc::new(Counter {
            disposed: Arc::new(AtomicUsize::new(0)),
        });
        container.register_disposable_instance(second.clone()).unwrap();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&second, &container.resolve::<Counter>().unwrap()));
    }

    #[test]
    fn test_constructor_built_instances_use_disposer() {
        struct Connection {
            closed: Arc<AtomicUsize>,
        }

        impl Dispose for Connection {
            fn dispose(&self) {
                self.closed.fetch_add(1, Ordering::SeqCst);
            }
        }

        impl Injectable for Connection {
            fn constructors() -> Vec<Constructor<Self>> {
                vec![Constructor::new(|args| {
                    Ok(Connection {
                        closed: args.next::<AtomicUsize>()?,
                    })
                })
                .param::<AtomicUsize>()]
            }

            fn disposer(this: &Arc<Self>) -> Option<Arc<dyn Dispose>> {
                Some(this.clone())
            }
        }

        let closed = Arc::new(AtomicUsize::new(0));
        let container = ServiceContainer::new();
        container.register_instance(closed.clone()).unwrap();
        container.register_scoped::<Connection, Connection>().unwrap();

        container.resolve::<Connection>().unwrap();
        assert_eq!(container.clear_scope().unwrap(), 1);
        assert_eq!(closed.load(Ordering::SeqCst), 1);

        container.resolve::<Connection>().unwrap();
        container.dispose();
        assert_eq!(closed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_mismatched_activation_is_never_cached() {
        let container = ServiceContainer::new();
        let key = ServiceKey::of::<u32>();
        let factory: FactoryFn = Arc::new(
            |_: &mut Resolver<'_>| -> Result<ServiceInstance, BoxError> {
                Ok(ServiceInstance::new(Arc::new("not a number".to_string())))
            },
        );
        container
            .register_descriptor(ServiceDescriptor::new(
                key,
                key,
                ServiceLifetime::Singleton,
                Activation::Factory(factory),
            ))
            .unwrap();

        let err = container.resolve_key(key).err().expect("mismatched key");
        assert_eq!(err.kind(), ErrorKind::Construction);
        assert!(err.to_string().contains("String"));
        assert_eq!(container.service_statistics().active_singletons, 0);

        assert_eq!(
            container.check_service_health(key).status,
            HealthStatus::Unhealthy
        );
        assert_eq!(
            container.dependency_graph().node(&key).unwrap().status,
            ServiceStatus::Error
        );
    }
}
