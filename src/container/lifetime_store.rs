//! 生命周期存储 - 单例与作用域实例缓存

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::key::{ServiceInstance, ServiceKey};
use super::ServiceLifetime;

struct CachedInstance {
    sequence: u64,
    instance: ServiceInstance,
}

/// 单例缓存与作用域缓存
///
/// 瞬态生命周期从不写入任何缓存。
#[derive(Default)]
pub struct LifetimeStore {
    singletons: RwLock<HashMap<ServiceKey, CachedInstance>>,
    scoped: RwLock<HashMap<ServiceKey, CachedInstance>>,
    sequence: AtomicU64,
}

impl LifetimeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cache(&self, lifetime: ServiceLifetime) -> Option<&RwLock<HashMap<ServiceKey, CachedInstance>>> {
        match lifetime {
            ServiceLifetime::Singleton => Some(&self.singletons),
            ServiceLifetime::Scoped => Some(&self.scoped),
            ServiceLifetime::Transient => None,
        }
    }

    /// 查找与生命周期对应的缓存实例
    pub fn get(&self, key: &ServiceKey, lifetime: ServiceLifetime) -> Option<ServiceInstance> {
        self.cache(lifetime)?
            .read()
            .get(key)
            .map(|cached| cached.instance.clone())
    }

    /// 按生命周期缓存实例
    ///
    /// 已有缓存时保留先写入者并返回它，调用方应使用返回值。
    pub fn store(
        &self,
        key: ServiceKey,
        lifetime: ServiceLifetime,
        instance: ServiceInstance,
    ) -> ServiceInstance {
        let Some(cache) = self.cache(lifetime) else {
            return instance;
        };
        let mut cache = cache.write();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        cache
            .entry(key)
            .or_insert(CachedInstance { sequence, instance })
            .instance
            .clone()
    }

    /// 移除某个键在两个缓存中的实例（重新注册时调用）
    pub fn evict(&self, key: &ServiceKey) -> Vec<ServiceInstance> {
        let mut evicted = Vec::new();
        if let Some(cached) = self.singletons.write().remove(key) {
            evicted.push(cached.instance);
        }
        if let Some(cached) = self.scoped.write().remove(key) {
            evicted.push(cached.instance);
        }
        evicted
    }

    /// 清空作用域缓存，按创建逆序返回被移除的实例
    pub fn clear_scope(&self) -> Vec<ServiceInstance> {
        drain_newest_first(&mut self.scoped.write())
    }

    /// 清空全部缓存：先作用域，再单例，各自按创建逆序
    pub fn drain_all(&self) -> Vec<ServiceInstance> {
        let mut drained = drain_newest_first(&mut self.scoped.write());
        drained.extend(drain_newest_first(&mut self.singletons.write()));
        drained
    }

    pub fn singleton_count(&self) -> usize {
        self.singletons.read().len()
    }

    pub fn scoped_count(&self) -> usize {
        self.scoped.read().len()
    }
}

fn drain_newest_first(cache: &mut HashMap<ServiceKey, CachedInstance>) -> Vec<ServiceInstance> {
    let mut entries: Vec<CachedInstance> = cache.drain().map(|(_, cached)| cached).collect();
    entries.sort_by(|a, b| b.sequence.cmp(&a.sequence));
    entries.into_iter().map(|cached| cached.instance).collect()
}
