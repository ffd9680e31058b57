//! 服务注册表

use std::collections::HashMap;

use parking_lot::RwLock;

use super::descriptor::ServiceDescriptor;
use super::key::ServiceKey;
use crate::errors::ContainerError;

/// 服务注册表 - 每个服务键一个描述符
#[derive(Default)]
pub struct ServiceRegistry {
    descriptors: RwLock<HashMap<ServiceKey, ServiceDescriptor>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 校验并存储描述符，返回被替换的旧描述符
    pub fn register(
        &self,
        descriptor: ServiceDescriptor,
    ) -> Result<Option<ServiceDescriptor>, ContainerError> {
        descriptor.validate()?;
        let mut descriptors = self.descriptors.write();
        Ok(descriptors.insert(descriptor.service(), descriptor))
    }

    pub fn is_registered(&self, key: &ServiceKey) -> bool {
        self.descriptors.read().contains_key(key)
    }

    /// 获取描述符副本
    pub fn get_descriptor(&self, key: &ServiceKey) -> Result<ServiceDescriptor, ContainerError> {
        self.descriptors
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ContainerError::not_registered(key.to_string()))
    }

    pub fn keys(&self) -> Vec<ServiceKey> {
        let mut keys: Vec<ServiceKey> = self.descriptors.read().keys().copied().collect();
        keys.sort();
        keys
    }

    /// 按执行顺序排列：优先级降序，顺序升序，名称升序
    pub fn ordered(&self) -> Vec<ServiceDescriptor> {
        let mut descriptors: Vec<ServiceDescriptor> =
            self.descriptors.read().values().cloned().collect();
        descriptors.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.order().cmp(&b.order()))
                .then_with(|| a.display_name().cmp(&b.display_name()))
        });
        descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.read().is_empty()
    }

    pub fn clear(&self) {
        self.descriptors.write().clear();
    }
}
