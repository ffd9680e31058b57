//! 解析器 - 递归构建对象图
//!
//! 每次顶层解析创建一个 [`Resolver`]，它持有本次调用的"解析中"栈。
//! 解析期的循环检测只依赖这个栈，与依赖图上的离线检测相互独立。

use std::sync::Arc;

use super::descriptor::{Activation, ServiceDescriptor};
use super::injectable::{select_constructor, ConstructorArgs};
use super::key::{ServiceInstance, ServiceKey};
use super::service_container::ContainerInner;
use crate::diagnostics::ServiceStatus;
use crate::errors::{BoxError, ContainerError};

/// 单次解析调用的上下文，工厂通过它解析自身依赖
pub struct Resolver<'c> {
    inner: &'c ContainerInner,
    in_progress: Vec<ServiceKey>,
}

impl<'c> Resolver<'c> {
    pub(crate) fn new(inner: &'c ContainerInner) -> Self {
        Self {
            inner,
            in_progress: Vec::new(),
        }
    }

    /// 解析服务 `S`
    pub fn resolve<S: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<S>, ContainerError> {
        let key = ServiceKey::of::<S>();
        let instance = self.resolve_key(key)?;
        instance.downcast::<S>().ok_or_else(|| ContainerError::Construction {
            service: key.to_string(),
            source: format!(
                "resolved instance was registered as '{}'",
                instance.service_key()
            )
            .into(),
            context: Vec::new(),
        })
    }

    /// 解析失败时返回 `None`
    pub fn try_resolve<S: ?Sized + Send + Sync + 'static>(&mut self) -> Option<Arc<S>> {
        self.resolve::<S>().ok()
    }

    pub fn is_registered<S: ?Sized + 'static>(&self) -> bool {
        self.inner.registry.is_registered(&ServiceKey::of::<S>())
    }

    /// 当前解析链深度
    pub fn depth(&self) -> usize {
        self.in_progress.len()
    }

    /// 按服务键解析
    ///
    /// 每一层失败都会追加 "resolving X required by Y" 上下文。
    pub fn resolve_key(&mut self, key: ServiceKey) -> Result<ServiceInstance, ContainerError> {
        if self.inner.is_disposed() {
            return Err(ContainerError::ObjectDisposed);
        }

        let parent = self.in_progress.last().copied();
        let ticket = self.inner.monitor.start_resolve(key, &key.short_name());
        {
            let mut graph = self.inner.graph.write();
            graph.record_service_access(&key);
            if let Some(parent) = parent {
                if !key.is_primitive() {
                    graph.add_dependency(parent, key);
                }
            }
        }

        let result = self.activate(key);

        match &result {
            Ok(_) => {
                self.inner.monitor.end_resolve(ticket, true, None);
            }
            Err(err) => {
                let message = err.to_string();
                self.inner.monitor.end_resolve(ticket, false, Some(&message));
            }
        }

        result.map_err(|err| match parent {
            Some(parent) => err.required_by(&key.to_string(), &parent.to_string()),
            None => err,
        })
    }

    fn activate(&mut self, key: ServiceKey) -> Result<ServiceInstance, ContainerError> {
        if self.in_progress.contains(&key) {
            return Err(self.circular_dependency(key));
        }

        let descriptor = self.inner.registry.get_descriptor(&key)?;
        let lifetime = descriptor.lifetime();

        if let Some(cached) = self.inner.store.get(&key, lifetime) {
            tracing::trace!(service = %key, lifetime = ?lifetime, "Cache hit");
            return Ok(cached);
        }

        self.set_status(&key, ServiceStatus::Initializing);
        self.in_progress.push(key);
        let built = self
            .build(&descriptor)
            .and_then(|instance| ensure_key(key, instance));
        self.in_progress.pop();

        match built {
            Ok(instance) => {
                let instance = self.inner.store.store(key, lifetime, instance);
                self.set_status(&key, ServiceStatus::Initialized);
                tracing::debug!(
                    service = %key,
                    implementation = %descriptor.implementation(),
                    lifetime = ?lifetime,
                    "Service instance created"
                );
                Ok(instance)
            }
            Err(err) => {
                self.set_status(&key, ServiceStatus::Error);
                Err(err)
            }
        }
    }

    fn build(&mut self, descriptor: &ServiceDescriptor) -> Result<ServiceInstance, ContainerError> {
        let key = descriptor.service();
        match descriptor.activation() {
            Activation::Instance(instance) => Ok(instance.clone()),
            Activation::Factory(factory) => {
                factory(self).map_err(|err| construction_error(key, err))
            }
            Activation::Constructors(constructors) => {
                let constructor = select_constructor(constructors).ok_or_else(|| {
                    ContainerError::NoPublicConstructor {
                        service: key.to_string(),
                        implementation: descriptor.implementation().to_string(),
                        context: Vec::new(),
                    }
                })?;
                tracing::debug!(
                    service = %key,
                    parameters = constructor.parameters().len(),
                    candidates = constructors.len(),
                    "Selected constructor"
                );

                let mut values = Vec::with_capacity(constructor.parameters().len());
                for parameter in constructor.parameters() {
                    values.push(self.resolve_key(parameter.key)?);
                }

                let mut args = ConstructorArgs::new(values);
                constructor
                    .invoke(&mut args)
                    .map_err(|err| construction_error(key, err))
            }
        }
    }

    fn circular_dependency(&self, key: ServiceKey) -> ContainerError {
        let mut chain: Vec<String> = self.in_progress.iter().map(ServiceKey::to_string).collect();
        chain.push(key.to_string());
        tracing::warn!(chain = %chain.join(" -> "), "Circular dependency detected during resolution");
        ContainerError::CircularDependency {
            chain,
            context: Vec::new(),
        }
    }

    fn set_status(&self, key: &ServiceKey, status: ServiceStatus) {
        self.inner.graph.write().update_service_status(key, status);
    }
}

/// 构建出的实例必须属于被解析的服务键，否则不得进入缓存
fn ensure_key(key: ServiceKey, instance: ServiceInstance) -> Result<ServiceInstance, ContainerError> {
    if instance.service_key() == key {
        Ok(instance)
    } else {
        Err(ContainerError::Construction {
            service: key.to_string(),
            source: format!(
                "activation produced an instance registered as '{}'",
                instance.service_key()
            )
            .into(),
            context: Vec::new(),
        })
    }
}

/// 工厂内部通过 `?` 冒泡上来的容器错误保持原样，其余包装为构造错误
fn construction_error(key: ServiceKey, err: BoxError) -> ContainerError {
    match err.downcast::<ContainerError>() {
        Ok(inner) => *inner,
        Err(source) => ContainerError::Construction {
            service: key.to_string(),
            source,
            context: Vec::new(),
        },
    }
}
