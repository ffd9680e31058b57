//! 服务描述符 - 一次注册的完整记录

use std::fmt;
use std::sync::Arc;

use super::injectable::{select_constructor, ErasedConstructor, Injectable, Provides};
use super::key::{ServiceInstance, ServiceKey};
use super::resolver::Resolver;
use super::ServiceLifetime;
use crate::errors::{BoxError, ContainerError};

/// 擦除后的工厂函数
pub type FactoryFn =
    Arc<dyn Fn(&mut Resolver<'_>) -> Result<ServiceInstance, BoxError> + Send + Sync>;

/// 实例的获取方式
#[derive(Clone)]
pub enum Activation {
    /// 显式注册的工厂闭包
    Factory(FactoryFn),
    /// 预先构建的实例
    Instance(ServiceInstance),
    /// 基于构造函数的创建
    Constructors(Vec<ErasedConstructor>),
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Factory(_) => f.write_str("Factory"),
            Activation::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
            Activation::Constructors(ctors) => f.debug_tuple("Constructors").field(&ctors.len()).finish(),
        }
    }
}

/// 服务描述符
#[derive(Clone, Debug)]
pub struct ServiceDescriptor {
    service: ServiceKey,
    implementation: ServiceKey,
    lifetime: ServiceLifetime,
    activation: Activation,
    priority: i32,
    order: i32,
    name: Option<String>,
}

impl ServiceDescriptor {
    /// 通用构造（用于动态注册）
    pub fn new(
        service: ServiceKey,
        implementation: ServiceKey,
        lifetime: ServiceLifetime,
        activation: Activation,
    ) -> Self {
        Self {
            service,
            implementation,
            lifetime,
            activation,
            priority: 0,
            order: 0,
            name: None,
        }
    }

    /// 以构造函数方式把实现 `I` 绑定到服务 `S`
    pub fn for_type<S, I>(lifetime: ServiceLifetime) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Provides<S>,
    {
        let constructors = I::constructors()
            .into_iter()
            .map(|ctor| ctor.erase::<S>())
            .collect();
        Self::new(
            ServiceKey::of::<S>(),
            ServiceKey::of::<I>(),
            lifetime,
            Activation::Constructors(constructors),
        )
    }

    /// 以工厂方式注册服务 `S`
    pub fn factory<S, F>(factory: F, lifetime: ServiceLifetime) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&mut Resolver<'_>) -> Result<Arc<S>, BoxError> + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move |resolver: &mut Resolver<'_>| {
            factory(resolver).map(ServiceInstance::new::<S>)
        });
        Self::new(
            ServiceKey::of::<S>(),
            ServiceKey::of::<S>(),
            lifetime,
            Activation::Factory(factory),
        )
    }

    /// 预构建实例（总是单例）
    pub fn instance(instance: ServiceInstance) -> Self {
        let key = instance.service_key();
        Self::new(key, key, ServiceLifetime::Singleton, Activation::Instance(instance))
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn service(&self) -> ServiceKey {
        self.service
    }

    pub fn implementation(&self) -> ServiceKey {
        self.implementation
    }

    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }

    pub fn activation(&self) -> &Activation {
        &self.activation
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 显示名称：未指定时使用实现类型短名
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.implementation.short_name())
    }

    /// 构造函数注册时，被选中构造函数的服务依赖
    pub fn static_dependencies(&self) -> Vec<ServiceKey> {
        match &self.activation {
            Activation::Constructors(ctors) => select_constructor(ctors)
                .map(|ctor| ctor.service_dependencies().collect())
                .unwrap_or_default(),
            Activation::Factory(_) | Activation::Instance(_) => Vec::new(),
        }
    }

    /// 校验描述符是否满足契约
    pub fn validate(&self) -> Result<(), ContainerError> {
        let service = self.service.to_string();

        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ContainerError::invalid_registration(
                    service,
                    "display name must not be blank",
                ));
            }
        }

        if let Activation::Instance(instance) = &self.activation {
            if instance.service_key() != self.service {
                return Err(ContainerError::invalid_registration(
                    service,
                    format!(
                        "instance was built for '{}' and does not satisfy this contract",
                        instance.service_key()
                    ),
                ));
            }
            if self.lifetime != ServiceLifetime::Singleton {
                return Err(ContainerError::invalid_registration(
                    service,
                    format!("pre-built instances must be singletons, got {:?}", self.lifetime),
                ));
            }
        }

        Ok(())
    }
}
