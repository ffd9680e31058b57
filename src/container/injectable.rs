//! 构造函数注入
//!
//! Rust 没有运行时反射，实现类型通过 [`Injectable`] 显式列出自己的公共构造函数，
//! 每个构造函数声明有序的参数列表和一个接收已解析参数的构造体。

use std::collections::VecDeque;
use std::sync::Arc;

use super::key::{ServiceInstance, ServiceKey};
use crate::errors::BoxError;

/// 释放钩子
pub trait Dispose: Send + Sync {
    fn dispose(&self);
}

/// 实现类型满足服务契约 `S`
///
/// 每个类型天然满足自身；trait 契约用 [`provides!`](crate::provides) 声明。
pub trait Provides<S: ?Sized>: Send + Sync + 'static {
    fn provide(self: Arc<Self>) -> Arc<S>;
}

impl<T: Send + Sync + 'static> Provides<T> for T {
    fn provide(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// 声明实现类型满足一个或多个 trait 契约
///
/// ```ignore
/// provides!(ConsoleLogger => dyn Logger);
/// ```
#[macro_export]
macro_rules! provides {
    ($impl:ty => $($service:ty),+ $(,)?) => {
        $(
            impl $crate::Provides<$service> for $impl {
                fn provide(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$service> {
                    self
                }
            }
        )+
    };
}

/// 可由容器通过构造函数创建的实现类型
pub trait Injectable: Sized + Send + Sync + 'static {
    /// 公共构造函数列表（按声明顺序）
    fn constructors() -> Vec<Constructor<Self>>;

    /// 实例支持释放时返回钩子
    fn disposer(this: &Arc<Self>) -> Option<Arc<dyn Dispose>> {
        let _ = this;
        None
    }
}

/// 参数类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// 服务依赖，会成为依赖图的边
    Service,
    /// 基础类型或字符串，仍通过容器解析但不进入依赖图
    Primitive,
}

/// 构造函数参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter {
    pub key: ServiceKey,
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn of<P: ?Sized + 'static>() -> Self {
        let key = ServiceKey::of::<P>();
        let kind = if key.is_primitive() {
            ParameterKind::Primitive
        } else {
            ParameterKind::Service
        };
        Self { key, kind }
    }
}

type ConstructorBody<T> = Arc<dyn Fn(&mut ConstructorArgs) -> Result<T, BoxError> + Send + Sync>;

/// 类型化的构造函数描述
pub struct Constructor<T> {
    parameters: Vec<Parameter>,
    body: ConstructorBody<T>,
}

impl<T: Send + Sync + 'static> Constructor<T> {
    /// 创建构造函数，参数通过 [`Constructor::param`] 按顺序声明
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&mut ConstructorArgs) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            parameters: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// 追加一个参数
    pub fn param<P: ?Sized + 'static>(mut self) -> Self {
        self.parameters.push(Parameter::of::<P>());
        self
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// 擦除为以服务键 `S` 产出实例的构造函数
    pub(crate) fn erase<S>(self) -> ErasedConstructor
    where
        S: ?Sized + Send + Sync + 'static,
        T: Injectable + Provides<S>,
    {
        let body = self.body;
        ErasedConstructor {
            parameters: self.parameters,
            build: Arc::new(move |args: &mut ConstructorArgs| -> Result<ServiceInstance, BoxError> {
                let value = Arc::new(body(args)?);
                let disposer = T::disposer(&value);
                let instance = ServiceInstance::new::<S>(<T as Provides<S>>::provide(value));
                Ok(match disposer {
                    Some(disposer) => instance.with_disposer(disposer),
                    None => instance,
                })
            }),
        }
    }
}

type ErasedBody = Arc<dyn Fn(&mut ConstructorArgs) -> Result<ServiceInstance, BoxError> + Send + Sync>;

/// 类型擦除后的构造函数
#[derive(Clone)]
pub struct ErasedConstructor {
    parameters: Vec<Parameter>,
    build: ErasedBody,
}

impl ErasedConstructor {
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// 参与依赖图的参数键
    pub fn service_dependencies(&self) -> impl Iterator<Item = ServiceKey> + '_ {
        self.parameters
            .iter()
            .filter(|p| p.kind == ParameterKind::Service)
            .map(|p| p.key)
    }

    pub(crate) fn invoke(&self, args: &mut ConstructorArgs) -> Result<ServiceInstance, BoxError> {
        (self.build)(args)
    }
}

impl std::fmt::Debug for ErasedConstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedConstructor")
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// 选择参数最多的构造函数；数量相同时取先声明者
pub fn select_constructor(constructors: &[ErasedConstructor]) -> Option<&ErasedConstructor> {
    let mut selected: Option<&ErasedConstructor> = None;
    for candidate in constructors {
        match selected {
            Some(current) if candidate.parameters.len() <= current.parameters.len() => {}
            _ => selected = Some(candidate),
        }
    }
    selected
}

/// 已解析的构造函数参数（按声明顺序消费）
pub struct ConstructorArgs {
    values: VecDeque<ServiceInstance>,
}

impl ConstructorArgs {
    pub(crate) fn new(values: Vec<ServiceInstance>) -> Self {
        Self {
            values: values.into(),
        }
    }

    /// 取出下一个参数
    pub fn next<P: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<P>, BoxError> {
        let instance = self.values.pop_front().ok_or_else(|| {
            format!(
                "constructor argument list exhausted while requesting '{}'",
                ServiceKey::of::<P>()
            )
        })?;
        instance.downcast::<P>().ok_or_else(|| {
            format!(
                "constructor argument type mismatch: expected '{}', found '{}'",
                ServiceKey::of::<P>(),
                instance.service_key()
            )
            .into()
        })
    }

    /// 取出下一个参数并克隆其值（用于基础类型和字符串）
    pub fn next_value<P: Clone + Send + Sync + 'static>(&mut self) -> Result<P, BoxError> {
        self.next::<P>().map(|value| (*value).clone())
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}
