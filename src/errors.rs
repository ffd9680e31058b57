//! 容器错误类型
//!
//! 解析期错误都携带 `context` 链：每一层解析帧追加一条
//! "resolving X required by Y"，错误的种类本身保持不变。

use thiserror::Error;

/// 工厂与构造函数返回的底层错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 依赖注入容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 实现未满足服务契约，或描述符本身不完整
    #[error("Invalid registration for '{service}': {reason}")]
    InvalidRegistration { service: String, reason: String },

    /// 服务（或其某个传递依赖）未注册
    #[error("Service '{service}' is not registered{}", render_context(.context))]
    NotRegistered {
        service: String,
        context: Vec<String>,
    },

    /// 实现类型没有可用的公共构造函数
    #[error(
        "Implementation '{implementation}' of '{service}' exposes no public constructor{}",
        render_context(.context)
    )]
    NoPublicConstructor {
        service: String,
        implementation: String,
        context: Vec<String>,
    },

    /// 解析期检测到的循环依赖
    #[error("Circular dependency detected: {}{}", .chain.join(" -> "), render_context(.context))]
    CircularDependency {
        chain: Vec<String>,
        context: Vec<String>,
    },

    /// 构造函数或工厂执行失败
    #[error("Failed to construct '{service}': {source}{}", render_context(.context))]
    Construction {
        service: String,
        #[source]
        source: BoxError,
        context: Vec<String>,
    },

    /// 容器已释放
    #[error("Container has been disposed")]
    ObjectDisposed,
}

/// 错误种类（不含上下文），便于分类和断言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRegistration,
    NotRegistered,
    NoPublicConstructor,
    CircularDependency,
    Construction,
    ObjectDisposed,
}

impl ContainerError {
    /// 获取错误种类
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContainerError::InvalidRegistration { .. } => ErrorKind::InvalidRegistration,
            ContainerError::NotRegistered { .. } => ErrorKind::NotRegistered,
            ContainerError::NoPublicConstructor { .. } => ErrorKind::NoPublicConstructor,
            ContainerError::CircularDependency { .. } => ErrorKind::CircularDependency,
            ContainerError::Construction { .. } => ErrorKind::Construction,
            ContainerError::ObjectDisposed => ErrorKind::ObjectDisposed,
        }
    }

    /// 解析上下文链（由内向外）
    pub fn context(&self) -> &[String] {
        match self {
            ContainerError::NotRegistered { context, .. }
            | ContainerError::NoPublicConstructor { context, .. }
            | ContainerError::CircularDependency { context, .. }
            | ContainerError::Construction { context, .. } => context,
            ContainerError::InvalidRegistration { .. } | ContainerError::ObjectDisposed => &[],
        }
    }

    /// 追加一条 "resolving X required by Y" 上下文
    pub(crate) fn required_by(mut self, service: &str, dependent: &str) -> Self {
        let frame = format!("resolving {service} required by {dependent}");
        match &mut self {
            ContainerError::NotRegistered { context, .. }
            | ContainerError::NoPublicConstructor { context, .. }
            | ContainerError::CircularDependency { context, .. }
            | ContainerError::Construction { context, .. } => context.push(frame),
            ContainerError::InvalidRegistration { .. } | ContainerError::ObjectDisposed => {}
        }
        self
    }

    pub(crate) fn not_registered(service: impl Into<String>) -> Self {
        ContainerError::NotRegistered {
            service: service.into(),
            context: Vec::new(),
        }
    }

    pub(crate) fn invalid_registration(service: impl Into<String>, reason: impl Into<String>) -> Self {
        ContainerError::InvalidRegistration {
            service: service.into(),
            reason: reason.into(),
        }
    }
}

fn render_context(context: &[String]) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!(" ({})", context.join(", "))
    }
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },
}
