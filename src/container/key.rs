//! 服务键与类型擦除的服务实例

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::injectable::Dispose;

/// 服务键 - 抽象契约类型的标识
///
/// 相等性和哈希只依赖 `TypeId`，`type_name` 仅用于展示。
#[derive(Clone, Copy)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ServiceKey {
    /// 获取类型 `T` 的服务键（支持 `dyn Trait`）
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// 完整类型名
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// 去掉模块路径后的短名称，例如 `dyn app::Logger` -> `dyn Logger`
    pub fn short_name(&self) -> String {
        shorten_type_name(self.type_name)
    }

    /// 是否为基础类型或字符串（不参与依赖图）
    pub fn is_primitive(&self) -> bool {
        PRIMITIVE_TYPES.with(|ids| ids.contains(&self.type_id))
    }
}

thread_local! {
    static PRIMITIVE_TYPES: Vec<TypeId> = vec![
        TypeId::of::<bool>(),
        TypeId::of::<char>(),
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<i128>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<u128>(),
        TypeId::of::<usize>(),
        TypeId::of::<f32>(),
        TypeId::of::<f64>(),
        TypeId::of::<str>(),
        TypeId::of::<String>(),
        TypeId::of::<&'static str>(),
    ];
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl PartialOrd for ServiceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_name
            .cmp(other.type_name)
            .then_with(|| self.type_id.cmp(&other.type_id))
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceKey({})", self.type_name)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// 去掉路径前缀，保留泛型结构
fn shorten_type_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut segment = String::new();
    for ch in name.chars() {
        match ch {
            ':' => segment.clear(),
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                out.push_str(&segment);
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(&segment);
    out
}

/// 类型擦除的服务实例
///
/// 内部保存的是 `Arc<S>`（再包一层 `Arc<dyn Any>`），因此 `S` 可以是 trait 对象。
#[derive(Clone)]
pub struct ServiceInstance {
    value: Arc<dyn Any + Send + Sync>,
    service: ServiceKey,
    disposer: Option<Arc<dyn Dispose>>,
}

impl ServiceInstance {
    /// 以服务键 `S` 擦除一个实例
    pub fn new<S: ?Sized + Send + Sync + 'static>(service: Arc<S>) -> Self {
        Self {
            value: Arc::new(service),
            service: ServiceKey::of::<S>(),
            disposer: None,
        }
    }

    /// 附加释放钩子
    pub fn with_disposer(mut self, disposer: Arc<dyn Dispose>) -> Self {
        self.disposer = Some(disposer);
        self
    }

    /// 实例被擦除时所用的服务键
    pub fn service_key(&self) -> ServiceKey {
        self.service
    }

    /// 还原为 `Arc<S>`；键不匹配时返回 `None`
    pub fn downcast<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        self.value.downcast_ref::<Arc<S>>().cloned()
    }

    pub fn has_disposer(&self) -> bool {
        self.disposer.is_some()
    }

    /// 两个句柄是否指向同一个缓存实例
    pub fn ptr_eq(&self, other: &ServiceInstance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    pub(crate) fn dispose(&self) {
        if let Some(disposer) = &self.disposer {
            disposer.dispose();
        }
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("service", &self.service)
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_key_equality_uses_type_id() {
        assert_eq!(ServiceKey::of::<String>(), ServiceKey::of::<String>());
        assert_ne!(ServiceKey::of::<String>(), ServiceKey::of::<u32>());
        assert_ne!(ServiceKey::of::<English>(), ServiceKey::of::<dyn Greeter>());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(ServiceKey::of::<String>().short_name(), "String");
        assert_eq!(
            ServiceKey::of::<Vec<std::string::String>>().short_name(),
            "Vec<String>"
        );
        assert!(ServiceKey::of::<dyn Greeter>().short_name().ends_with("Greeter"));
    }

    #[test]
    fn test_primitive_detection() {
        assert!(ServiceKey::of::<String>().is_primitive());
        assert!(ServiceKey::of::<u64>().is_primitive());
        assert!(!ServiceKey::of::<English>().is_primitive());
    }

    #[test]
    fn test_instance_round_trip_for_trait_object() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let instance = ServiceInstance::new::<dyn Greeter>(greeter.clone());

        assert_eq!(instance.service_key(), ServiceKey::of::<dyn Greeter>());
        let restored = instance.downcast::<dyn Greeter>().unwrap();
        assert_eq!(restored.greet(), "hello");
        assert!(Arc::ptr_eq(&restored, &greeter));
        assert!(instance.downcast::<English>().is_none());
    }

    #[test]
    fn test_instance_clone_shares_value() {
        let instance = ServiceInstance::new(Arc::new(7_u32));
        let copy = instance.clone();
        assert!(instance.ptr_eq(&copy));
        assert!(!instance.ptr_eq(&ServiceInstance::new(Arc::new(7_u32))));
    }
}
