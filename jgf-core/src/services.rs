//! 服务注册表（[`Services`]）。
//!
//! 一个世界/会话持有一份 `Services`，按“能力类型”保存唯一的服务实例，
//! 并在组装实体、准备特性时以引用形式显式传入，不存在隐藏的全局状态。
//!
//! 能力类型既可以是具体类型，也可以是 trait 对象（`dyn Trait`）：
//!
//! ```
//! use std::sync::Arc;
//! use jgf_core::services::Services;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! struct FixedClock;
//!
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 {
//!         42
//!     }
//! }
//!
//! let mut services = Services::new();
//! services.add_as::<dyn Clock>(Arc::new(FixedClock));
//! assert_eq!(services.get::<dyn Clock>().unwrap().now(), 42);
//! ```

use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use tracing::warn;

struct ServiceEntry {
    name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

/// 按能力类型索引的服务注册表。
///
/// 每个能力类型最多对应一个实例。对同一类型重复 `add` 会**替换**旧的映射（后写者生效），
/// 同时输出一条警告日志，方便排查装配顺序问题。
#[derive(Default)]
pub struct Services {
    services: HashMap<TypeId, ServiceEntry>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以服务自身的具体类型注册，返回共享句柄。
    pub fn add<T>(&mut self, service: T) -> Arc<T>
    where
        T: Send + Sync + 'static,
    {
        let service = Arc::new(service);
        self.add_as::<T>(Arc::clone(&service));
        service
    }

    /// 以显式指定的能力类型 `C` 注册（常用于 `dyn Trait`）。
    pub fn add_as<C>(&mut self, service: Arc<C>)
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let entry = ServiceEntry {
            name: type_name::<C>(),
            value: Box::new(service),
        };
        if self.services.insert(TypeId::of::<C>(), entry).is_some() {
            warn!(target: "jgf-core", service = type_name::<C>(), "service replaced, last registration wins");
        }
    }

    /// 获取能力类型 `C` 对应的服务。
    ///
    /// 服务缺失说明装配有误，调用方应把错误直接向上传播，而不是就地兜底。
    pub fn get<C>(&self) -> Result<Arc<C>, ServiceError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.services
            .get(&TypeId::of::<C>())
            .and_then(|entry| entry.value.downcast_ref::<Arc<C>>())
            .cloned()
            .ok_or(ServiceError::NotFound {
                service: type_name::<C>(),
            })
    }

    pub fn contains<C>(&self) -> bool
    where
        C: ?Sized + 'static,
    {
        self.services.contains_key(&TypeId::of::<C>())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.services.values().map(|entry| entry.name).collect();
        names.sort_unstable();
        f.debug_struct("Services").field("services", &names).finish()
    }
}

/// 服务查找失败。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    NotFound { service: &'static str },
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NotFound { service } => write!(f, "未找到服务: {service}"),
        }
    }
}

impl std::error::Error for ServiceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Camera {
        zoom: u32,
    }

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    struct French;

    impl Greeter for French {
        fn greet(&self) -> &'static str {
            "bonjour"
        }
    }

    #[test]
    fn get_returns_the_registered_instance() {
        let mut services = Services::new();
        let camera = services.add(Camera { zoom: 2 });

        let fetched = services.get::<Camera>().expect("应能取回已注册的服务");
        assert!(Arc::ptr_eq(&camera, &fetched), "应返回同一个实例");
        assert_eq!(fetched.zoom, 2);
    }

    #[test]
    fn get_missing_service_fails_the_same_way_every_time() {
        let services = Services::new();

        let first = services.get::<Camera>().expect_err("未注册的服务应返回错误");
        let second = services.get::<Camera>().expect_err("未注册的服务应返回错误");
        assert_eq!(first, second);
        assert_eq!(
            first,
            ServiceError::NotFound {
                service: type_name::<Camera>()
            }
        );
        assert!(first.to_string().contains("Camera"), "错误信息应包含缺失的类型名");
    }

    #[test]
    fn trait_object_services_are_keyed_by_capability() {
        let mut services = Services::new();
        services.add_as::<dyn Greeter>(Arc::new(English));

        assert!(services.contains::<dyn Greeter>());
        assert!(!services.contains::<English>(), "按能力注册时不应登记具体类型");
        assert_eq!(services.get::<dyn Greeter>().unwrap().greet(), "hello");
    }

    #[test]
    fn duplicate_add_replaces_previous_mapping() {
        let mut services = Services::new();
        services.add_as::<dyn Greeter>(Arc::new(English));
        services.add_as::<dyn Greeter>(Arc::new(French));

        assert_eq!(services.len(), 1);
        assert_eq!(services.get::<dyn Greeter>().unwrap().greet(), "bonjour");
    }
}
