//! # 特性工作流约定（Feature Workflow Policy）
//!
//! 一个实体（[`Featurable`]）由若干**特性**（[`Feature`]）组合而成。特性只能通过
//! [`FeaturableBuilder`](super::featurable::FeaturableBuilder) 挂载，并按“能力类型”查询：
//!
//! 1. 能力类型可以是具体类型（例如 `LayerableModel`），也可以是 trait 对象（例如 `dyn Layerable`）。
//!    挂载时会自动以具体类型登记；额外的能力由 [`Feature::provide`] 声明，
//!    因此同一个具体实现可以同时满足多个能力。
//! 2. 同一实体上，一个能力类型只能对应一个特性；重复登记属于装配错误（[`FeatureError::DuplicateCapability`]）。
//! 3. 所有特性挂载完毕后，`build` 会按挂载顺序对每个特性调用一次 [`Feature::prepare`]，
//!    此时特性可以记录所属实体、查询兄弟特性与服务。
//!
//! ## 关于锁（重要）
//!
//! 特性句柄是 [`FeatureRef`]（`Arc<RwLock<_>>`）。调度器更新某个特性时持有它的写锁：
//!
//! - 在回调里读写**其它**特性是安全的；
//! - **不要**在回调里重新锁住自己（例如通过实体再次查询自身能力），`parking_lot` 的锁不可重入；
//! - 需要让外部代码回头操作自己的事件，先在 `update` 里缓冲，再通过 [`Feature::take_deferred`]
//!   交给实体，在写锁释放之后派发。
//!
//! ## 示例
//!
//! ```
//! use jgf_core::game::{
//!     feature::{Capabilities, Feature, FeatureRef},
//!     featurable::FeaturableBuilder,
//! };
//! use jgf_core::services::Services;
//!
//! trait Named: Feature {
//!     fn name(&self) -> &str;
//! }
//!
//! struct Label(&'static str);
//!
//! impl Feature for Label {
//!     fn provide(handle: &FeatureRef<Self>, capabilities: &mut Capabilities) {
//!         capabilities.provide::<dyn Named>(handle.clone());
//!     }
//! }
//!
//! impl Named for Label {
//!     fn name(&self) -> &str {
//!         self.0
//!     }
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = FeaturableBuilder::new();
//! builder.add(Label("footman"))?;
//! let entity = builder.build(&Services::new())?;
//!
//! assert_eq!(entity.feature::<dyn Named>()?.read().name(), "footman");
//! assert!(entity.has_feature::<Label>());
//! # Ok(())
//! # }
//! ```

pub mod actioner;
pub mod animatable;
pub mod attacker;
pub mod identifiable;
pub mod layerable;
pub mod transformable;

use std::{
    any::{Any, TypeId, type_name},
    fmt,
    sync::Arc,
};

use parking_lot::RwLock;

use crate::{
    game::featurable::{EntityId, Featurable, WeakFeaturable},
    services::Services,
    surface::Surface,
};

/// 可加锁的共享特性句柄。`C` 可以是具体类型或 `dyn Trait`。
pub type FeatureRef<C> = Arc<RwLock<C>>;

/// 在特性写锁释放之后执行的回调。
pub type Deferred = Box<dyn FnOnce() + Send>;

/// 特性 trait（所有实体行为单元的统一接口）。
///
/// 生命周期：
/// - `prepare`：所有兄弟特性都已挂载后调用一次；
/// - `update` / `render`：实体存活期间每帧由 [`Handler`](crate::game::handler::Handler) 按层顺序调用；
/// - `recycle`：对象池复用前把特性重置为初始状态（可选）；
/// - `notify_destroyed`：所属实体被标记销毁时调用一次。
pub trait Feature: Any + Send + Sync {
    fn prepare(&mut self, _owner: &Featurable, _services: &Services) -> anyhow::Result<()> {
        Ok(())
    }

    fn update(&mut self, _extrp: f64) -> anyhow::Result<()> {
        Ok(())
    }

    fn render(&mut self, _surface: &mut dyn Surface) -> anyhow::Result<()> {
        Ok(())
    }

    fn recycle(&mut self) {}

    /// `update` 返回后、写锁释放前取走本帧缓冲的回调；实体会在锁外执行它。
    fn take_deferred(&mut self) -> Option<Deferred> {
        None
    }

    /// 所属实体被标记销毁。
    ///
    /// 特性正被锁住时（例如在自己的 `update` 里销毁了实体），调用推迟到该特性的锁释放之后。
    fn notify_destroyed(&mut self) {}

    /// 声明具体类型之外的能力。默认只以具体类型登记。
    fn provide(_handle: &FeatureRef<Self>, _capabilities: &mut Capabilities)
    where
        Self: Sized,
    {
    }
}

pub(crate) struct CapabilityEntry {
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    handle: Box<dyn Any + Send + Sync>,
}

impl CapabilityEntry {
    pub(crate) fn downcast<C>(&self) -> Option<FeatureRef<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.handle.downcast_ref::<FeatureRef<C>>().cloned()
    }
}

/// 一个特性在挂载时声明的能力集合。
#[derive(Default)]
pub struct Capabilities {
    entries: Vec<CapabilityEntry>,
}

impl Capabilities {
    /// 以能力类型 `C` 登记特性句柄。
    pub fn provide<C>(&mut self, handle: FeatureRef<C>)
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.entries.push(CapabilityEntry {
            type_id: TypeId::of::<C>(),
            name: type_name::<C>(),
            handle: Box::new(handle),
        });
    }

    pub(crate) fn into_entries(self) -> Vec<CapabilityEntry> {
        self.entries
    }
}

/// 可嵌入的特性基座：记录所属实体（弱引用，只能设置一次）。
#[derive(Debug, Default)]
pub struct FeatureModel {
    owner: Option<WeakFeaturable>,
}

impl FeatureModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在 `prepare` 阶段绑定所属实体。
    pub fn prepare(&mut self, owner: &Featurable) -> Result<(), FeatureError> {
        if self.owner.is_some() {
            return Err(FeatureError::OwnerAlreadySet { entity: owner.id() });
        }
        self.owner = Some(owner.downgrade());
        Ok(())
    }

    /// 所属实体；尚未 `prepare` 或实体已被释放时返回错误。
    pub fn owner(&self) -> Result<Featurable, FeatureError> {
        self.owner
            .as_ref()
            .and_then(WeakFeaturable::upgrade)
            .ok_or(FeatureError::OwnerMissing)
    }

    pub fn owner_id(&self) -> Option<EntityId> {
        self.owner.as_ref().map(WeakFeaturable::id)
    }

    /// 查询兄弟特性。
    pub fn feature<C>(&self) -> Result<FeatureRef<C>, FeatureError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.owner()?.feature::<C>()
    }

    /// 把绑定关系清空，供对象池复用。
    pub fn release(&mut self) {
        self.owner = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// 特性装配/查询错误。
pub enum FeatureError {
    /// 实体未配置该能力。
    Missing {
        entity: EntityId,
        capability: &'static str,
    },
    /// 同一能力被登记了两次。
    DuplicateCapability {
        entity: EntityId,
        capability: &'static str,
    },
    /// 特性已经绑定过所属实体。
    OwnerAlreadySet { entity: EntityId },
    /// 特性尚未绑定所属实体，或实体已被释放。
    OwnerMissing,
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureError::Missing { entity, capability } => {
                write!(f, "实体 {entity} 未配置特性 {capability}")
            }
            FeatureError::DuplicateCapability { entity, capability } => {
                write!(f, "实体 {entity} 重复登记特性 {capability}")
            }
            FeatureError::OwnerAlreadySet { entity } => {
                write!(f, "特性已绑定所属实体，不能再绑定到实体 {entity}")
            }
            FeatureError::OwnerMissing => write!(f, "特性尚未绑定所属实体"),
        }
    }
}

impl std::error::Error for FeatureError {}
