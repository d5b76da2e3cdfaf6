use std::{
    any::{TypeId, type_name},
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use anyhow::Context as _;
use parking_lot::RwLock;
use tracing::trace;

use crate::{
    game::feature::{
        Capabilities, CapabilityEntry, Feature, FeatureError, FeatureRef,
        identifiable::{Identifiable, IdentifiableModel},
    },
    services::Services,
    setup::Setup,
    surface::Surface,
};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// 实体唯一标识。
///
/// 由进程内单调递增的计数器分配，永不复用。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct FeatureSlot {
    name: &'static str,
    handle: FeatureRef<dyn Feature>,
    /// 销毁时该特性正被锁住，钩子待锁释放后补发。
    destroy_pending: AtomicBool,
}

impl FeatureSlot {
    fn notify_destroyed(&self) {
        match self.handle.try_write() {
            Some(mut feature) => feature.notify_destroyed(),
            None => self.destroy_pending.store(true, Ordering::Release),
        }
    }

    fn settle(&self) {
        if self.destroy_pending.swap(false, Ordering::AcqRel) {
            self.handle.write().notify_destroyed();
        }
    }
}

struct FeaturableInner {
    id: EntityId,
    setup: Option<Arc<Setup>>,
    identifiable: FeatureRef<IdentifiableModel>,
    features: Vec<FeatureSlot>,
    capabilities: HashMap<TypeId, CapabilityEntry>,
}

/// 由特性组合而成的实体句柄。
///
/// `Featurable` 可以廉价地克隆，所有克隆指向同一个实体；实体独占它的全部特性。
/// 特性集合在 [`FeaturableBuilder::build`] 之后不再变化。
///
/// ## 销毁语义
///
/// [`notify_destroyed`](Self::notify_destroyed) 只是打上销毁标记并通知监听者；
/// 实体真正从 [`Handler`](crate::game::handler::Handler) 中移除发生在下一次 `update` 的 flush 阶段。
#[derive(Clone)]
pub struct Featurable {
    inner: Arc<FeaturableInner>,
}

impl Featurable {
    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    /// 组装该实体时使用的描述（若有）。
    pub fn setup(&self) -> Option<&Setup> {
        self.inner.setup.as_deref()
    }

    /// 按能力类型获取特性。
    ///
    /// 实体未配置该能力时返回 [`FeatureError::Missing`]；不确定时先用 [`has_feature`](Self::has_feature) 探测。
    pub fn feature<C>(&self) -> Result<FeatureRef<C>, FeatureError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.try_feature::<C>().ok_or(FeatureError::Missing {
            entity: self.id(),
            capability: type_name::<C>(),
        })
    }

    pub fn try_feature<C>(&self) -> Option<FeatureRef<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.inner
            .capabilities
            .get(&TypeId::of::<C>())
            .and_then(CapabilityEntry::downcast::<C>)
    }

    pub fn has_feature<C>(&self) -> bool
    where
        C: ?Sized + 'static,
    {
        self.inner.capabilities.contains_key(&TypeId::of::<C>())
    }

    /// 按挂载顺序遍历全部特性。
    pub fn features(&self) -> impl Iterator<Item = &FeatureRef<dyn Feature>> {
        self.inner.features.iter().map(|slot| &slot.handle)
    }

    /// 内置的身份特性。
    pub fn identifiable(&self) -> &FeatureRef<IdentifiableModel> {
        &self.inner.identifiable
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.identifiable.read().is_destroyed()
    }

    /// 标记实体已销毁，并在**释放身份特性的锁之后**通知监听者与每个特性（只通知一次）。
    ///
    /// 正被锁住的特性（例如调用方自己）会在它的锁释放后收到 [`Feature::notify_destroyed`]。
    pub fn notify_destroyed(&self) {
        let Some(listeners) = self.inner.identifiable.write().mark_destroyed() else {
            return;
        };
        trace!(target: "jgf-core", entity = %self.id(), "entity destroyed");
        for listener in listeners {
            listener.notify_destroyed(self.id());
        }
        for slot in &self.inner.features {
            slot.notify_destroyed();
        }
    }

    /// 按挂载顺序更新每个特性，第一个失败的特性会中断本次更新。
    ///
    /// 特性缓冲的回调（[`Feature::take_deferred`]）在它的写锁释放后立即执行。
    pub fn update(&self, extrp: f64) -> anyhow::Result<()> {
        for slot in &self.inner.features {
            let deferred = {
                let mut feature = slot.handle.write();
                feature
                    .update(extrp)
                    .with_context(|| format!("实体 {} 的特性 {} 更新失败", self.id(), slot.name))?;
                feature.take_deferred()
            };
            if let Some(deferred) = deferred {
                deferred();
            }
            slot.settle();
        }
        Ok(())
    }

    /// 按挂载顺序渲染每个特性。
    pub fn render(&self, surface: &mut dyn Surface) -> anyhow::Result<()> {
        for slot in &self.inner.features {
            slot.handle
                .write()
                .render(surface)
                .with_context(|| format!("实体 {} 的特性 {} 渲染失败", self.id(), slot.name))?;
            slot.settle();
        }
        Ok(())
    }

    /// 把所有特性重置为初始状态。
    pub fn recycle(&self) {
        for slot in &self.inner.features {
            slot.handle.write().recycle();
        }
    }

    pub fn downgrade(&self) -> WeakFeaturable {
        WeakFeaturable {
            id: self.id(),
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for Featurable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Featurable {}

impl Hash for Featurable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Featurable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.inner.features.iter().map(|slot| slot.name).collect();
        f.debug_struct("Featurable")
            .field("id", &self.id())
            .field("class", &self.setup().map(Setup::class))
            .field("features", &names)
            .finish()
    }
}

/// 指向实体的弱引用，特性用它回指所属实体，避免循环引用。
#[derive(Clone)]
pub struct WeakFeaturable {
    id: EntityId,
    inner: Weak<FeaturableInner>,
}

impl WeakFeaturable {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Featurable> {
        self.inner.upgrade().map(|inner| Featurable { inner })
    }
}

impl fmt::Debug for WeakFeaturable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakFeaturable").field(&self.id).finish()
    }
}

/// 实体装配器。
///
/// 创建时即分配 [`EntityId`] 并挂载身份特性（[`IdentifiableModel`]）。
pub struct FeaturableBuilder {
    id: EntityId,
    setup: Option<Arc<Setup>>,
    identifiable: FeatureRef<IdentifiableModel>,
    features: Vec<FeatureSlot>,
    capabilities: HashMap<TypeId, CapabilityEntry>,
}

impl Default for FeaturableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeaturableBuilder {
    pub fn new() -> Self {
        let id = EntityId::next();
        let identifiable = Arc::new(RwLock::new(IdentifiableModel::new(id)));
        let mut builder = Self {
            id,
            setup: None,
            identifiable: Arc::clone(&identifiable),
            features: Vec::new(),
            capabilities: HashMap::new(),
        };
        builder.attach(identifiable);
        builder
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Builder 风格：记录组装所用的描述。
    pub fn with_setup(mut self, setup: Setup) -> Self {
        self.setup = Some(Arc::new(setup));
        self
    }

    pub fn setup(&self) -> Option<&Setup> {
        self.setup.as_deref()
    }

    /// 挂载一个特性，返回它的句柄。
    ///
    /// 只要该特性声明的任一能力已被登记，就整体拒绝并返回 [`FeatureError::DuplicateCapability`]。
    pub fn add<F: Feature>(&mut self, feature: F) -> Result<FeatureRef<F>, FeatureError> {
        let handle = Arc::new(RwLock::new(feature));
        let mut capabilities = Capabilities::default();
        capabilities.provide::<F>(Arc::clone(&handle));
        F::provide(&handle, &mut capabilities);
        let entries = capabilities.into_entries();

        if let Some(duplicate) = entries
            .iter()
            .find(|entry| self.capabilities.contains_key(&entry.type_id))
        {
            return Err(FeatureError::DuplicateCapability {
                entity: self.id,
                capability: duplicate.name,
            });
        }

        self.register(type_name::<F>(), handle.clone(), entries);
        Ok(handle)
    }

    /// Builder 风格的 [`add`](Self::add)。
    pub fn with<F: Feature>(mut self, feature: F) -> Result<Self, FeatureError> {
        self.add(feature)?;
        Ok(self)
    }

    /// 完成装配：创建实体并按挂载顺序准备每个特性。
    pub fn build(self, services: &Services) -> anyhow::Result<Featurable> {
        let featurable = Featurable {
            inner: Arc::new(FeaturableInner {
                id: self.id,
                setup: self.setup,
                identifiable: self.identifiable,
                features: self.features,
                capabilities: self.capabilities,
            }),
        };

        for slot in &featurable.inner.features {
            trace!(target: "jgf-core", entity = %featurable.id(), feature = slot.name, "prepare feature");
            slot.handle
                .write()
                .prepare(&featurable, services)
                .with_context(|| format!("实体 {} 的特性 {} 准备失败", featurable.id(), slot.name))?;
        }

        Ok(featurable)
    }

    fn attach(&mut self, identifiable: FeatureRef<IdentifiableModel>) {
        let mut capabilities = Capabilities::default();
        capabilities.provide::<IdentifiableModel>(Arc::clone(&identifiable));
        IdentifiableModel::provide(&identifiable, &mut capabilities);
        let entries = capabilities.into_entries();
        self.register(type_name::<IdentifiableModel>(), identifiable, entries);
    }

    fn register(
        &mut self,
        name: &'static str,
        handle: FeatureRef<dyn Feature>,
        entries: Vec<CapabilityEntry>,
    ) {
        for entry in entries {
            self.capabilities.insert(entry.type_id, entry);
        }
        self.features.push(FeatureSlot {
            name,
            handle,
            destroy_pending: AtomicBool::new(false),
        });
    }
}
