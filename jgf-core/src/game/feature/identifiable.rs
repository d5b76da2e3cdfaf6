use std::sync::Arc;

use crate::game::{
    feature::{Capabilities, Feature, FeatureRef},
    featurable::EntityId,
};

/// 实体身份能力：唯一 id + 销毁通知。
pub trait Identifiable: Feature {
    fn id(&self) -> EntityId;

    fn is_destroyed(&self) -> bool;

    fn add_listener(&mut self, listener: Arc<dyn IdentifiableListener>);

    /// 按指针移除监听者，未登记时忽略。
    fn remove_listener(&mut self, listener: &Arc<dyn IdentifiableListener>);
}

/// 实体销毁监听者。
pub trait IdentifiableListener: Send + Sync {
    fn notify_destroyed(&self, id: EntityId);
}

/// 每个实体都会自动挂载的身份特性。
///
/// 销毁通知经由 [`Featurable::notify_destroyed`](crate::game::featurable::Featurable::notify_destroyed)
/// 发出：先在锁内打上标记并取走监听者，再在锁外逐个通知，监听者因此可以自由查询该实体。
pub struct IdentifiableModel {
    id: EntityId,
    destroyed: bool,
    listeners: Vec<Arc<dyn IdentifiableListener>>,
}

impl IdentifiableModel {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            destroyed: false,
            listeners: Vec::new(),
        }
    }

    /// 打上销毁标记，返回需要通知的监听者。已经销毁过时返回 `None`。
    pub(crate) fn mark_destroyed(&mut self) -> Option<Vec<Arc<dyn IdentifiableListener>>> {
        if self.destroyed {
            return None;
        }
        self.destroyed = true;
        Some(self.listeners.clone())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Feature for IdentifiableModel {
    fn provide(handle: &FeatureRef<Self>, capabilities: &mut Capabilities) {
        capabilities.provide::<dyn Identifiable>(handle.clone());
    }
}

impl Identifiable for IdentifiableModel {
    fn id(&self) -> EntityId {
        self.id
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn add_listener(&mut self, listener: Arc<dyn IdentifiableListener>) {
        self.listeners.push(listener);
    }

    fn remove_listener(&mut self, listener: &Arc<dyn IdentifiableListener>) {
        self.listeners
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }
}
