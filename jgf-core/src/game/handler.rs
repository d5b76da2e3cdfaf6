//! 每帧调度器（[`Handler`]）。
//!
//! `Handler` 持有一组存活实体，每帧先 flush 延迟队列，再按层顺序驱动全部特性：
//!
//! 1. **flush**：把待加入的实体转为存活，把待移除的实体摘除（尚未销毁的会补发销毁通知）；
//! 2. **update**：按 `layer_refresh` 升序（同层按加入顺序）逐个更新实体；
//! 3. **render**：按 `layer_display` 升序逐个渲染实体。
//!
//! 遍历期间的 `add` / `remove` 只进入队列，下一次 `update` 的 flush 才生效，因此当前这一轮
//! 的遍历永远基于一份稳定的快照。


use std::{
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::{
    game::{
        feature::{
            identifiable::{Identifiable, IdentifiableListener},
            layerable::{Layerable, LayerableListener},
        },
        featurable::{EntityId, Featurable},
    },
    surface::Surface,
};

/// 实体进出存活集合的监听者。
pub trait HandlerListener: Send + Sync {
    fn notify_handlable_added(&self, featurable: &Featurable);

    fn notify_handlable_removed(&self, featurable: &Featurable);
}

#[derive(Default)]
struct Pending {
    added: Vec<Featurable>,
    removed: Vec<EntityId>,
}

#[derive(Default)]
struct Live {
    /// 按加入顺序排列。
    entries: Vec<Featurable>,
    refresh_order: Vec<Featurable>,
    display_order: Vec<Featurable>,
}

impl Live {
    fn rebuild_orders(&mut self) {
        self.refresh_order = sorted_by_layer(&self.entries, |layerable| layerable.layer_refresh());
        self.display_order = sorted_by_layer(&self.entries, |layerable| layerable.layer_display());
    }
}

fn sorted_by_layer(entries: &[Featurable], key: impl Fn(&dyn Layerable) -> i32) -> Vec<Featurable> {
    let mut keyed: Vec<(i32, &Featurable)> = entries
        .iter()
        .map(|featurable| {
            let layer = featurable
                .try_feature::<dyn Layerable>()
                .map_or(0, |layerable| key(&*layerable.read()));
            (layer, featurable)
        })
        .collect();
    // 稳定排序：同层保持加入顺序
    keyed.sort_by_key(|(layer, _)| *layer);
    keyed.into_iter().map(|(_, featurable)| featurable.clone()).collect()
}

struct HandlerShared {
    pending: Mutex<Pending>,
    live: RwLock<Live>,
    orders_dirty: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn HandlerListener>>>,
    hook: Arc<HandlerHook>,
}

/// 订阅到每个存活实体上：销毁时排队移除，换层时标记重新排序。
struct HandlerHook {
    shared: Weak<HandlerShared>,
}

impl IdentifiableListener for HandlerHook {
    fn notify_destroyed(&self, id: EntityId) {
        if let Some(shared) = self.shared.upgrade() {
            shared.pending.lock().removed.push(id);
        }
    }
}

impl LayerableListener for HandlerHook {
    fn notify_layer_changed(
        &self,
        _layerable: &dyn Layerable,
        _old_refresh: i32,
        _new_refresh: i32,
        _old_display: i32,
        _new_display: i32,
    ) {
        if let Some(shared) = self.shared.upgrade() {
            shared.orders_dirty.store(true, Ordering::Release);
        }
    }
}

/// 实体调度器句柄，克隆后指向同一份状态。
#[derive(Clone)]
pub struct Handler {
    shared: Arc<HandlerShared>,
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler {
    pub fn new() -> Self {
        let shared = Arc::new_cyclic(|weak| HandlerShared {
            pending: Mutex::new(Pending::default()),
            live: RwLock::new(Live::default()),
            orders_dirty: AtomicBool::new(false),
            listeners: RwLock::new(Vec::new()),
            hook: Arc::new(HandlerHook {
                shared: weak.clone(),
            }),
        });
        Self { shared }
    }

    /// 排队加入，下一次 `update` 时生效。
    pub fn add(&self, featurable: Featurable) {
        self.shared.pending.lock().added.push(featurable);
    }

    /// 排队移除，下一次 `update` 时生效。
    pub fn remove(&self, featurable: &Featurable) {
        self.remove_id(featurable.id());
    }

    pub fn remove_id(&self, id: EntityId) {
        self.shared.pending.lock().removed.push(id);
    }

    /// 把全部存活与待加入的实体排队移除。
    pub fn remove_all(&self) {
        let live_ids: Vec<EntityId> = self
            .shared
            .live
            .read()
            .entries
            .iter()
            .map(Featurable::id)
            .collect();
        let mut pending = self.shared.pending.lock();
        let pending_ids: Vec<EntityId> = pending.added.iter().map(Featurable::id).collect();
        pending.removed.extend(live_ids);
        pending.removed.extend(pending_ids);
    }

    /// 存活实体数量（不含待加入的）。
    pub fn size(&self) -> usize {
        self.shared.live.read().entries.len()
    }

    pub fn get(&self, id: EntityId) -> Option<Featurable> {
        self.shared
            .live
            .read()
            .entries
            .iter()
            .find(|featurable| featurable.id() == id)
            .cloned()
    }

    /// 存活实体快照，按加入顺序排列。
    pub fn values(&self) -> Vec<Featurable> {
        self.shared.live.read().entries.clone()
    }

    pub fn add_listener(&self, listener: Arc<dyn HandlerListener>) {
        self.shared.listeners.write().push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn HandlerListener>) {
        self.shared
            .listeners
            .write()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    /// flush 延迟队列后，按刷新层顺序更新全部存活实体。
    ///
    /// 第一个失败的特性会中断本轮更新并返回错误。
    pub fn update(&self, extrp: f64) -> anyhow::Result<()> {
        self.flush();
        for featurable in self.refresh_order() {
            featurable.update(extrp)?;
        }
        Ok(())
    }

    /// 按显示层顺序渲染全部存活实体。
    pub fn render(&self, surface: &mut dyn Surface) -> anyhow::Result<()> {
        for featurable in self.display_order() {
            featurable.render(surface)?;
        }
        Ok(())
    }

    fn refresh_order(&self) -> Vec<Featurable> {
        self.refresh_orders();
        self.shared.live.read().refresh_order.clone()
    }

    fn display_order(&self) -> Vec<Featurable> {
        self.refresh_orders();
        self.shared.live.read().display_order.clone()
    }

    fn refresh_orders(&self) {
        if self.shared.orders_dirty.swap(false, Ordering::AcqRel) {
            self.shared.live.write().rebuild_orders();
        }
    }

    fn flush(&self) {
        let Pending { added, removed } = std::mem::take(&mut *self.shared.pending.lock());
        if added.is_empty() && removed.is_empty() {
            return;
        }

        let mut promoted = Vec::new();
        let mut discarded = Vec::new();
        let mut dropped = Vec::new();
        {
            let mut live = self.shared.live.write();
            for featurable in added {
                let id = featurable.id();
                if removed.contains(&id) || featurable.is_destroyed() {
                    discarded.push(featurable);
                } else if live.entries.iter().any(|entry| entry.id() == id) {
                    debug!(target: "jgf-core", entity = %id, "entity already handled, ignored");
                } else {
                    live.entries.push(featurable.clone());
                    promoted.push(featurable);
                }
            }
            for id in &removed {
                if let Some(index) = live.entries.iter().position(|entry| entry.id() == *id) {
                    dropped.push(live.entries.remove(index));
                }
            }
        }
        if !promoted.is_empty() || !dropped.is_empty() {
            self.shared.orders_dirty.store(true, Ordering::Release);
        }

        // 以下回调都在锁外执行，监听者可以自由调用 Handler
        let listeners = self.shared.listeners.read().clone();
        for featurable in &promoted {
            self.subscribe(featurable);
            debug!(target: "jgf-core", entity = %featurable.id(), "entity promoted");
            for listener in &listeners {
                listener.notify_handlable_added(featurable);
            }
        }
        for featurable in &discarded {
            debug!(target: "jgf-core", entity = %featurable.id(), "entity removed before promotion");
            featurable.notify_destroyed();
        }
        for featurable in &dropped {
            self.unsubscribe(featurable);
            featurable.notify_destroyed();
            debug!(target: "jgf-core", entity = %featurable.id(), "entity dropped");
            for listener in &listeners {
                listener.notify_handlable_removed(featurable);
            }
        }
    }

    fn subscribe(&self, featurable: &Featurable) {
        let hook = Arc::clone(&self.shared.hook);
        featurable.identifiable().write().add_listener(hook.clone());
        if let Some(layerable) = featurable.try_feature::<dyn Layerable>() {
            layerable.write().add_listener(hook);
        }
    }

    fn unsubscribe(&self, featurable: &Featurable) {
        let identifiable: Arc<dyn IdentifiableListener> = self.shared.hook.clone();
        featurable
            .identifiable()
            .write()
            .remove_listener(&identifiable);
        if let Some(layerable) = featurable.try_feature::<dyn Layerable>() {
            let listener: Arc<dyn LayerableListener> = self.shared.hook.clone();
            layerable.write().remove_listener(&listener);
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self.shared.pending.lock();
        f.debug_struct("Handler")
            .field("live", &self.size())
            .field("pending_add", &pending.added.len())
            .field("pending_remove", &pending.removed.len())
            .finish()
    }
}
