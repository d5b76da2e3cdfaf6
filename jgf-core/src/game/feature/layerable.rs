use std::sync::Arc;

use tracing::trace;

use crate::{
    game::{
        feature::{Capabilities, Feature, FeatureModel, FeatureRef},
        featurable::{EntityId, Featurable},
    },
    services::Services,
    setup::{ConfigError, ConfigReader},
};

/// 分层能力：决定实体在更新/渲染遍历中的先后。
///
/// `layer_refresh` 控制更新顺序，`layer_display` 控制渲染顺序；数值越小越先处理，默认都为 0。
pub trait Layerable: Feature {
    /// 同时设置两个层值。
    ///
    /// 无论取值是否变化，都会在写入新值**之前**同步通知全部监听者。
    fn set_layer(&mut self, refresh: i32, display: i32);

    fn layer_refresh(&self) -> i32;

    fn layer_display(&self) -> i32;

    /// 所属实体（尚未准备时为 `None`）。
    fn owner_id(&self) -> Option<EntityId>;

    fn add_listener(&mut self, listener: Arc<dyn LayerableListener>);

    fn remove_listener(&mut self, listener: &Arc<dyn LayerableListener>);
}

/// 层变化监听者。
pub trait LayerableListener: Send + Sync {
    fn notify_layer_changed(
        &self,
        layerable: &dyn Layerable,
        old_refresh: i32,
        new_refresh: i32,
        old_display: i32,
        new_display: i32,
    );
}

#[derive(Default)]
pub struct LayerableModel {
    model: FeatureModel,
    refresh: i32,
    display: i32,
    listeners: Vec<Arc<dyn LayerableListener>>,
}

impl LayerableModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layers(refresh: i32, display: i32) -> Self {
        Self {
            refresh,
            display,
            ..Self::default()
        }
    }

    /// 从描述的可选节点 `layerable`（属性 `refresh` / `display`）读取初始层。
    pub fn from_setup(setup: &dyn ConfigReader) -> Result<Self, ConfigError> {
        match setup.node("layerable") {
            Some(node) => Ok(Self::with_layers(
                node.read_or(0, "refresh")?,
                node.read_or(0, "display")?,
            )),
            None => Ok(Self::new()),
        }
    }
}

impl Feature for LayerableModel {
    fn prepare(&mut self, owner: &Featurable, _services: &Services) -> anyhow::Result<()> {
        self.model.prepare(owner)?;
        Ok(())
    }

    fn provide(handle: &FeatureRef<Self>, capabilities: &mut Capabilities) {
        capabilities.provide::<dyn Layerable>(handle.clone());
    }
}

impl Layerable for LayerableModel {
    fn set_layer(&mut self, new_refresh: i32, new_display: i32) {
        trace!(
            target: "jgf-core",
            entity = ?self.model.owner_id(),
            new_refresh,
            new_display,
            "layer changed"
        );
        let this: &Self = self;
        for listener in &this.listeners {
            listener.notify_layer_changed(this, this.refresh, new_refresh, this.display, new_display);
        }
        self.refresh = new_refresh;
        self.display = new_display;
    }

    fn layer_refresh(&self) -> i32 {
        self.refresh
    }

    fn layer_display(&self) -> i32 {
        self.display
    }

    fn owner_id(&self) -> Option<EntityId> {
        self.model.owner_id()
    }

    fn add_listener(&mut self, listener: Arc<dyn LayerableListener>) {
        self.listeners.push(listener);
    }

    fn remove_listener(&mut self, listener: &Arc<dyn LayerableListener>) {
        self.listeners
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::featurable::FeaturableBuilder,
        setup::{ConfigNode, Setup},
    };
    use parking_lot::Mutex;

    type Change = (Option<EntityId>, i32, i32, i32, i32, i32);

    #[derive(Default)]
    struct Recorder {
        changes: Mutex<Vec<Change>>,
    }

    impl LayerableListener for Recorder {
        fn notify_layer_changed(
            &self,
            layerable: &dyn Layerable,
            old_refresh: i32,
            new_refresh: i32,
            old_display: i32,
            new_display: i32,
        ) {
            self.changes.lock().push((
                layerable.owner_id(),
                // 通知发生在写入之前，此时仍应读到旧值
                layerable.layer_refresh(),
                old_refresh,
                new_refresh,
                old_display,
                new_display,
            ));
        }
    }

    #[test]
    fn listeners_see_old_values_before_assignment() {
        let mut builder = FeaturableBuilder::new();
        builder.add(LayerableModel::with_layers(1, 2)).unwrap();
        let entity = builder.build(&Services::new()).unwrap();
        let layerable = entity.feature::<dyn Layerable>().unwrap();

        let recorder = Arc::new(Recorder::default());
        layerable.write().add_listener(recorder.clone());
        layerable.write().set_layer(5, 0);

        assert_eq!(
            *recorder.changes.lock(),
            [(Some(entity.id()), 1, 1, 5, 2, 0)]
        );
        assert_eq!(layerable.read().layer_refresh(), 5);
        assert_eq!(layerable.read().layer_display(), 0);
    }

    #[test]
    fn unchanged_values_still_notify() {
        let mut layerable = LayerableModel::new();
        let recorder = Arc::new(Recorder::default());
        layerable.add_listener(recorder.clone());

        layerable.set_layer(0, 0);
        assert_eq!(recorder.changes.lock().len(), 1);

        let listener: Arc<dyn LayerableListener> = recorder.clone();
        layerable.remove_listener(&listener);
        layerable.set_layer(3, 3);
        assert_eq!(recorder.changes.lock().len(), 1, "移除后的监听者不应再收到通知");
    }

    #[test]
    fn from_setup_reads_optional_node() {
        let setup = Setup::new("tower").with_node(
            ConfigNode::new("layerable")
                .with_attribute("refresh", 3)
                .with_attribute("display", 7),
        );
        let layerable = LayerableModel::from_setup(&setup).expect("层配置应能读取");
        assert_eq!((layerable.layer_refresh(), layerable.layer_display()), (3, 7));

        let plain = LayerableModel::from_setup(&Setup::new("tower")).unwrap();
        assert_eq!((plain.layer_refresh(), plain.layer_display()), (0, 0));
    }
}
