use nalgebra::Vector2;

use crate::{
    game::{
        feature::{Feature, FeatureModel},
        featurable::Featurable,
    },
    services::Services,
    setup::{ConfigError, ConfigReader},
};

/// 位置与尺寸。
///
/// 记录上一帧位置（`old_location`），便于其它特性计算位移。
#[derive(Debug, Default)]
pub struct TransformableModel {
    model: FeatureModel,
    location: Vector2<f64>,
    old_location: Vector2<f64>,
    size: Vector2<f64>,
}

impl TransformableModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从描述的可选节点 `size`（属性 `width` / `height`）读取尺寸。
    pub fn from_setup(setup: &dyn ConfigReader) -> Result<Self, ConfigError> {
        let mut transformable = Self::new();
        if let Some(node) = setup.node("size") {
            transformable.set_size(node.read("width")?, node.read("height")?);
        }
        Ok(transformable)
    }

    /// 瞬移：新旧位置同时改写，不产生位移。
    pub fn teleport(&mut self, x: f64, y: f64) {
        self.location = Vector2::new(x, y);
        self.old_location = self.location;
    }

    /// 按外推系数移动。
    pub fn move_location(&mut self, extrp: f64, dx: f64, dy: f64) {
        self.old_location = self.location;
        self.location += Vector2::new(dx, dy) * extrp;
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.size = Vector2::new(width, height);
    }

    pub fn location(&self) -> Vector2<f64> {
        self.location
    }

    pub fn old_location(&self) -> Vector2<f64> {
        self.old_location
    }

    pub fn size(&self) -> Vector2<f64> {
        self.size
    }

    pub fn distance_to(&self, other: &TransformableModel) -> f64 {
        (other.location - self.location).norm()
    }
}

impl Feature for TransformableModel {
    fn prepare(&mut self, owner: &Featurable, _services: &Services) -> anyhow::Result<()> {
        self.model.prepare(owner)?;
        Ok(())
    }

    fn recycle(&mut self) {
        self.location = Vector2::zeros();
        self.old_location = Vector2::zeros();
    }
}
