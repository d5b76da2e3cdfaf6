use std::{collections::HashMap, fmt};

use anyhow::Context as _;
use tracing::{debug, warn};

use crate::{
    game::featurable::{Featurable, FeaturableBuilder},
    services::Services,
    setup::Setup,
};

/// 类构造器：向装配器挂载该类实体的全部特性。
pub type Constructor =
    Box<dyn Fn(&mut FeaturableBuilder, &Services, &Setup) -> anyhow::Result<()> + Send + Sync>;

/// 按描述类名（[`Setup::class`]）组装实体。
///
/// ```
/// use jgf_core::game::{factory::Factory, feature::layerable::LayerableModel};
/// use jgf_core::services::Services;
/// use jgf_core::setup::Setup;
///
/// # fn main() -> anyhow::Result<()> {
/// let mut factory = Factory::new();
/// factory.register("tower", |builder, _services, setup| {
///     builder.add(LayerableModel::from_setup(setup)?)?;
///     Ok(())
/// });
///
/// let tower = factory.create(&Setup::new("tower"), &Services::new())?;
/// assert_eq!(tower.setup().map(Setup::class), Some("tower"));
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Factory {
    constructors: HashMap<String, Constructor>,
}

impl Factory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册类构造器；同名类会被覆盖。
    pub fn register<F>(&mut self, class: impl Into<String>, constructor: F)
    where
        F: Fn(&mut FeaturableBuilder, &Services, &Setup) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let class = class.into();
        if self.constructors.contains_key(&class) {
            warn!(target: "jgf-core", class = %class, "entity class replaced");
        }
        self.constructors.insert(class, Box::new(constructor));
    }

    pub fn contains(&self, class: &str) -> bool {
        self.constructors.contains_key(class)
    }

    /// 按描述组装并准备一个实体。
    pub fn create(&self, setup: &Setup, services: &Services) -> anyhow::Result<Featurable> {
        let constructor = self
            .constructors
            .get(setup.class())
            .ok_or_else(|| FactoryError::UnknownClass(setup.class().to_owned()))?;

        let mut builder = FeaturableBuilder::new().with_setup(setup.clone());
        constructor(&mut builder, services, setup)
            .with_context(|| format!("组装 {} 类实体失败", setup.class()))?;
        let featurable = builder.build(services)?;

        debug!(target: "jgf-core", entity = %featurable.id(), class = setup.class(), "entity created");
        Ok(featurable)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        classes.sort_unstable();
        f.debug_struct("Factory").field("classes", &classes).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    UnknownClass(String),
}

impl fmt::Display for FactoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactoryError::UnknownClass(class) => write!(f, "未注册的实体类: {class}"),
        }
    }
}

impl std::error::Error for FactoryError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::feature::{
            FeatureError,
            attacker::{Attacker, AttackerModel},
            layerable::{Layerable, LayerableModel},
            transformable::TransformableModel,
        },
        setup::ConfigError,
    };

    const GRUNT: &str = r#"(
        class: "grunt",
        nodes: [
            (name: "layerable", attributes: {"refresh": "2", "display": "4"}),
            (name: "attacker", attributes: {"time": "3", "distanceMin": "0", "distanceMax": "1",
                                            "damagesMin": "2", "damagesMax": "5"}),
        ],
    )"#;

    fn factory() -> Factory {
        let mut factory = Factory::new();
        factory.register("grunt", |builder, _services, setup| {
            builder.add(TransformableModel::from_setup(setup)?)?;
            builder.add(LayerableModel::from_setup(setup)?)?;
            builder.add(AttackerModel::from_setup(setup)?)?;
            Ok(())
        });
        factory
    }

    #[test]
    fn create_assembles_registered_class() {
        let setup = Setup::from_ron(GRUNT).unwrap();
        let grunt = factory()
            .create(&setup, &Services::new())
            .expect("已注册的类应能组装");

        let layerable = grunt.feature::<dyn Layerable>().unwrap();
        assert_eq!(layerable.read().layer_refresh(), 2);
        assert_eq!(layerable.read().layer_display(), 4);
        assert_eq!(
            grunt.feature::<AttackerModel>().unwrap().read().config().attack_delay,
            3
        );
        assert!(grunt.has_feature::<dyn Attacker>());
        assert_eq!(grunt.setup(), Some(&setup));
    }

    #[test]
    fn unknown_class_is_rejected() {
        let err = factory()
            .create(&Setup::new("dragon"), &Services::new())
            .expect_err("未注册的类应报错");
        assert_eq!(
            err.downcast_ref::<FactoryError>(),
            Some(&FactoryError::UnknownClass("dragon".into()))
        );
    }

    #[test]
    fn constructor_errors_carry_class_context() {
        let setup = Setup::from_ron(
            r#"(class: "grunt", nodes: [(name: "attacker", attributes: {"time": "1"})])"#,
        )
        .unwrap();
        let err = factory()
            .create(&setup, &Services::new())
            .expect_err("攻击配置不完整应报错");

        assert!(err.to_string().contains("grunt"));
        assert!(matches!(
            err.root_cause().downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn duplicate_feature_in_constructor_fails() {
        let mut factory = Factory::new();
        factory.register("twin", |builder, _services, _setup| {
            builder.add(TransformableModel::new())?;
            builder.add(TransformableModel::new())?;
            Ok(())
        });
        assert!(factory.contains("twin"));

        let err = factory
            .create(&Setup::new("twin"), &Services::new())
            .expect_err("重复特性应报错");
        assert!(matches!(
            err.root_cause().downcast_ref::<FeatureError>(),
            Some(FeatureError::DuplicateCapability { .. })
        ));
    }
}
