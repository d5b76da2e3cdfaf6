use std::sync::Arc;

use parking_lot::Mutex;

use jgf_core::{
    Featurable, Handler,
    config::GameConfig,
    game::{
        factory::Factory,
        feature::{
            Feature,
            attacker::{Attacker, AttackerListener, AttackerModel},
            layerable::LayerableModel,
            transformable::TransformableModel,
        },
    },
    services::Services,
    setup::{ConfigReader, Setup},
    surface::NullSurface,
};

const GRUNT: &str = r#"(
    class: "grunt",
    nodes: [
        (name: "layerable", attributes: {"refresh": "0", "display": "1"}),
        (name: "attacker", attributes: {"time": "1", "distanceMin": "0", "distanceMax": "2",
                                        "damagesMin": "5", "damagesMax": "5"}),
    ],
)"#;

const PEON: &str = r#"(
    class: "peon",
    nodes: [
        (name: "health", attributes: {"life": "10"}),
        (name: "layerable", attributes: {"refresh": "1", "display": "0"}),
    ],
)"#;

struct Health {
    life: i32,
}

impl Feature for Health {}

/// 把伤害结算到目标的生命值上，生命耗尽时销毁目标。
#[derive(Default)]
struct DamageApplier {
    hits: Mutex<Vec<i32>>,
    stopped: Mutex<u32>,
}

impl AttackerListener for DamageApplier {
    fn notify_attack_damaged(&self, damages: i32, target: &Featurable) {
        self.hits.lock().push(damages);
        let health = target.feature::<Health>().expect("目标应带有生命值");
        let dead = {
            let mut health = health.write();
            health.life -= damages;
            health.life <= 0
        };
        if dead {
            target.notify_destroyed();
        }
    }

    fn notify_attack_stopped(&self) {
        *self.stopped.lock() += 1;
    }
}

fn factory() -> Factory {
    let mut factory = Factory::new();
    factory.register("grunt", |builder, _services, setup| {
        builder.add(TransformableModel::from_setup(setup)?)?;
        builder.add(LayerableModel::from_setup(setup)?)?;
        builder.add(AttackerModel::from_setup(setup)?)?;
        Ok(())
    });
    factory.register("peon", |builder, _services, setup| {
        let life = setup.require_node("health")?.read("life")?;
        builder
            .add(TransformableModel::from_setup(setup)?)?
            .write()
            .teleport(1.0, 0.0);
        builder.add(LayerableModel::from_setup(setup)?)?;
        builder.add(Health { life })?;
        Ok(())
    });
    factory
}

#[test]
fn grunt_kills_peon_and_handler_drops_it() {
    let config = GameConfig::default();
    let extrp = config.extrapolation(config.tick_interval());
    let services = Services::new();
    let factory = factory();

    let grunt = factory
        .create(&Setup::from_ron(GRUNT).unwrap(), &services)
        .expect("grunt 应能组装");
    let peon = factory
        .create(&Setup::from_ron(PEON).unwrap(), &services)
        .expect("peon 应能组装");

    let applier = Arc::new(DamageApplier::default());
    {
        let attacker = grunt.feature::<dyn Attacker>().unwrap();
        let mut attacker = attacker.write();
        attacker.add_listener(applier.clone());
        attacker.attack(Some(&peon));
    }

    let handler = Handler::new();
    handler.add(grunt.clone());
    handler.add(peon.clone());

    let mut frames = 0;
    while handler.size() != 1 || *applier.stopped.lock() == 0 {
        assert!(frames < 32, "peon 应在有限帧内被击杀");
        handler.update(extrp).expect("帧更新不应失败");
        handler.render(&mut NullSurface).expect("帧渲染不应失败");
        frames += 1;
    }

    assert_eq!(*applier.hits.lock(), [5, 5]);
    assert!(peon.is_destroyed());
    assert!(handler.get(peon.id()).is_none());
    assert_eq!(handler.get(grunt.id()), Some(grunt.clone()));

    let attacker = grunt.feature::<dyn Attacker>().unwrap();
    assert!(attacker.read().target().is_none());
    assert!(!attacker.read().is_attacking());
}
