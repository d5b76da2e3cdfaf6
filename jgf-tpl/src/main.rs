use std::sync::atomic::{AtomicI32, Ordering};

use anyhow::Context;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{info, warn};

use jgf_core::{
    Featurable, Handler,
    config::GameConfig,
    game::{
        factory::Factory,
        feature::{
            Capabilities, Feature, FeatureRef,
            actioner::ActionerModel,
            animatable::{AnimatableModel, Animation},
            attacker::{Attacker, AttackerListener, AttackerModel},
            layerable::LayerableModel,
            transformable::TransformableModel,
        },
    },
    logger,
    services::Services,
    setup::{ConfigReader, Setup},
    surface::NullSurface,
};

const GRUNT: &str = r#"(
    class: "grunt",
    nodes: [
        (name: "size", attributes: {"width": "16", "height": "16"}),
        (name: "layerable", attributes: {"refresh": "0", "display": "1"}),
        (name: "attacker", attributes: {"time": "2", "distanceMin": "0", "distanceMax": "24",
                                        "damagesMin": "2", "damagesMax": "6", "cooldown": "4"}),
        (
            name: "actions",
            children: [
                (name: "action", attributes: {"name": "move"}),
                (name: "action", attributes: {"name": "attack"}),
                (name: "action", attributes: {"name": "stop", "cancel": "true"}),
            ],
        ),
    ],
)"#;

const PEON: &str = r#"(
    class: "peon",
    nodes: [
        (name: "size", attributes: {"width": "12", "height": "12"}),
        (name: "layerable", attributes: {"refresh": "1", "display": "0"}),
        (name: "health", attributes: {"life": "20"}),
    ],
)"#;

/// 生命值；伤害由攻击监听者结算。
struct Health {
    life: AtomicI32,
}

impl Health {
    fn from_setup(setup: &dyn ConfigReader) -> anyhow::Result<Self> {
        let life = setup.require_node("health")?.read("life")?;
        Ok(Self {
            life: AtomicI32::new(life),
        })
    }
}

impl Feature for Health {}

/// grunt 的战斗日志：作为兄弟特性自动订阅攻击事件，出手时播放攻击动画，并把伤害结算到目标身上。
#[derive(Default)]
struct CombatLog {
    animatable: Option<FeatureRef<AnimatableModel>>,
}

impl Feature for CombatLog {
    fn prepare(&mut self, owner: &Featurable, _services: &Services) -> anyhow::Result<()> {
        self.animatable = Some(owner.feature::<AnimatableModel>()?);
        Ok(())
    }

    fn provide(handle: &FeatureRef<Self>, capabilities: &mut Capabilities) {
        capabilities.provide::<dyn AttackerListener>(handle.clone());
    }
}

impl AttackerListener for CombatLog {
    fn notify_reaching_target(&self, target: &Featurable) {
        info!(target: "jgf-tpl", victim = %target.id(), "reaching target");
    }

    fn notify_attack_started(&self, target: &Featurable) {
        info!(target: "jgf-tpl", victim = %target.id(), "attack started");
        if let (Some(animatable), Ok(animation)) =
            (&self.animatable, Animation::new("attack", 1, 3, 0.5, false))
        {
            animatable.write().play(animation);
        }
    }

    fn notify_attack_damaged(&self, damages: i32, target: &Featurable) {
        let Ok(health) = target.feature::<Health>() else {
            warn!(target: "jgf-tpl", victim = %target.id(), "target has no health");
            return;
        };
        let life = health.read().life.fetch_sub(damages, Ordering::AcqRel) - damages;
        info!(target: "jgf-tpl", victim = %target.id(), damages, life, "attack damaged");
        if life <= 0 {
            target.notify_destroyed();
        }
    }

    fn notify_attack_stopped(&self) {
        info!(target: "jgf-tpl", "attack stopped");
    }
}

fn build_factory() -> Factory {
    let mut factory = Factory::new();
    factory.register("grunt", |builder, _services, setup| {
        builder.add(TransformableModel::from_setup(setup)?)?;
        builder.add(LayerableModel::from_setup(setup)?)?;
        builder.add(AnimatableModel::new())?;
        builder.add(ActionerModel::from_setup(setup)?)?;
        builder.add(CombatLog::default())?;
        let attacker = builder.add(AttackerModel::from_setup(setup)?)?;
        attacker.write().set_attack_frame(2);
        Ok(())
    });
    factory.register("peon", |builder, _services, setup| {
        builder
            .add(TransformableModel::from_setup(setup)?)?
            .write()
            .teleport(20.0, 0.0);
        builder.add(LayerableModel::from_setup(setup)?)?;
        builder.add(Health::from_setup(setup)?)?;
        Ok(())
    });
    factory
}

/// 组装演示场景：grunt 追打 peon。
fn build_world(services: &Services) -> anyhow::Result<(Handler, Featurable, Featurable)> {
    let factory = build_factory();
    let grunt = factory
        .create(&Setup::from_ron(GRUNT)?, services)
        .context("创建 grunt 失败")?;
    let peon = factory
        .create(&Setup::from_ron(PEON)?, services)
        .context("创建 peon 失败")?;

    grunt
        .feature::<dyn Attacker>()?
        .write()
        .attack(Some(&peon));

    let handler = Handler::new();
    handler.add(grunt.clone());
    handler.add(peon.clone());
    Ok((handler, grunt, peon))
}

/// 以固定节奏驱动帧循环，直到达到 `max_frames` 或只剩一个实体。
async fn run(config: &GameConfig, handler: &Handler) -> anyhow::Result<u64> {
    let mut ticker = interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut surface = NullSurface;
    let mut last = Instant::now();
    let mut frames = 0;
    loop {
        ticker.tick().await;
        let now = Instant::now();
        let extrp = config.extrapolation(now - last);
        last = now;

        handler.update(extrp).context("帧更新失败")?;
        handler.render(&mut surface).context("帧渲染失败")?;
        frames += 1;

        if config.max_frames.is_some_and(|max| frames >= max) || (frames > 1 && handler.size() <= 1) {
            return Ok(frames);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_with_directives(&["jgf-tpl=debug"])?;

    let config = GameConfig {
        max_frames: Some(400),
        ..GameConfig::default()
    };
    let services = Services::new();
    let (handler, grunt, peon) = build_world(&services).context("构建演示场景失败")?;

    let frames = run(&config, &handler).await?;

    let location = grunt
        .feature::<TransformableModel>()?
        .read()
        .location();
    info!(
        target: "jgf-tpl",
        frames,
        peon_destroyed = peon.is_destroyed(),
        grunt = ?location,
        "demo finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn demo_world_runs_until_peon_dies() {
        let config = GameConfig {
            max_frames: Some(2_000),
            ..GameConfig::default()
        };
        let services = Services::new();
        let (handler, grunt, peon) = build_world(&services).expect("演示场景应能构建");

        let frames = run(&config, &handler).await.expect("帧循环不应失败");

        assert!(frames < 2_000, "peon 应在帧数上限之前被击杀");
        assert!(peon.is_destroyed());
        assert_eq!(handler.values(), [grunt]);
    }
}
