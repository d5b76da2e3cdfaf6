//! 攻击者特性：以固定节奏驱动“接近 → 前摇 → 出手 → 收招”的攻击循环。
//!
//! 状态机：
//!
//! | 状态 | 行为 | 下一状态 |
//! |---|---|---|
//! | `None` | 无目标 | `attack(Some(_))` → `Checking` |
//! | `Checking` | 首次更新触发 `reaching`；每帧检查距离、冷却与许可 | 全部满足 → `Preparing` |
//! | `Preparing` | 前摇计时（`attack_delay` 个 tick） | 计时结束 → `Attacking` |
//! | `Attacking` | 动画到达攻击帧时结算伤害；动画结束时触发 `ended` | → `Checking`（同一目标） |
//!
//! `stop_attack` 与超时都只在下一次 `update` 时生效。
//!
//! 事件在 `update` 中按发生顺序缓冲，攻击者的写锁释放后再派发给监听者，
//! 因此监听者可以在回调里锁住攻击者（例如调用 `stop_attack`）。

pub mod config;
pub mod listener;


use std::{fmt, sync::Arc};

use tracing::{debug, error, trace};

use crate::{
    game::{
        feature::{
            Capabilities, Deferred, Feature, FeatureModel, FeatureRef, animatable::AnimatableModel,
            transformable::TransformableModel,
        },
        featurable::{Featurable, WeakFeaturable},
        range::Range,
        tick::Tick,
    },
    services::Services,
    setup::{ConfigError, ConfigReader},
};

pub use config::AttackerConfig;
pub use listener::AttackerListener;
use listener::SiblingListener;

/// 攻击循环的状态（封闭集合）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttackState {
    None = 0,
    Checking = 1,
    Preparing = 2,
    Attacking = 3,
}

impl TryFrom<u8> for AttackState {
    type Error = AttackerError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(AttackState::None),
            1 => Ok(AttackState::Checking),
            2 => Ok(AttackState::Preparing),
            3 => Ok(AttackState::Attacking),
            other => Err(AttackerError::UnknownState(other)),
        }
    }
}

/// 攻击者内部错误。出现即说明状态被破坏，调用方不应继续。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackerError {
    UnknownState(u8),
}

impl fmt::Display for AttackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackerError::UnknownState(raw) => write!(f, "未知的攻击状态: {raw}"),
        }
    }
}

impl std::error::Error for AttackerError {}

/// 本帧缓冲的攻击事件。
enum AttackEvent {
    Reaching(Featurable),
    Preparing(Featurable),
    Started(Featurable),
    Damaged(i32, Featurable),
    Ended(Featurable),
    Stopped,
}

impl AttackEvent {
    fn dispatch(&self, listener: &dyn AttackerListener) {
        match self {
            AttackEvent::Reaching(target) => listener.notify_reaching_target(target),
            AttackEvent::Preparing(target) => listener.notify_preparing_attack(target),
            AttackEvent::Started(target) => listener.notify_attack_started(target),
            AttackEvent::Damaged(damages, target) => listener.notify_attack_damaged(*damages, target),
            AttackEvent::Ended(target) => listener.notify_attack_ended(target),
            AttackEvent::Stopped => listener.notify_attack_stopped(),
        }
    }
}

/// 距离计算策略：`(攻击者, 目标) -> 距离`。
pub type DistanceComputer = Box<dyn Fn(&Featurable, &Featurable) -> f64 + Send + Sync>;

/// 攻击许可策略：返回 `false` 时停留在检查阶段。
pub type AttackChecker = Box<dyn Fn(&Featurable) -> bool + Send + Sync>;

/// 攻击者能力。
pub trait Attacker: Feature {
    /// 指定攻击目标。
    ///
    /// - 与当前目标相同：不做任何事（计时不重置）；
    /// - 不同目标：放弃当前循环，从 `Checking` 重新开始；
    /// - `None`：未在出手时立即清空；出手中则保持不变，直到 `stop_attack` 结束循环。
    fn attack(&mut self, target: Option<&Featurable>);

    /// 请求停止攻击，下一次 `update` 时生效。
    fn stop_attack(&mut self);

    fn set_attack_distance_computer(&mut self, computer: DistanceComputer);

    fn set_attack_checker(&mut self, checker: AttackChecker);

    fn set_attack_delay(&mut self, ticks: u32);

    fn set_attack_frame(&mut self, frame: i32);

    fn set_attack_distance(&mut self, distance: Range);

    fn set_attack_damages(&mut self, damages: Range);

    fn set_attack_cooldown(&mut self, ticks: u32);

    fn is_attacking(&self) -> bool;

    /// 当前目标；目标已被释放时为 `None`。
    fn target(&self) -> Option<Featurable>;

    fn state(&self) -> Result<AttackState, AttackerError>;

    /// 在伤害区间内掷一次。
    fn attack_damages(&self) -> i32;

    fn add_listener(&mut self, listener: Arc<dyn AttackerListener>);

    fn remove_listener(&mut self, listener: &Arc<dyn AttackerListener>);

    /// 若 `candidate` 带有 [`AttackerListener`] 能力，则把它加入监听列表。
    fn check_listener(&mut self, candidate: &Featurable);
}

pub struct AttackerModel {
    model: FeatureModel,
    config: AttackerConfig,
    attack_frame: i32,
    state: u8,
    target: Option<WeakFeaturable>,
    delay: Tick,
    cooldown: Tick,
    stop_requested: bool,
    reach_notified: bool,
    damaged: bool,
    distance_computer: DistanceComputer,
    checker: AttackChecker,
    listeners: Vec<Arc<dyn AttackerListener>>,
    events: Vec<AttackEvent>,
}

impl Default for AttackerModel {
    fn default() -> Self {
        Self::new(AttackerConfig::default())
    }
}

impl AttackerModel {
    pub fn new(config: AttackerConfig) -> Self {
        Self {
            model: FeatureModel::new(),
            config,
            attack_frame: 0,
            state: AttackState::None as u8,
            target: None,
            delay: Tick::new(),
            cooldown: Tick::new(),
            stop_requested: false,
            reach_notified: false,
            damaged: false,
            distance_computer: Box::new(transform_distance),
            checker: Box::new(|_| true),
            listeners: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn from_setup(setup: &dyn ConfigReader) -> Result<Self, ConfigError> {
        Ok(Self::new(AttackerConfig::imports(setup)?))
    }

    pub fn config(&self) -> &AttackerConfig {
        &self.config
    }

    pub fn attack_frame(&self) -> i32 {
        self.attack_frame
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    #[cfg(test)]
    pub(crate) fn corrupt_state(&mut self, raw: u8) {
        self.state = raw;
    }

    fn set_state(&mut self, next: AttackState) {
        trace!(
            target: "jgf-core",
            entity = ?self.model.owner_id(),
            from = self.state,
            to = ?next,
            "attack state changed"
        );
        self.state = next as u8;
    }

    fn emit(&mut self, event: AttackEvent) {
        self.events.push(event);
    }

    /// 目标仍然存活且未被销毁时返回它。
    fn live_target(&self) -> Option<Featurable> {
        self.target
            .as_ref()
            .and_then(WeakFeaturable::upgrade)
            .filter(|target| !target.is_destroyed())
    }

    fn lose_target(&mut self) {
        debug!(
            target: "jgf-core",
            entity = ?self.model.owner_id(),
            victim = ?self.target.as_ref().map(WeakFeaturable::id),
            "attack target lost"
        );
        self.target = None;
        self.set_state(AttackState::None);
        self.emit(AttackEvent::Stopped);
    }

    fn cooldown_elapsed(&self) -> bool {
        !self.cooldown.is_started() || self.cooldown.elapsed_ticks(self.config.cooldown)
    }

    fn update_checking(&mut self) -> anyhow::Result<()> {
        let Some(target) = self.live_target() else {
            self.lose_target();
            return Ok(());
        };

        if !self.reach_notified {
            self.reach_notified = true;
            self.emit(AttackEvent::Reaching(target.clone()));
        }

        let owner = self.model.owner()?;
        let distance = (self.distance_computer)(&owner, &target);
        if self.config.distance.includes(distance) && self.cooldown_elapsed() && (self.checker)(&target)
        {
            self.set_state(AttackState::Preparing);
            self.delay.restart();
            self.emit(AttackEvent::Preparing(target));
        }
        Ok(())
    }

    fn update_preparing(&mut self) {
        let Some(target) = self.live_target() else {
            self.lose_target();
            return;
        };

        if self.delay.elapsed_ticks(self.config.attack_delay) {
            self.set_state(AttackState::Attacking);
            self.damaged = false;
            self.emit(AttackEvent::Started(target));
        }
    }

    fn update_attacking(&mut self) -> anyhow::Result<()> {
        let Some(target) = self.live_target() else {
            self.lose_target();
            return Ok(());
        };

        let owner = self.model.owner()?;
        let (frame_reached, finished) = match owner.try_feature::<AnimatableModel>() {
            Some(animatable) => {
                let animatable = animatable.read();
                if animatable.animation().is_some() {
                    (animatable.frame() >= self.attack_frame, animatable.is_finished())
                } else {
                    (true, true)
                }
            }
            None => (true, true),
        };

        if !self.damaged && frame_reached {
            self.damaged = true;
            let damages = self.attack_damages();
            trace!(target: "jgf-core", entity = %owner.id(), victim = %target.id(), damages, "attack damaged");
            self.emit(AttackEvent::Damaged(damages, target.clone()));
        }

        if self.damaged && finished {
            self.emit(AttackEvent::Ended(target));
            self.cooldown.restart();
            self.reach_notified = false;
            self.set_state(AttackState::Checking);
        }
        Ok(())
    }
}

/// 双方 [`TransformableModel`] 之间的欧氏距离；任一方缺失时视为无穷远。
fn transform_distance(owner: &Featurable, target: &Featurable) -> f64 {
    match (
        owner.try_feature::<TransformableModel>(),
        target.try_feature::<TransformableModel>(),
    ) {
        (Some(source), Some(destination)) if Arc::ptr_eq(&source, &destination) => 0.0,
        (Some(source), Some(destination)) => source.read().distance_to(&destination.read()),
        _ => f64::INFINITY,
    }
}

impl Feature for AttackerModel {
    fn prepare(&mut self, owner: &Featurable, _services: &Services) -> anyhow::Result<()> {
        self.model.prepare(owner)?;
        self.check_listener(owner);
        Ok(())
    }

    fn update(&mut self, extrp: f64) -> anyhow::Result<()> {
        let state = match AttackState::try_from(self.state) {
            Ok(state) => state,
            Err(err) => {
                error!(target: "jgf-core", entity = ?self.model.owner_id(), raw = self.state, "unknown attack state");
                return Err(err.into());
            }
        };

        self.delay.update(extrp);
        self.cooldown.update(extrp);

        if self.stop_requested {
            self.stop_requested = false;
            self.target = None;
            self.set_state(AttackState::None);
            if state != AttackState::None {
                self.emit(AttackEvent::Stopped);
            }
            return Ok(());
        }

        match state {
            AttackState::None => Ok(()),
            AttackState::Checking => self.update_checking(),
            AttackState::Preparing => {
                self.update_preparing();
                Ok(())
            }
            AttackState::Attacking => self.update_attacking(),
        }
    }

    fn recycle(&mut self) {
        self.state = AttackState::None as u8;
        self.target = None;
        self.delay.stop();
        self.cooldown.stop();
        self.stop_requested = false;
        self.reach_notified = false;
        self.damaged = false;
        self.events.clear();
    }

    fn take_deferred(&mut self) -> Option<Deferred> {
        if self.events.is_empty() {
            return None;
        }
        let events = std::mem::take(&mut self.events);
        let listeners = self.listeners.clone();
        Some(Box::new(move || {
            for event in &events {
                for listener in &listeners {
                    event.dispatch(listener.as_ref());
                }
            }
        }))
    }

    fn provide(handle: &FeatureRef<Self>, capabilities: &mut Capabilities) {
        capabilities.provide::<dyn Attacker>(handle.clone());
    }
}

impl Attacker for AttackerModel {
    fn attack(&mut self, target: Option<&Featurable>) {
        match target {
            Some(target) => {
                if self.target.as_ref().map(WeakFeaturable::id) == Some(target.id()) {
                    return;
                }
                trace!(target: "jgf-core", entity = ?self.model.owner_id(), victim = %target.id(), "attack target assigned");
                self.target = Some(target.downgrade());
                self.delay.stop();
                self.stop_requested = false;
                self.reach_notified = false;
                self.damaged = false;
                self.set_state(AttackState::Checking);
            }
            None if self.state == AttackState::Attacking as u8 => {
                debug!(target: "jgf-core", entity = ?self.model.owner_id(), "clearing target deferred while attacking");
            }
            None => {
                self.target = None;
                self.set_state(AttackState::None);
            }
        }
    }

    fn stop_attack(&mut self) {
        self.stop_requested = true;
    }

    fn set_attack_distance_computer(&mut self, computer: DistanceComputer) {
        self.distance_computer = computer;
    }

    fn set_attack_checker(&mut self, checker: AttackChecker) {
        self.checker = checker;
    }

    fn set_attack_delay(&mut self, ticks: u32) {
        self.config.attack_delay = ticks;
    }

    fn set_attack_frame(&mut self, frame: i32) {
        self.attack_frame = frame;
    }

    fn set_attack_distance(&mut self, distance: Range) {
        self.config.distance = distance;
    }

    fn set_attack_damages(&mut self, damages: Range) {
        self.config.damages = damages;
    }

    fn set_attack_cooldown(&mut self, ticks: u32) {
        self.config.cooldown = ticks;
    }

    fn is_attacking(&self) -> bool {
        self.state == AttackState::Attacking as u8
    }

    fn target(&self) -> Option<Featurable> {
        self.target.as_ref().and_then(WeakFeaturable::upgrade)
    }

    fn state(&self) -> Result<AttackState, AttackerError> {
        AttackState::try_from(self.state)
    }

    fn attack_damages(&self) -> i32 {
        self.config.damages.random()
    }

    fn add_listener(&mut self, listener: Arc<dyn AttackerListener>) {
        self.listeners.push(listener);
    }

    fn remove_listener(&mut self, listener: &Arc<dyn AttackerListener>) {
        self.listeners
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    fn check_listener(&mut self, candidate: &Featurable) {
        let Some(sibling) = candidate.try_feature::<dyn AttackerListener>() else {
            return;
        };
        // 攻击者自己也实现了监听时不订阅自身
        if sibling.data_ptr() as *const () == self as *const Self as *const () {
            return;
        }
        self.listeners.push(Arc::new(SiblingListener(sibling)));
    }
}
