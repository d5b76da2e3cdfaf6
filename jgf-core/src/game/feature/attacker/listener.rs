use crate::game::{feature::FeatureRef, featurable::Featurable};

/// 攻击过程监听者。
///
/// 回调在攻击者本次 `update` 结束、写锁释放之后按发生顺序派发，回调里可以读写攻击者。
pub trait AttackerListener: Send + Sync {
    /// 进入检查阶段后的第一次更新。
    fn notify_reaching_target(&self, _target: &Featurable) {}

    /// 条件满足，开始前摇。
    fn notify_preparing_attack(&self, _target: &Featurable) {}

    fn notify_attack_started(&self, _target: &Featurable) {}

    /// 动画到达攻击帧，伤害已结算。
    fn notify_attack_damaged(&self, _damages: i32, _target: &Featurable) {}

    fn notify_attack_ended(&self, _target: &Featurable) {}

    /// 攻击被停止或目标丢失。
    fn notify_attack_stopped(&self) {}
}

/// 把同一实体上实现了 [`AttackerListener`] 的兄弟特性接入监听列表。
pub(crate) struct SiblingListener(pub(crate) FeatureRef<dyn AttackerListener>);

impl AttackerListener for SiblingListener {
    fn notify_reaching_target(&self, target: &Featurable) {
        self.0.read().notify_reaching_target(target);
    }

    fn notify_preparing_attack(&self, target: &Featurable) {
        self.0.read().notify_preparing_attack(target);
    }

    fn notify_attack_started(&self, target: &Featurable) {
        self.0.read().notify_attack_started(target);
    }

    fn notify_attack_damaged(&self, damages: i32, target: &Featurable) {
        self.0.read().notify_attack_damaged(damages, target);
    }

    fn notify_attack_ended(&self, target: &Featurable) {
        self.0.read().notify_attack_ended(target);
    }

    fn notify_attack_stopped(&self) {
        self.0.read().notify_attack_stopped();
    }
}
