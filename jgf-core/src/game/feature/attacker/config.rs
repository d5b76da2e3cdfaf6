use crate::{
    game::range::Range,
    setup::{ConfigError, ConfigNode, ConfigReader},
};

/// 攻击配置，对应描述中的 `attacker` 节点。
///
/// | 属性 | 含义 | 必填 |
/// |---|---|---|
/// | `time` | 攻击前摇（tick） | 是 |
/// | `distanceMin` / `distanceMax` | 攻击距离区间 | 是 |
/// | `damagesMin` / `damagesMax` | 伤害区间 | 是 |
/// | `cooldown` | 两次攻击之间的冷却（tick） | 否，默认 0 |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttackerConfig {
    pub attack_delay: u32,
    pub distance: Range,
    pub damages: Range,
    pub cooldown: u32,
}

impl AttackerConfig {
    pub const NODE: &'static str = "attacker";

    /// 读取攻击配置。整个节点缺失时返回全零配置；节点存在时必填属性缺一不可。
    pub fn imports(setup: &dyn ConfigReader) -> Result<Self, ConfigError> {
        let Some(node) = setup.node(Self::NODE) else {
            return Ok(Self::default());
        };

        Ok(Self {
            attack_delay: node.read("time")?,
            distance: read_range(node, "distanceMin", "distanceMax")?,
            damages: read_range(node, "damagesMin", "damagesMax")?,
            cooldown: node.read_or(0, "cooldown")?,
        })
    }
}

fn read_range(node: &ConfigNode, min: &str, max: &str) -> Result<Range, ConfigError> {
    let (min, max) = (node.read(min)?, node.read(max)?);
    Range::new(min, max).map_err(|err| ConfigError::InvalidRange {
        node: node.name.clone(),
        min: err.min,
        max: err.max,
    })
}
