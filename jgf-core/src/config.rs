use std::time::Duration;

/// 帧循环配置。
///
/// - `game_tick_ms`：逻辑更新 tick 间隔（毫秒）
/// - `rate`：期望的逻辑更新频率（每秒次数），用于把实际耗时换算成外推系数
/// - `max_frames`：最多驱动多少帧后退出，`None` 表示不限制
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub game_tick_ms: u64,
    pub rate: f64,
    pub max_frames: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            game_tick_ms: 50,
            rate: 20.0,
            max_frames: None,
        }
    }
}

impl GameConfig {
    /// tick 间隔对应的 [`Duration`]。
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.game_tick_ms.max(1))
    }

    /// 把一次真实的帧耗时换算为外推系数（`extrp`）。
    ///
    /// 恰好耗时一个期望 tick 时结果为 `1.0`；掉帧时相应变大。
    pub fn extrapolation(&self, delta: Duration) -> f64 {
        delta.as_secs_f64() * self.rate
    }
}
