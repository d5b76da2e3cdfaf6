/// 由外推系数驱动的确定性计数器。
///
/// 累加规则：每次 [`update`](Self::update) 把原始的 `extrp` 加到浮点累计值上，
/// 判断是否到期时对累计值向下取整。同一串 `extrp` 输入总能得到同样的到期时刻。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tick {
    count: f64,
    started: bool,
}

impl Tick {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始计数（已开始时保持当前累计值）。
    pub fn start(&mut self) {
        self.started = true;
    }

    /// 停止计数并清零。
    pub fn stop(&mut self) {
        self.started = false;
        self.count = 0.0;
    }

    /// 清零后重新开始计数。
    pub fn restart(&mut self) {
        self.count = 0.0;
        self.started = true;
    }

    pub fn update(&mut self, extrp: f64) {
        if self.started {
            self.count += extrp.max(0.0);
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// 已经走过的整 tick 数。
    pub fn elapsed(&self) -> u64 {
        self.count.floor() as u64
    }

    /// 是否已开始且至少走过 `ticks` 个 tick。
    pub fn elapsed_ticks(&self, ticks: u32) -> bool {
        self.started && self.elapsed() >= u64::from(ticks)
    }
}
