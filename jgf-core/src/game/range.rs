use std::fmt;

use rand::Rng;

/// 闭区间 `[min, max]`，保证 `min <= max`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Range {
    min: i32,
    max: i32,
}

impl Range {
    /// 全零区间，缺省配置使用。
    pub const ZERO: Range = Range { min: 0, max: 0 };

    pub fn new(min: i32, max: i32) -> Result<Self, InvalidRange> {
        if min > max {
            return Err(InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    /// `value` 是否落在区间内（含端点）。
    pub fn includes(&self, value: f64) -> bool {
        value >= f64::from(self.min) && value <= f64::from(self.max)
    }

    /// 在区间内均匀取一个整数。
    pub fn random(&self) -> i32 {
        rand::rng().random_range(self.min..=self.max)
    }
}

/// 区间下界大于上界。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRange {
    pub min: i32,
    pub max: i32,
}

impl fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "区间非法: 最小值 {} 大于最大值 {}", self.min, self.max)
    }
}

impl std::error::Error for InvalidRange {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_inverted_bounds() {
        assert_eq!(Range::new(3, 1), Err(InvalidRange { min: 3, max: 1 }));
    }

    #[test]
    fn includes_is_inclusive() {
        let range = Range::new(0, 2).unwrap();
        assert!(range.includes(0.0));
        assert!(range.includes(2.0));
        assert!(!range.includes(2.5));
        assert!(!range.includes(-0.1));
    }

    #[test]
    fn random_stays_within_bounds() {
        let range = Range::new(1, 3).unwrap();
        for _ in 0..64 {
            let value = range.random();
            assert!((1..=3).contains(&value), "随机值 {value} 越界");
        }
        assert_eq!(Range::ZERO.random(), 0);
    }
}
