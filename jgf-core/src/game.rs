//! 运行时的实体模型：特性组合（[`feature`] / [`featurable`]）、类工厂（[`factory`]）
//! 与每帧调度器（[`handler`]），以及它们共用的计时（[`tick`]）和区间（[`range`]）工具。

pub mod factory;
pub mod featurable;
pub mod feature;
pub mod handler;
pub mod range;
pub mod tick;
