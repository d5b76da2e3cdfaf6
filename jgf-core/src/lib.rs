//! Jungle Game Features 的核心库（`jgf-core`）。
//!
//! 该 crate 提供一个基于“特性组合”的游戏对象运行时：
//! - 服务注册表（[`services::Services`]），在组装实体时显式传入；
//! - 由特性组合而成的实体（[`game::featurable::Featurable`]）及其装配器与类工厂（[`game::factory`]）；
//! - 按层顺序驱动实体的每帧调度器（[`game::handler::Handler`]）；
//! - 若干内置特性：身份、分层、位置、动画、动作与攻击（[`game::feature`]）。
//!
//! 大多数游戏项目只需要：
//! - 调用 [`logger::init`] 初始化日志
//! - 用 [`game::factory::Factory`] 按描述（[`setup::Setup`]）创建实体
//! - 每帧调用 [`Handler::update`] 与 [`Handler::render`]

pub mod config;
pub mod game;
pub mod logger;
pub mod services;
pub mod setup;
pub mod surface;

pub use game::{
    featurable::{EntityId, Featurable, FeaturableBuilder},
    handler::Handler,
};
