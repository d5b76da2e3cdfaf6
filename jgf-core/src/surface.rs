use std::any::Any;

/// 渲染目标（对运行时不透明）。
///
/// 运行时只负责把它按显示层顺序传给每个特性的 `render`；具体的绘制后端由游戏侧实现，
/// 特性需要时通过 [`as_any_mut`](Self::as_any_mut) 还原成具体类型。
pub trait Surface: Send {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// 什么都不画的渲染目标，适合无头运行与测试。
#[derive(Debug, Default)]
pub struct NullSurface;

impl Surface for NullSurface {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
