use std::fmt;

use crate::{
    game::{
        feature::{Feature, FeatureModel},
        featurable::Featurable,
    },
    services::Services,
};

/// 一段帧动画：播放 `[first, last]` 区间内的帧。
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    name: String,
    first: i32,
    last: i32,
    speed: f64,
    repeat: bool,
}

impl Animation {
    pub fn new(
        name: impl Into<String>,
        first: i32,
        last: i32,
        speed: f64,
        repeat: bool,
    ) -> Result<Self, AnimationError> {
        if first < 1 || last < first {
            return Err(AnimationError::InvalidFrames { first, last });
        }
        if !speed.is_finite() || speed < 0.0 {
            return Err(AnimationError::InvalidSpeed(speed));
        }
        Ok(Self {
            name: name.into(),
            first,
            last,
            speed,
            repeat,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn first(&self) -> i32 {
        self.first
    }

    pub fn last(&self) -> i32 {
        self.last
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationError {
    InvalidFrames { first: i32, last: i32 },
    InvalidSpeed(f64),
}

impl fmt::Display for AnimationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnimationError::InvalidFrames { first, last } => {
                write!(f, "动画帧区间非法: first={first}, last={last}（要求 1 <= first <= last）")
            }
            AnimationError::InvalidSpeed(speed) => write!(f, "动画速度非法: {speed}"),
        }
    }
}

impl std::error::Error for AnimationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimState {
    #[default]
    Stopped,
    Playing,
    Finished,
}

/// 帧动画播放器。
///
/// 每次 `update` 推进 `speed * extrp` 帧；越过最后一帧时循环（`repeat`）或停在最后一帧并进入 `Finished`。
#[derive(Debug, Default)]
pub struct AnimatableModel {
    model: FeatureModel,
    animation: Option<Animation>,
    current: f64,
    state: AnimState,
}

impl AnimatableModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(&mut self, animation: Animation) {
        self.current = f64::from(animation.first);
        self.animation = Some(animation);
        self.state = AnimState::Playing;
    }

    pub fn stop(&mut self) {
        self.state = AnimState::Stopped;
    }

    /// 当前帧（向下取整）；没有动画时为 0。
    pub fn frame(&self) -> i32 {
        self.current.floor() as i32
    }

    pub fn anim_state(&self) -> AnimState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == AnimState::Finished
    }

    pub fn animation(&self) -> Option<&Animation> {
        self.animation.as_ref()
    }
}

impl Feature for AnimatableModel {
    fn prepare(&mut self, owner: &Featurable, _services: &Services) -> anyhow::Result<()> {
        self.model.prepare(owner)?;
        Ok(())
    }

    fn update(&mut self, extrp: f64) -> anyhow::Result<()> {
        if self.state != AnimState::Playing {
            return Ok(());
        }
        let Some(animation) = &self.animation else {
            return Ok(());
        };

        self.current += animation.speed * extrp;
        let end = f64::from(animation.last) + 1.0;
        if self.current >= end {
            if animation.repeat {
                let span = end - f64::from(animation.first);
                self.current = f64::from(animation.first) + (self.current - end) % span;
            } else {
                self.current = f64::from(animation.last);
                self.state = AnimState::Finished;
            }
        }
        Ok(())
    }

    fn recycle(&mut self) {
        self.animation = None;
        self.current = 0.0;
        self.state = AnimState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_animations_are_rejected() {
        assert_eq!(
            Animation::new("walk", 0, 3, 1.0, false),
            Err(AnimationError::InvalidFrames { first: 0, last: 3 })
        );
        assert_eq!(
            Animation::new("walk", 3, 2, 1.0, false),
            Err(AnimationError::InvalidFrames { first: 3, last: 2 })
        );
        assert!(matches!(
            Animation::new("walk", 1, 2, -1.0, false),
            Err(AnimationError::InvalidSpeed(_))
        ));
    }

    #[test]
    fn one_shot_animation_finishes_on_last_frame() {
        let mut animatable = AnimatableModel::new();
        animatable.play(Animation::new("attack", 1, 3, 1.0, false).unwrap());
        assert_eq!(animatable.frame(), 1);

        animatable.update(1.0).unwrap();
        animatable.update(1.0).unwrap();
        assert_eq!(animatable.frame(), 3);
        assert_eq!(animatable.anim_state(), AnimState::Playing);

        animatable.update(1.0).unwrap();
        assert!(animatable.is_finished());
        assert_eq!(animatable.frame(), 3);
    }

    #[test]
    fn repeating_animation_wraps_around() {
        let mut animatable = AnimatableModel::new();
        animatable.play(Animation::new("idle", 1, 2, 1.0, true).unwrap());

        animatable.update(1.0).unwrap();
        animatable.update(1.0).unwrap();
        assert_eq!(animatable.frame(), 1);
        assert_eq!(animatable.anim_state(), AnimState::Playing);
    }

    #[test]
    fn stopped_animation_does_not_advance() {
        let mut animatable = AnimatableModel::new();
        animatable.play(Animation::new("walk", 1, 4, 1.0, false).unwrap());
        animatable.stop();
        animatable.update(2.0).unwrap();
        assert_eq!(animatable.frame(), 1);
    }
}
