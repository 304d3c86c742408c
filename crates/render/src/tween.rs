use glam::Vec2;
use std::collections::BTreeMap;
use std::time::Duration;
use worldmap_common::Ease;

use crate::stage::{Stage, VisualId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TweenId(u64);

/// Property a tween drives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TweenProp {
    Position { from: Vec2, to: Vec2 },
    Alpha { from: f32, to: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropKind {
    Position,
    Alpha,
}

impl TweenProp {
    pub fn kind(&self) -> PropKind {
        match self {
            Self::Position { .. } => PropKind::Position,
            Self::Alpha { .. } => PropKind::Alpha,
        }
    }

    fn apply<A: Clone>(&self, stage: &mut Stage<A>, target: VisualId, t: f32) -> bool {
        match *self {
            Self::Position { from, to } => stage.update(target, |v| v.position = from.lerp(to, t)),
            Self::Alpha { from, to } => stage.update(target, |v| v.alpha = from + (to - from) * t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Once,
    Times(u32),
    Forever,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TweenSpec {
    pub prop: TweenProp,
    pub duration: Duration,
    pub ease: Ease,
    /// Play backwards after each forward pass.
    pub yoyo: bool,
    pub repeat: Repeat,
}

impl TweenSpec {
    pub fn new(prop: TweenProp, duration: Duration, ease: Ease) -> Self {
        Self {
            prop,
            duration,
            ease,
            yoyo: false,
            repeat: Repeat::Once,
        }
    }

    pub fn yoyo(mut self) -> Self {
        self.yoyo = true;
        self
    }

    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }
}

#[derive(Debug)]
struct Tween {
    target: VisualId,
    spec: TweenSpec,
    elapsed: Duration,
    reversing: bool,
    cycles: u32,
}

impl Tween {
    fn progress(&self) -> f32 {
        if self.spec.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f32() / self.spec.duration.as_secs_f32()).min(1.0)
    }

    fn more_cycles(&self) -> bool {
        match self.spec.repeat {
            Repeat::Once => false,
            Repeat::Times(n) => self.cycles <= n,
            Repeat::Forever => true,
        }
    }
}

/// Time-driven property animations over stage visuals.
#[derive(Debug, Default)]
pub struct Tweens {
    active: BTreeMap<TweenId, Tween>,
    next: u64,
}

impl Tweens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, target: VisualId, spec: TweenSpec) -> TweenId {
        self.next += 1;
        let id = TweenId(self.next);
        self.active.insert(
            id,
            Tween {
                target,
                spec,
                elapsed: Duration::ZERO,
                reversing: false,
                cycles: 0,
            },
        );
        id
    }

    pub fn kill(&mut self, id: TweenId) -> bool {
        self.active.remove(&id).is_some()
    }

    /// Stop every tween on `target`, leaving the property where it is.
    pub fn kill_tweens_of(&mut self, target: VisualId) -> usize {
        let before = self.active.len();
        self.active.retain(|_, t| t.target != target);
        before - self.active.len()
    }

    pub fn kill_prop_of(&mut self, target: VisualId, kind: PropKind) -> usize {
        let before = self.active.len();
        self.active
            .retain(|_, t| !(t.target == target && t.spec.prop.kind() == kind));
        before - self.active.len()
    }

    pub fn is_running(&self, id: TweenId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn is_tweening(&self, target: VisualId) -> bool {
        self.active.values().any(|t| t.target == target)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Advance every tween by `dt` and write the eased values to the stage.
    /// Returns the tweens that completed during this step.
    pub fn advance<A: Clone>(&mut self, dt: Duration, stage: &mut Stage<A>) -> Vec<TweenId> {
        let mut finished = Vec::new();
        for (id, tween) in self.active.iter_mut() {
            tween.elapsed += dt;
            let mut t = tween.progress();
            let done_pass = t >= 1.0;
            if tween.reversing {
                t = 1.0 - t;
            }
            let eased = tween.spec.ease.apply(t);
            if !tween.spec.prop.apply(stage, tween.target, eased) {
                finished.push(*id);
                continue;
            }
            if !done_pass {
                continue;
            }
            tween.elapsed = tween
                .elapsed
                .saturating_sub(tween.spec.duration)
                .min(tween.spec.duration);
            if tween.spec.yoyo && !tween.reversing {
                tween.reversing = true;
                continue;
            }
            tween.reversing = false;
            tween.cycles += 1;
            if !tween.more_cycles() {
                finished.push(*id);
            }
        }
        for id in &finished {
            self.active.remove(id);
        }
        finished
    }
}
