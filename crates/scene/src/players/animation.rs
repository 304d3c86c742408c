use glam::Vec2;
use std::fmt;
use std::time::Duration;

/// Walk cycles play at this many frames per second and loop.
pub const FRAME_RATE: f32 = 8.0;
/// Frame shown while standing still, the same for every direction.
pub const IDLE_FRAME: u32 = 4;

const LOW_FRAMES: [u32; 4] = [0, 1, 2, 3];
const HIGH_FRAMES: [u32; 4] = [5, 6, 7, 8];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Up,
    #[default]
    Down,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MotionState {
    #[default]
    Idle,
    Moving(Direction),
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Moving(dir) => write!(f, "moving-{}", dir.as_str()),
        }
    }
}

/// Classify the remaining render-space distance to a player's target.
///
/// Below `threshold` (Euclidean) the player is idle; otherwise the axis with
/// the larger absolute delta picks the direction.
pub fn infer_motion(delta: Vec2, threshold: f32) -> MotionState {
    if delta.length() <= threshold {
        return MotionState::Idle;
    }
    let dir = if delta.x.abs() > delta.y.abs() {
        if delta.x < 0.0 { Direction::Left } else { Direction::Right }
    } else if delta.y < 0.0 {
        Direction::Up
    } else {
        Direction::Down
    };
    MotionState::Moving(dir)
}

/// One looping walk cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clip {
    pub texture: &'static str,
    pub frames: [u32; 4],
}

/// Which sheets a player animates from; vehicles bring their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AnimationSet {
    #[default]
    Default,
    Bike,
    Motorcycle,
    Car,
}

impl AnimationSet {
    pub fn from_vehicle(name: &str) -> Option<Self> {
        match name {
            "Bike" => Some(Self::Bike),
            "Motorcycle" => Some(Self::Motorcycle),
            "Car" => Some(Self::Car),
            _ => None,
        }
    }

    /// Texture shown when the set is first applied.
    pub fn base_texture(self) -> &'static str {
        match self {
            Self::Default => "p1",
            Self::Bike => "Bike",
            Self::Motorcycle => "Motorcycle",
            Self::Car => "Car",
        }
    }

    pub fn clip(self, dir: Direction) -> Clip {
        match self {
            Self::Default => match dir {
                Direction::Left => Clip { texture: "p1", frames: LOW_FRAMES },
                Direction::Right => Clip { texture: "p1", frames: HIGH_FRAMES },
                Direction::Up => Clip { texture: "p2", frames: HIGH_FRAMES },
                Direction::Down => Clip { texture: "p2", frames: LOW_FRAMES },
            },
            vehicle => {
                let frames = match dir {
                    Direction::Left | Direction::Down => LOW_FRAMES,
                    Direction::Right | Direction::Up => HIGH_FRAMES,
                };
                Clip { texture: vehicle.base_texture(), frames }
            }
        }
    }
}

/// Per-player sprite animation state.
#[derive(Debug, Clone)]
pub struct Animator {
    set: AnimationSet,
    facing: Direction,
    playing: bool,
    elapsed: Duration,
    texture: &'static str,
}

impl Default for Animator {
    fn default() -> Self {
        Self::new(AnimationSet::Default)
    }
}

impl Animator {
    pub fn new(set: AnimationSet) -> Self {
        Self {
            set,
            facing: Direction::default(),
            playing: false,
            elapsed: Duration::ZERO,
            texture: set.base_texture(),
        }
    }

    /// Play the walk cycle for `dir`. Continuing the same cycle keeps its phase.
    pub fn play(&mut self, dir: Direction) {
        if self.playing && self.facing == dir {
            return;
        }
        self.facing = dir;
        self.playing = true;
        self.elapsed = Duration::ZERO;
        self.texture = self.set.clip(dir).texture;
    }

    /// Stop and hold the idle frame on the current texture.
    pub fn stop(&mut self) {
        self.playing = false;
        self.elapsed = Duration::ZERO;
    }

    pub fn apply(&mut self, state: MotionState) {
        match state {
            MotionState::Moving(dir) => self.play(dir),
            MotionState::Idle => self.stop(),
        }
    }

    /// Switch sheets, e.g. after mounting a vehicle. A running cycle continues
    /// on the new sheet.
    pub fn set_animation_set(&mut self, set: AnimationSet) {
        if self.set == set {
            return;
        }
        self.set = set;
        self.texture = if self.playing {
            set.clip(self.facing).texture
        } else {
            set.base_texture()
        };
    }

    pub fn advance(&mut self, dt: Duration) {
        if self.playing {
            self.elapsed += dt;
        }
    }

    /// Texture and frame to display right now.
    pub fn current(&self) -> (&'static str, u32) {
        if !self.playing {
            return (self.texture, IDLE_FRAME);
        }
        let clip = self.set.clip(self.facing);
        let step = (self.elapsed.as_secs_f32() * FRAME_RATE) as usize;
        (clip.texture, clip.frames[step % clip.frames.len()])
    }

    pub fn state(&self) -> MotionState {
        if self.playing {
            MotionState::Moving(self.facing)
        } else {
            MotionState::Idle
        }
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn animation_set(&self) -> AnimationSet {
        self.set
    }
}
