//! Walk/idle clip gating.
//!
//! Pressing a movement key switches to walking immediately. Releasing the
//! last movement key only arms a deadline; the switch back to idle happens
//! when `update` observes the deadline passed with no movement key held.
//! A movement key-down in between disarms it, so quick taps never toggle
//! the clips.

use std::time::Duration;

/// A sub-range of an imported animation, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimClip {
    pub name: String,
    pub start: f32,
    pub duration: f32,
}

impl AnimClip {
    pub fn new(name: impl Into<String>, start: f32, duration: f32) -> Self {
        Self {
            name: name.into(),
            start,
            duration,
        }
    }

    /// Clip covering `frames.0..frames.1` at `fps`.
    pub fn from_frames(name: impl Into<String>, frames: (u32, u32), fps: f32) -> Self {
        let start = frames.0 as f32 / fps;
        let end = frames.1 as f32 / fps;
        Self::new(name, start, (end - start).max(0.0))
    }
}

/// Playback state of one clip. Time only moves while unpaused.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipAction {
    clip: AnimClip,
    time: f32,
    paused: bool,
}

impl ClipAction {
    pub fn new(clip: AnimClip) -> Self {
        Self {
            clip,
            time: 0.0,
            paused: true,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        if self.paused {
            return;
        }
        self.time += dt;
        if self.clip.duration > 0.0 {
            self.time %= self.clip.duration;
        } else {
            self.time = 0.0;
        }
    }

    pub fn clip(&self) -> &AnimClip {
        &self.clip
    }

    /// Local time within the clip.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Time in the source animation to sample.
    pub fn sample_time(&self) -> f32 {
        self.clip.start + self.time
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gait {
    Idle,
    Walking,
}

pub struct AnimationGate {
    gait: Gait,
    pending_idle: Option<Duration>,
    debounce: Duration,
    walk: Option<ClipAction>,
    idle: Option<ClipAction>,
    active: bool,
}

impl AnimationGate {
    pub fn new(debounce: Duration) -> Self {
        Self {
            gait: Gait::Idle,
            pending_idle: None,
            debounce,
            walk: None,
            idle: None,
            active: false,
        }
    }

    /// Install the loaded clips and start gating. Until this is called every
    /// event is ignored.
    pub fn activate(&mut self, walk: Option<AnimClip>, idle: Option<AnimClip>, moving: bool) {
        if walk.is_none() || idle.is_none() {
            log::info!(
                "Character has {} walk clip and {} idle clip; playing a single clip",
                if walk.is_some() { "a" } else { "no" },
                if idle.is_some() { "an" } else { "no" },
            );
        }
        self.walk = walk.map(ClipAction::new);
        self.idle = idle.map(ClipAction::new);
        self.active = true;
        self.pending_idle = None;
        self.gait = if moving { Gait::Walking } else { Gait::Idle };
        self.apply_gait();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn gait(&self) -> Gait {
        self.gait
    }

    pub fn pending_idle(&self) -> Option<Duration> {
        self.pending_idle
    }

    pub fn walk(&self) -> Option<&ClipAction> {
        self.walk.as_ref()
    }

    pub fn idle(&self) -> Option<&ClipAction> {
        self.idle.as_ref()
    }

    /// Rising edge: a key that drives movement went down.
    pub fn key_down(&mut self, moves: bool) {
        if !self.active || !moves {
            return;
        }
        self.pending_idle = None;
        self.set_gait(Gait::Walking);
    }

    /// Falling edge: a key went up. `still_moving` tells whether any held key
    /// still drives movement.
    pub fn key_up(&mut self, still_moving: bool, now: Duration) {
        if !self.active || still_moving || self.gait == Gait::Idle {
            return;
        }
        self.pending_idle = Some(now + self.debounce);
    }

    /// Fire the pending idle transition once its deadline has passed.
    pub fn update(&mut self, now: Duration, moving: bool) {
        let Some(deadline) = self.pending_idle else {
            return;
        };
        if now < deadline {
            return;
        }
        self.pending_idle = None;
        if !moving {
            self.set_gait(Gait::Idle);
        }
    }

    /// Advance playback of whichever clips are unpaused.
    pub fn advance(&mut self, dt: f32) {
        for action in [self.walk.as_mut(), self.idle.as_mut()].into_iter().flatten() {
            action.advance(dt);
        }
    }

    fn set_gait(&mut self, gait: Gait) {
        if self.gait == gait {
            return;
        }
        log::debug!("Gait {:?} -> {:?}", self.gait, gait);
        self.gait = gait;
        self.apply_gait();
    }

    fn apply_gait(&mut self) {
        match (self.walk.as_mut(), self.idle.as_mut()) {
            (Some(walk), Some(idle)) => {
                walk.set_paused(self.gait != Gait::Walking);
                idle.set_paused(self.gait != Gait::Idle);
            }
            (Some(only), None) | (None, Some(only)) => only.set_paused(false),
            (None, None) => {}
        }
    }
}
