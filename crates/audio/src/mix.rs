//! Ducking and suspension bookkeeping consulted every tick.
//!
//! Mute lives in [`MixSettings`](crate::MixSettings) because it is a persisted
//! preference; everything here is transient.

use clockwork_core::FrameInput;
use serde::Serialize;

/// Music volume multiplier while ducked.
pub const DUCK_FACTOR: f32 = 0.5;

/// Why the music is ducked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuckReason {
    /// A voice-acting clip is playing.
    VoiceOver,
    /// The win jingle is playing.
    Jingle,
}

/// Active duck reasons. The music is ducked while any reason holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ducking {
    voice_over: bool,
    jingle: bool,
}

impl Ducking {
    /// Whether any reason holds.
    pub fn is_active(&self) -> bool {
        self.voice_over || self.jingle
    }

    /// Multiplier for music volume.
    pub fn factor(&self) -> f32 {
        if self.is_active() {
            DUCK_FACTOR
        } else {
            1.0
        }
    }

    fn set(&mut self, reason: DuckReason, on: bool) {
        match reason {
            DuckReason::VoiceOver => self.voice_over = on,
            DuckReason::Jingle => self.jingle = on,
        }
    }
}

/// Transition reported when focus or pause state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendEdge {
    /// Nothing changed.
    Unchanged,
    /// Focus was lost or the game paused: pause everything.
    Suspended,
    /// Focus and running state are back: resume everything.
    Resumed,
}

/// Transient mix state.
#[derive(Debug, Clone, Default)]
pub struct MixState {
    ducking: Ducking,
    suspended: bool,
    level: Option<u32>,
}

impl MixState {
    /// Fresh state: not ducked, not suspended, no level seen yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current duck reasons.
    pub fn ducking(&self) -> Ducking {
        self.ducking
    }

    /// Add a duck reason. Returns true if the music was not ducked before.
    pub fn duck(&mut self, reason: DuckReason) -> bool {
        let was_active = self.ducking.is_active();
        self.ducking.set(reason, true);
        !was_active
    }

    /// Drop a duck reason. Returns true if the music is no longer ducked.
    pub fn release(&mut self, reason: DuckReason) -> bool {
        let was_active = self.ducking.is_active();
        self.ducking.set(reason, false);
        was_active && !self.ducking.is_active()
    }

    /// Whether sounds are currently held by focus loss or pause.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Record this frame's focus/pause state and report the edge.
    pub fn observe_suspension(&mut self, frame: &FrameInput) -> SuspendEdge {
        let suspended = frame.is_suspended();
        let edge = match (self.suspended, suspended) {
            (false, true) => SuspendEdge::Suspended,
            (true, false) => SuspendEdge::Resumed,
            _ => SuspendEdge::Unchanged,
        };
        self.suspended = suspended;
        edge
    }

    /// Record this frame's level. True when it differs from a previously
    /// seen level (the first observation is never a change).
    pub fn observe_level(&mut self, level: u32) -> bool {
        let changed = self.level.is_some_and(|prev| prev != level);
        self.level = Some(level);
        changed
    }
}
