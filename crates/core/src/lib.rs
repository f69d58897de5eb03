#![warn(missing_docs)]
//! Core primitives shared across the workspace.

use serde::{Deserialize, Serialize};

/// Frame counter driven by the host game loop (one tick per rendered frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameTick(pub u64);

impl FrameTick {
    /// First tick of any run.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }
}

/// Coarse game state as seen by subsystems that fan out pause/resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameState {
    /// Gameplay or menus are running normally.
    #[default]
    Running,
    /// Any paused sub-state (pause menu, confirmation dialogs, etc.).
    Paused,
}

impl GameState {
    /// Whether this state counts as paused.
    pub fn is_paused(self) -> bool {
        matches!(self, GameState::Paused)
    }
}

/// Everything the host loop reports to per-frame subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInput {
    /// Tick of the frame being processed.
    pub tick: FrameTick,
    /// Whether the game window currently has focus.
    pub window_focused: bool,
    /// Running/paused signal.
    pub game_state: GameState,
    /// Index of the level currently loaded.
    pub level: u32,
    /// Edge-triggered: the mute key went down this frame.
    pub mute_toggle_pressed: bool,
}

impl FrameInput {
    /// A focused, running frame on level 0.
    pub fn new(tick: FrameTick) -> Self {
        Self {
            tick,
            window_focused: true,
            game_state: GameState::Running,
            level: 0,
            mute_toggle_pressed: false,
        }
    }

    /// The same inputs one tick later, with edge-triggered fields cleared.
    pub fn next(self) -> Self {
        Self {
            tick: self.tick.advance(1),
            mute_toggle_pressed: false,
            ..self
        }
    }

    /// Whether audio should be held (window unfocused or game paused).
    pub fn is_suspended(&self) -> bool {
        !self.window_focused || self.game_state.is_paused()
    }
}
