//! Linear music crossfades, one step per update tick.
//!
//! Levels are tracked un-ducked; the audible volume of each side is its level
//! times the current duck factor. While muted or held (focus lost, game
//! paused, custom music playing) nothing ramps.

use crate::sounds::TrackPart;
use crate::track::TrackSet;
use tracing::debug;

/// Fraction of the target volume moved per tick (about 100 ticks per fade).
pub const FADE_STEP: f32 = 0.01;

/// Mix inputs for one [`CrossfadeController::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeContext {
    /// Un-ducked target music volume.
    pub max: f32,
    /// Duck multiplier (1.0 or [`DUCK_FACTOR`](crate::mix::DUCK_FACTOR)).
    pub duck_factor: f32,
    /// Whether audio is muted.
    pub muted: bool,
    /// Whether BGM is paused by suspension or custom music.
    pub held: bool,
}

/// Result of one advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    /// No fade in progress.
    Idle,
    /// A fade exists but did not move this tick.
    Held,
    /// Levels moved one step.
    Ramping,
    /// The fade finished this tick; the controller is idle again.
    Completed,
}

#[derive(Debug)]
enum FadePhase {
    Idle,
    /// Incoming track ramping up with nothing fading out; left behind when a
    /// mute interrupts a crossfade.
    FadingIn { level: f32 },
    Crossfading {
        outgoing: Box<TrackSet>,
        from_part: TrackPart,
        from_level: f32,
        to_level: f32,
    },
}

/// Read-only view of the outgoing side.
#[derive(Debug, Clone, Copy)]
pub struct OutgoingView<'a> {
    /// Track fading out.
    pub track: &'a TrackSet,
    /// Part of it that is audible.
    pub part: TrackPart,
    /// Un-ducked outgoing level.
    pub level: f32,
}

/// Owns the outgoing track during a transition and ramps both sides.
#[derive(Debug)]
pub struct CrossfadeController {
    phase: FadePhase,
}

impl CrossfadeController {
    /// Idle controller.
    pub fn new() -> Self {
        Self {
            phase: FadePhase::Idle,
        }
    }

    /// Whether no fade is in progress.
    pub fn is_idle(&self) -> bool {
        matches!(self.phase, FadePhase::Idle)
    }

    /// Whether an outgoing track is fading out.
    pub fn is_crossfading(&self) -> bool {
        matches!(self.phase, FadePhase::Crossfading { .. })
    }

    /// Short phase name for traces.
    pub fn phase_name(&self) -> &'static str {
        match self.phase {
            FadePhase::Idle => "idle",
            FadePhase::FadingIn { .. } => "fading-in",
            FadePhase::Crossfading { .. } => "crossfading",
        }
    }

    /// Un-ducked level of the incoming side, when a fade is in progress.
    pub fn incoming_level(&self) -> Option<f32> {
        match self.phase {
            FadePhase::Idle => None,
            FadePhase::FadingIn { level } => Some(level),
            FadePhase::Crossfading { to_level, .. } => Some(to_level),
        }
    }

    /// The outgoing side, when crossfading.
    pub fn outgoing(&self) -> Option<OutgoingView<'_>> {
        match &self.phase {
            FadePhase::Crossfading {
                outgoing,
                from_part,
                from_level,
                ..
            } => Some(OutgoingView {
                track: outgoing,
                part: *from_part,
                level: *from_level,
            }),
            _ => None,
        }
    }

    /// Start fading `outgoing` out from `from_level` while the current track
    /// ramps in from 0. Any previous fade is cancelled first.
    pub fn begin(&mut self, outgoing: TrackSet, from_part: TrackPart, from_level: f32) {
        self.cancel();
        debug!(
            song = ?outgoing.song(),
            part = ?from_part,
            from_level,
            "Crossfade started"
        );
        self.phase = FadePhase::Crossfading {
            outgoing: Box::new(outgoing),
            from_part,
            from_level,
            to_level: 0.0,
        };
    }

    /// Drop any fade, disposing the outgoing track.
    pub fn cancel(&mut self) {
        if let FadePhase::Crossfading { mut outgoing, .. } =
            std::mem::replace(&mut self.phase, FadePhase::Idle)
        {
            outgoing.dispose();
        }
    }

    /// Stop the outgoing side for good and remember where the incoming side
    /// was, so the ramp continues from there after unmuting.
    pub fn interrupt_for_mute(&mut self) {
        if let FadePhase::Crossfading {
            mut outgoing,
            to_level,
            ..
        } = std::mem::replace(&mut self.phase, FadePhase::Idle)
        {
            outgoing.dispose();
            debug!(to_level, "Crossfade interrupted by mute");
            self.phase = FadePhase::FadingIn { level: to_level };
        }
    }

    /// Pause the outgoing track.
    pub fn pause(&mut self) {
        if let FadePhase::Crossfading { outgoing, .. } = &mut self.phase {
            outgoing.pause();
        }
    }

    /// Resume the outgoing track.
    pub fn resume(&mut self) {
        if let FadePhase::Crossfading { outgoing, .. } = &mut self.phase {
            outgoing.resume();
        }
    }

    /// Re-apply both sides at their current levels under a new duck factor.
    pub fn apply_duck(&mut self, incoming: &mut TrackSet, duck_factor: f32) {
        match &mut self.phase {
            FadePhase::Idle => {}
            FadePhase::FadingIn { level } => incoming.set_bgm_volume(*level * duck_factor),
            FadePhase::Crossfading {
                outgoing,
                from_part,
                from_level,
                to_level,
            } => {
                incoming.set_bgm_volume(*to_level * duck_factor);
                if let Some(handle) = outgoing.part_mut(*from_part) {
                    handle.set_volume(*from_level * duck_factor);
                }
            }
        }
    }

    /// Move the fade one tick forward, applying volumes to both sides.
    pub fn advance(&mut self, incoming: &mut TrackSet, ctx: FadeContext) -> FadeOutcome {
        if self.is_idle() {
            return FadeOutcome::Idle;
        }
        if ctx.held {
            return FadeOutcome::Held;
        }
        if ctx.muted {
            self.interrupt_for_mute();
            incoming.set_bgm_volume(0.0);
            return FadeOutcome::Held;
        }

        let step = FADE_STEP * ctx.max;
        match std::mem::replace(&mut self.phase, FadePhase::Idle) {
            FadePhase::Idle => FadeOutcome::Idle,
            FadePhase::FadingIn { level } => {
                if step <= 0.0 || level + step > ctx.max {
                    incoming.set_bgm_volume(ctx.max * ctx.duck_factor);
                    return FadeOutcome::Completed;
                }
                let level = level + step;
                incoming.set_bgm_volume(level * ctx.duck_factor);
                self.phase = FadePhase::FadingIn { level };
                FadeOutcome::Ramping
            }
            FadePhase::Crossfading {
                mut outgoing,
                mut from_part,
                from_level,
                to_level,
            } => {
                if from_part == TrackPart::Intro && outgoing.intro_finished() {
                    outgoing.start_loop(from_level * ctx.duck_factor);
                    from_part = TrackPart::Loop;
                }

                if step <= 0.0 || to_level + step > ctx.max || from_level - step < 0.0 {
                    outgoing.dispose();
                    incoming.set_bgm_volume(ctx.max * ctx.duck_factor);
                    debug!(song = ?incoming.song(), "Crossfade complete");
                    return FadeOutcome::Completed;
                }

                let to_level = to_level + step;
                let from_level = from_level - step;
                incoming.set_bgm_volume(to_level * ctx.duck_factor);
                if let Some(handle) = outgoing.part_mut(from_part) {
                    handle.set_volume(from_level * ctx.duck_factor);
                }
                self.phase = FadePhase::Crossfading {
                    outgoing,
                    from_part,
                    from_level,
                    to_level,
                };
                FadeOutcome::Ramping
            }
        }
    }
}

impl Default for CrossfadeController {
    fn default() -> Self {
        Self::new()
    }
}
