//! Sound effect, music and voice clip definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of slots in the voice-acting bank.
pub const VOICE_BANK_SIZE: usize = 13;

/// Highest voice index `play_voice_acting` will start.
///
/// The bank holds [`VOICE_BANK_SIZE`] clips but requests above this index
/// return early; see DESIGN.md before changing it.
pub const MAX_PLAYABLE_VOICE: usize = 10;

/// Voice clip that plays without ducking the music ("Handle With Care").
pub const NON_DUCKING_VOICE: usize = 12;

/// Number of registrable machine sounds (indices `0..=10`).
pub const MACHINE_SOUND_COUNT: usize = 11;

/// Number of exclusive machine slots (slot numbers `1..=10`).
pub const MACHINE_SLOT_COUNT: usize = 10;

/// Identifiers for one-shot sound effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectId {
    // UI sounds
    /// Menu cursor moved
    MenuMove,
    /// Menu item selected
    MenuSelect,
    /// Menu closed or backed out
    MenuBack,
    /// Achievement unlocked toast
    Achievement,

    // Gameplay sounds
    /// Part picked up
    Pickup,
    /// Part dropped
    Drop,
    /// Part bounced off a surface
    Bounce,
    /// Part shattered
    Shatter,
    /// Explosion
    Explosion,
    /// Countdown beep before a run starts
    Countdown,
    /// Alarm siren; only one may play at a time
    Siren,

    // Outcome jingles
    /// Level completed; ducks the music while it plays
    Win,
    /// Level failed
    Lose,
}

impl EffectId {
    /// Every effect identifier.
    pub const ALL: [EffectId; 13] = [
        EffectId::MenuMove,
        EffectId::MenuSelect,
        EffectId::MenuBack,
        EffectId::Achievement,
        EffectId::Pickup,
        EffectId::Drop,
        EffectId::Bounce,
        EffectId::Shatter,
        EffectId::Explosion,
        EffectId::Countdown,
        EffectId::Siren,
        EffectId::Win,
        EffectId::Lose,
    ];

    /// Stable name used by cue scripts and traces.
    pub fn name(self) -> &'static str {
        match self {
            EffectId::MenuMove => "menu-move",
            EffectId::MenuSelect => "menu-select",
            EffectId::MenuBack => "menu-back",
            EffectId::Achievement => "achievement",
            EffectId::Pickup => "pickup",
            EffectId::Drop => "drop",
            EffectId::Bounce => "bounce",
            EffectId::Shatter => "shatter",
            EffectId::Explosion => "explosion",
            EffectId::Countdown => "countdown",
            EffectId::Siren => "siren",
            EffectId::Win => "win",
            EffectId::Lose => "lose",
        }
    }

    /// Whether a new instance replaces the previous one instead of overlapping.
    pub fn is_exclusive(self) -> bool {
        matches!(self, EffectId::Siren)
    }

    /// Whether the music ducks while this effect plays.
    pub fn ducks_music(self) -> bool {
        matches!(self, EffectId::Win)
    }
}

/// Background music songs.
///
/// Each song is registered with one, two or three clips; see
/// [`TrackPart`] for the meaning of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SongId {
    /// Title screen
    Title,
    /// Level select map
    Map,
    /// Early workshop levels
    Workshop,
    /// Factory levels
    Factory,
    /// Foundry levels
    Foundry,
    /// Final level
    Finale,
    /// End credits
    Credits,
}

impl SongId {
    /// Every song identifier.
    pub const ALL: [SongId; 7] = [
        SongId::Title,
        SongId::Map,
        SongId::Workshop,
        SongId::Factory,
        SongId::Foundry,
        SongId::Finale,
        SongId::Credits,
    ];

    /// Stable name used by cue scripts and traces.
    pub fn name(self) -> &'static str {
        match self {
            SongId::Title => "title",
            SongId::Map => "map",
            SongId::Workshop => "workshop",
            SongId::Factory => "factory",
            SongId::Foundry => "foundry",
            SongId::Finale => "finale",
            SongId::Credits => "credits",
        }
    }
}

/// Role of one clip inside a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackPart {
    /// Plays once before the loop
    Intro,
    /// Repeats until the song is replaced or finished
    Loop,
    /// Plays once when the song is finished
    Outro,
}

/// Error returned when a cue name does not match any identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSoundName(pub String);

impl fmt::Display for UnknownSoundName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sound name '{}'", self.0)
    }
}

impl std::error::Error for UnknownSoundName {}

impl FromStr for EffectId {
    type Err = UnknownSoundName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EffectId::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSoundName(s.to_string()))
    }
}

impl FromStr for SongId {
    type Err = UnknownSoundName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SongId::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSoundName(s.to_string()))
    }
}
