#![warn(missing_docs)]
//! Audio engine for clockwork.
//!
//! Crossfading background music, one-shot effects, ducking voice-over,
//! streamed machine noises and the player's own music library, all driven
//! once per frame by the host loop.
//!
//! # Architecture
//!
//! - [`AudioEngine`] - Main interface: play requests and the per-frame update
//! - [`SoundBank`] - Preloaded effects, songs and voice clips
//! - [`MixSettings`] - Persisted volume and mute preferences
//! - [`backend`] - Platform seams, with a headless and a rodio implementation
//!
//! # Example
//!
//! ```ignore
//! let backend = HeadlessBackend::new();
//! let mut bank = SoundBank::new();
//! bank.register_song(SongId::Title, vec![backend.resource("title-loop", 600)])?;
//! let mut audio = AudioEngine::new(bank, Box::new(backend.clone()), MixSettings::default());
//! audio.play_track(SongId::Title);
//! audio.update(&FrameInput::new(FrameTick::ZERO));
//! ```

pub mod backend;
mod bank;
mod crossfade;
mod custom_music;
mod engine;
mod error;
mod handle;
mod machines;
mod mix;
mod settings;
mod sounds;
mod streaming;
mod track;

pub use backend::headless::HeadlessBackend;
pub use backend::{
    ChannelLayout, PcmFormat, PlaybackState, SoundInstance, SoundResource, StreamingDevice,
    StreamingOutput,
};
pub use bank::SoundBank;
pub use crossfade::{CrossfadeController, FadeContext, FadeOutcome, OutgoingView, FADE_STEP};
pub use custom_music::{
    CustomMusic, MediaLibrary, SkipDirection, TransportError, TransportPolicy,
};
pub use engine::{AudioEngine, CrossfadeSnapshot, EngineSnapshot};
pub use error::AudioError;
pub use handle::SoundHandle;
pub use machines::{MachineBank, MachineVoiceId, NO_MACHINE_SOUND};
pub use mix::{DuckReason, Ducking, MixState, SuspendEdge, DUCK_FACTOR};
pub use settings::MixSettings;
pub use sounds::{
    EffectId, SongId, TrackPart, UnknownSoundName, MACHINE_SLOT_COUNT, MACHINE_SOUND_COUNT,
    MAX_PLAYABLE_VOICE, NON_DUCKING_VOICE, VOICE_BANK_SIZE,
};
pub use streaming::{MachineClips, StreamingVoice, VoicePhase};
pub use track::TrackSet;
