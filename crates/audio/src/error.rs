//! Argument-validation errors returned by registration and allocation calls.

use crate::sounds::{EffectId, SongId};
use thiserror::Error;

/// Programmer errors surfaced at the call site.
///
/// Runtime conditions (a sound finished, a handle was disposed, a clip is
/// missing from the bank) are never reported through this type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AudioError {
    /// Machine sound index outside `0..=10`.
    #[error("machine sound index {0} is outside 0..=10")]
    InvalidMachineSound(i32),
    /// Machine slot number outside `0..=10`.
    #[error("machine slot {0} is outside 0..=10")]
    InvalidMachineSlot(usize),
    /// Requested a machine sound that was never registered.
    #[error("machine sound {0} is not registered")]
    UnregisteredMachineSound(usize),
    /// Registered the same machine sound twice.
    #[error("machine sound {0} is already registered")]
    DuplicateMachineSound(usize),
    /// Batch registration with differently sized inputs.
    #[error("got {indices} machine sound indices but {clips} clip sets")]
    MismatchedLengths {
        /// Number of indices supplied.
        indices: usize,
        /// Number of clip sets supplied.
        clips: usize,
    },
    /// A PCM buffer was empty.
    #[error("{0} buffer is empty")]
    EmptyBuffer(&'static str),
    /// A PCM buffer does not hold whole 16-bit frames.
    #[error("{part} buffer of {len} bytes is not a whole number of {channels}-channel 16-bit frames")]
    MisalignedBuffer {
        /// Which buffer (intro, loop, outro).
        part: &'static str,
        /// Buffer length in bytes.
        len: usize,
        /// Channel count of the declared format.
        channels: u16,
    },
    /// Song registered with zero or more than three clips.
    #[error("song {song:?} needs 1 to 3 clips, got {count}")]
    InvalidSongClips {
        /// Song being registered.
        song: SongId,
        /// Number of clips supplied.
        count: usize,
    },
    /// Registered the same song twice.
    #[error("song {0:?} is already registered")]
    DuplicateSong(SongId),
    /// Registered the same effect twice.
    #[error("effect {0:?} is already registered")]
    DuplicateEffect(EffectId),
    /// Voice clip index outside the bank.
    #[error("voice clip index {0} is outside 0..=12")]
    InvalidVoiceIndex(usize),
    /// Registered the same voice clip twice.
    #[error("voice clip {0} is already registered")]
    DuplicateVoice(usize),
}
