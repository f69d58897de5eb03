//! Platform seams: playable sounds and streaming outputs.
//!
//! The engine only talks to these traits. Two implementations ship:
//!
//! - [`headless`] - deterministic, tick-driven playback with no device;
//!   used by tests and the headless runner.
//! - [`rodio_output`] - real output through rodio (feature `rodio_backend`).

pub mod headless;
#[cfg(feature = "rodio_backend")]
pub mod rodio_output;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Platform playback state of a sound or stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Producing output (possibly at volume 0).
    Playing,
    /// Held; `resume` continues from the same position.
    Paused,
    /// Finished or stopped; `play` restarts from the beginning.
    Stopped,
}

/// One playable instance of a preloaded sound.
pub trait SoundInstance: Send {
    /// Start from the beginning when stopped, continue when paused.
    fn play(&mut self);
    /// Pause if playing.
    fn pause(&mut self);
    /// Continue if paused.
    fn resume(&mut self);
    /// Stop and rewind.
    fn stop(&mut self);
    /// Set output volume (0.0 to 1.0).
    fn set_volume(&mut self, volume: f32);
    /// Whether playback wraps around at the end.
    fn set_looped(&mut self, looped: bool);
    /// Current platform state.
    fn state(&self) -> PlaybackState;
}

/// Preloaded, read-only sound data shared by every instance made from it.
pub trait SoundResource: Send + Sync {
    /// Asset name, for logs and probes.
    fn name(&self) -> &str;
    /// Create a fresh, stopped instance.
    fn instantiate(&self) -> Result<Box<dyn SoundInstance>>;
}

/// Channel layout of raw PCM handed to a streaming output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLayout {
    /// One channel
    Mono,
    /// Two interleaved channels
    Stereo,
}

impl ChannelLayout {
    /// Number of interleaved channels.
    pub fn count(self) -> u16 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

/// Format of signed 16-bit little-endian PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PcmFormat {
    /// Samples per second per channel.
    pub sample_rate: u32,
    /// Channel layout.
    pub channels: ChannelLayout,
}

impl PcmFormat {
    /// Create a format descriptor.
    pub fn new(sample_rate: u32, channels: ChannelLayout) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Bytes per interleaved frame.
    pub fn frame_bytes(&self) -> usize {
        2 * self.channels.count() as usize
    }
}

/// A streaming output fed with whole PCM buffers.
///
/// # Threading
///
/// Devices usually learn about starvation on their own callback thread.
/// Implementations must only *record* it there (an atomic flag or similar)
/// and report it through [`StreamingOutput::take_buffer_needed`], which is
/// called from the update thread. Buffer resubmission therefore always
/// happens on the update thread.
pub trait StreamingOutput: Send {
    /// Queue a buffer behind any pending ones. A looping buffer repeats until
    /// the output is stopped.
    fn submit_buffer(&mut self, data: Arc<[u8]>, looping: bool);
    /// Start (or restart) consuming queued buffers.
    fn play(&mut self);
    /// Pause if playing.
    fn pause(&mut self);
    /// Continue if paused.
    fn resume(&mut self);
    /// Halt output and discard every pending buffer.
    fn stop(&mut self);
    /// Set output volume (0.0 to 1.0).
    fn set_volume(&mut self, volume: f32);
    /// Buffers queued or currently playing.
    fn pending_buffer_count(&self) -> usize;
    /// Consume the "buffer needed" notification: true once after the queue
    /// drained while the output was playing.
    fn take_buffer_needed(&mut self) -> bool;
    /// Current platform state. Stays `Playing` while starved.
    fn state(&self) -> PlaybackState;
}

/// Opens streaming outputs for machine sounds.
pub trait StreamingDevice {
    /// Construct an output for the given format.
    fn open(&self, format: PcmFormat) -> Result<Box<dyn StreamingOutput>>;
}
