//! Machine noises streamed from raw PCM intro/loop/outro buffers.

use crate::backend::{PcmFormat, PlaybackState, StreamingOutput};
use crate::error::AudioError;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Raw PCM clips for one machine sound.
#[derive(Debug, Clone)]
pub struct MachineClips {
    format: PcmFormat,
    intro: Option<Arc<[u8]>>,
    looping: Arc<[u8]>,
    outro: Option<Arc<[u8]>>,
}

impl MachineClips {
    /// Validate and wrap 16-bit little-endian PCM buffers.
    pub fn new(
        format: PcmFormat,
        intro: Option<Vec<u8>>,
        looping: Vec<u8>,
        outro: Option<Vec<u8>>,
    ) -> Result<Self, AudioError> {
        let check = |part: &'static str, data: &[u8]| {
            if data.is_empty() {
                return Err(AudioError::EmptyBuffer(part));
            }
            if data.len() % format.frame_bytes() != 0 {
                return Err(AudioError::MisalignedBuffer {
                    part,
                    len: data.len(),
                    channels: format.channels.count(),
                });
            }
            Ok(())
        };
        if let Some(intro) = &intro {
            check("intro", intro)?;
        }
        check("loop", &looping)?;
        if let Some(outro) = &outro {
            check("outro", outro)?;
        }

        Ok(Self {
            format,
            intro: intro.map(Arc::from),
            looping: Arc::from(looping),
            outro: outro.map(Arc::from),
        })
    }

    /// PCM format of every buffer.
    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Whether an intro buffer was supplied.
    pub fn has_intro(&self) -> bool {
        self.intro.is_some()
    }

    /// Whether an outro buffer was supplied.
    pub fn has_outro(&self) -> bool {
        self.outro.is_some()
    }
}

/// Section a voice is streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VoicePhase {
    /// Intro buffer playing, loop queued behind it.
    Intro,
    /// Loop buffer playing.
    Loop,
    /// Outro buffer playing after a graceful stop.
    Outro,
}

/// A machine noise fed buffer by buffer into a streaming output.
///
/// Without an intro the loop is handed to the output as a looping buffer.
/// With an intro, the loop is queued once behind it and resubmitted each time
/// the output starves.
pub struct StreamingVoice {
    output: Option<Box<dyn StreamingOutput>>,
    clips: Arc<MachineClips>,
    phase: VoicePhase,
    stopped: bool,
    volume: f32,
}

impl StreamingVoice {
    /// Wrap an opened output. Nothing is submitted until [`play`](Self::play).
    pub fn new(output: Box<dyn StreamingOutput>, clips: Arc<MachineClips>) -> Self {
        let phase = Self::initial_phase(&clips);
        Self {
            output: Some(output),
            clips,
            phase,
            stopped: true,
            volume: 1.0,
        }
    }

    fn initial_phase(clips: &MachineClips) -> VoicePhase {
        if clips.has_intro() {
            VoicePhase::Intro
        } else {
            VoicePhase::Loop
        }
    }

    /// Section being streamed.
    pub fn phase(&self) -> VoicePhase {
        self.phase
    }

    /// Last volume set.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Submit intro (if any) and loop, then start streaming.
    pub fn play(&mut self) {
        let Some(output) = self.output.as_mut() else {
            return;
        };
        output.stop();
        self.phase = Self::initial_phase(&self.clips);
        match &self.clips.intro {
            Some(intro) => {
                output.submit_buffer(Arc::clone(intro), false);
                output.submit_buffer(Arc::clone(&self.clips.looping), false);
            }
            None => output.submit_buffer(Arc::clone(&self.clips.looping), true),
        }
        output.set_volume(self.volume);
        output.play();
        self.stopped = false;
    }

    /// Stop the voice.
    ///
    /// `immediate` halts output now. Otherwise the outro is played if there is
    /// one (a second graceful stop while it plays does nothing); without an
    /// outro a graceful stop is immediate.
    pub fn stop(&mut self, immediate: bool) {
        let Some(output) = self.output.as_mut() else {
            return;
        };
        if immediate {
            output.stop();
            self.stopped = true;
            return;
        }
        if self.stopped || self.phase == VoicePhase::Outro {
            return;
        }
        match &self.clips.outro {
            Some(outro) => {
                // A suspended voice queues its outro but stays paused.
                let was_paused = output.state() == PlaybackState::Paused;
                output.stop();
                output.submit_buffer(Arc::clone(outro), false);
                output.play();
                if was_paused {
                    output.pause();
                }
                self.phase = VoicePhase::Outro;
            }
            None => {
                output.stop();
                self.stopped = true;
            }
        }
    }

    /// Pause streaming.
    pub fn pause(&mut self) {
        if let Some(output) = self.output.as_mut() {
            output.pause();
        }
    }

    /// Resume streaming.
    pub fn resume(&mut self) {
        if let Some(output) = self.output.as_mut() {
            output.resume();
        }
    }

    /// Set the output volume.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(output) = self.output.as_mut() {
            output.set_volume(self.volume);
        }
    }

    /// Per-tick upkeep on the update thread: notice the intro draining and
    /// handle any starvation the output reported.
    pub fn service(&mut self) {
        if self.stopped {
            return;
        }
        let Some(output) = self.output.as_mut() else {
            return;
        };
        if self.phase == VoicePhase::Intro && output.pending_buffer_count() <= 1 {
            self.phase = VoicePhase::Loop;
        }
        if output.take_buffer_needed() {
            self.on_buffer_needed();
        }
    }

    fn on_buffer_needed(&mut self) {
        let Some(output) = self.output.as_mut() else {
            return;
        };
        if output.state() != PlaybackState::Playing {
            return;
        }
        trace!(phase = ?self.phase, "Machine voice starved");
        match self.phase {
            VoicePhase::Intro | VoicePhase::Loop if self.clips.has_intro() => {
                output.submit_buffer(Arc::clone(&self.clips.looping), false);
                self.phase = VoicePhase::Loop;
            }
            VoicePhase::Intro | VoicePhase::Loop => {}
            VoicePhase::Outro => {
                output.stop();
                self.stopped = true;
            }
        }
    }

    /// Platform state; `Stopped` once stopped or disposed.
    pub fn state(&self) -> PlaybackState {
        match &self.output {
            Some(output) if !self.stopped => output.state(),
            _ => PlaybackState::Stopped,
        }
    }

    /// Whether the streaming output has been released.
    pub fn is_disposed(&self) -> bool {
        self.output.is_none()
    }

    /// Stop and release the streaming output. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if let Some(mut output) = self.output.take() {
            output.stop();
        }
        self.stopped = true;
    }
}

impl fmt::Debug for StreamingVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingVoice")
            .field("phase", &self.phase)
            .field("stopped", &self.stopped)
            .field("disposed", &self.is_disposed())
            .field("volume", &self.volume)
            .finish()
    }
}
