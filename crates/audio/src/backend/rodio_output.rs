//! Real output through rodio.

use super::{
    PcmFormat, PlaybackState, SoundInstance, SoundResource, StreamingDevice, StreamingOutput,
};
use anyhow::{Context, Result};
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::Arc;
use tracing::warn;

/// Owns the output stream; must outlive every sound and stream made from it.
pub struct RodioBackend {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioBackend {
    /// Open the default output device.
    pub fn new() -> Result<Self> {
        let (stream, handle) =
            OutputStream::try_default().context("Failed to create audio output stream")?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    /// Wrap encoded audio bytes (WAV or Vorbis) as a playable resource.
    pub fn resource(&self, name: impl Into<String>, data: Vec<u8>) -> Arc<dyn SoundResource> {
        Arc::new(RodioResource {
            name: name.into(),
            data: Arc::from(data),
            handle: self.handle.clone(),
        })
    }

    /// Streaming device for machine sounds.
    pub fn streaming_device(&self) -> RodioStreamingDevice {
        RodioStreamingDevice {
            handle: self.handle.clone(),
        }
    }
}

struct RodioResource {
    name: String,
    data: Arc<[u8]>,
    handle: OutputStreamHandle,
}

impl SoundResource for RodioResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn instantiate(&self) -> Result<Box<dyn SoundInstance>> {
        Ok(Box::new(RodioInstance {
            data: Arc::clone(&self.data),
            handle: self.handle.clone(),
            sink: None,
            volume: 1.0,
            looped: false,
        }))
    }
}

/// A fresh sink per play; rodio sinks cannot rewind.
struct RodioInstance {
    data: Arc<[u8]>,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    volume: f32,
    looped: bool,
}

impl RodioInstance {
    fn start(&mut self) -> Result<()> {
        let sink = Sink::try_new(&self.handle).context("Failed to create audio sink")?;
        let cursor = Cursor::new(Arc::clone(&self.data));
        if self.looped {
            let source = Decoder::new_looped(cursor).context("Failed to decode audio")?;
            sink.append(source);
        } else {
            let source = Decoder::new(cursor).context("Failed to decode audio")?;
            sink.append(source);
        }
        sink.set_volume(self.volume);
        sink.play();
        self.sink = Some(sink);
        Ok(())
    }
}

impl SoundInstance for RodioInstance {
    fn play(&mut self) {
        match self.state() {
            PlaybackState::Playing => {}
            PlaybackState::Paused => self.resume(),
            PlaybackState::Stopped => {
                if let Err(e) = self.start() {
                    warn!("Failed to start sound: {:#}", e);
                }
            }
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }

    fn set_looped(&mut self, looped: bool) {
        self.looped = looped;
    }

    fn state(&self) -> PlaybackState {
        match &self.sink {
            None => PlaybackState::Stopped,
            Some(sink) if sink.empty() => PlaybackState::Stopped,
            Some(sink) if sink.is_paused() => PlaybackState::Paused,
            Some(_) => PlaybackState::Playing,
        }
    }
}

/// Opens sink-backed streaming outputs.
pub struct RodioStreamingDevice {
    handle: OutputStreamHandle,
}

impl StreamingDevice for RodioStreamingDevice {
    fn open(&self, format: PcmFormat) -> Result<Box<dyn StreamingOutput>> {
        Ok(Box::new(RodioStream {
            handle: self.handle.clone(),
            format,
            sink: None,
            state: PlaybackState::Stopped,
            volume: 1.0,
        }))
    }
}

/// Streaming output over a sink queue.
///
/// Starvation is detected by polling the sink from the update thread, so
/// `take_buffer_needed` never races a device callback.
struct RodioStream {
    handle: OutputStreamHandle,
    format: PcmFormat,
    sink: Option<Sink>,
    state: PlaybackState,
    volume: f32,
}

impl RodioStream {
    fn sink(&mut self) -> Option<&Sink> {
        if self.sink.is_none() {
            match Sink::try_new(&self.handle) {
                Ok(sink) => {
                    sink.set_volume(self.volume);
                    if self.state != PlaybackState::Playing {
                        sink.pause();
                    }
                    self.sink = Some(sink);
                }
                Err(e) => warn!("Failed to create streaming sink: {}", e),
            }
        }
        self.sink.as_ref()
    }
}

fn pcm_samples(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

impl StreamingOutput for RodioStream {
    fn submit_buffer(&mut self, data: Arc<[u8]>, looping: bool) {
        let channels = self.format.channels.count();
        let rate = self.format.sample_rate;
        let Some(sink) = self.sink() else {
            return;
        };
        let buffer = SamplesBuffer::new(channels, rate, pcm_samples(&data));
        if looping {
            sink.append(buffer.repeat_infinite());
        } else {
            sink.append(buffer);
        }
    }

    fn play(&mut self) {
        self.state = PlaybackState::Playing;
        if let Some(sink) = self.sink() {
            sink.play();
        }
    }

    fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            if let Some(sink) = &self.sink {
                sink.pause();
            }
        }
    }

    fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
            if let Some(sink) = &self.sink {
                sink.play();
            }
        }
    }

    fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }

    fn pending_buffer_count(&self) -> usize {
        self.sink.as_ref().map(|s| s.len()).unwrap_or(0)
    }

    fn take_buffer_needed(&mut self) -> bool {
        self.state == PlaybackState::Playing && self.pending_buffer_count() == 0
    }

    fn state(&self) -> PlaybackState {
        self.state
    }
}
