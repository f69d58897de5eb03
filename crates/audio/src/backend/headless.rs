//! Deterministic playback without an audio device.
//!
//! Every sound has a length in ticks and every streamed buffer lasts a
//! whole number of ticks derived from its byte length. Nothing moves until
//! [`HeadlessBackend::advance`] is called, so a host loop (or a test) decides
//! exactly when clips finish and when streams starve.

use super::{
    PcmFormat, PlaybackState, SoundInstance, SoundResource, StreamingDevice, StreamingOutput,
};
use anyhow::Result;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Output ticks per second the headless clock assumes when sizing buffers.
pub const TICKS_PER_SECOND: u32 = 60;

/// Observable state of one sound instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceProbe {
    /// Resource name the instance was created from.
    pub name: String,
    /// Platform state.
    pub state: PlaybackState,
    /// Last volume set.
    pub volume: f32,
    /// Loop flag.
    pub looped: bool,
    /// Times playback started from the beginning.
    pub plays: u32,
    /// Whether the owning handle has been dropped.
    pub dropped: bool,
}

/// One buffer handed to a streaming output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Buffer length in bytes.
    pub len: usize,
    /// Whether it was submitted as a looping buffer.
    pub looping: bool,
}

/// Observable state of one streaming output.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamProbe {
    /// Format the output was opened with.
    pub format: PcmFormat,
    /// Platform state.
    pub state: PlaybackState,
    /// Last volume set.
    pub volume: f32,
    /// Buffers queued or playing.
    pub pending: usize,
    /// Every submission, in order.
    pub submissions: Vec<Submission>,
    /// Whether the owning voice released the output.
    pub dropped: bool,
}

impl StreamProbe {
    /// Number of submissions with the given byte length.
    pub fn submissions_of_len(&self, len: usize) -> usize {
        self.submissions.iter().filter(|s| s.len == len).count()
    }
}

#[derive(Debug)]
struct InstanceSlot {
    name: String,
    length_ticks: u32,
    position: u32,
    state: PlaybackState,
    volume: f32,
    looped: bool,
    plays: u32,
    dropped: bool,
}

impl InstanceSlot {
    fn probe(&self) -> InstanceProbe {
        InstanceProbe {
            name: self.name.clone(),
            state: self.state,
            volume: self.volume,
            looped: self.looped,
            plays: self.plays,
            dropped: self.dropped,
        }
    }

    fn tick(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.position += 1;
        if self.position >= self.length_ticks {
            self.position = 0;
            if !self.looped {
                self.state = PlaybackState::Stopped;
            }
        }
    }
}

#[derive(Debug)]
struct QueuedBuffer {
    length: u32,
    remaining: u32,
    looping: bool,
}

#[derive(Debug)]
struct StreamSlot {
    format: PcmFormat,
    queue: VecDeque<QueuedBuffer>,
    submissions: Vec<Submission>,
    state: PlaybackState,
    volume: f32,
    buffer_needed: bool,
    dropped: bool,
}

impl StreamSlot {
    fn probe(&self) -> StreamProbe {
        StreamProbe {
            format: self.format,
            state: self.state,
            volume: self.volume,
            pending: self.queue.len(),
            submissions: self.submissions.clone(),
            dropped: self.dropped,
        }
    }

    fn tick(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let Some(front) = self.queue.front_mut() else {
            return;
        };
        front.remaining = front.remaining.saturating_sub(1);
        if front.remaining > 0 {
            return;
        }
        if front.looping {
            front.remaining = front.length;
        } else {
            self.queue.pop_front();
            if self.queue.is_empty() {
                self.buffer_needed = true;
            }
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    instances: BTreeMap<usize, InstanceSlot>,
    streams: BTreeMap<usize, StreamSlot>,
    next_id: usize,
}

impl Registry {
    fn allocate_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn with_registry<R>(registry: &Mutex<Registry>, f: impl FnOnce(&mut Registry) -> R) -> R {
    match registry.lock() {
        Ok(mut guard) => f(&mut guard),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}

/// Tick-driven backend that records everything it is asked to do.
///
/// Cloning is cheap; clones share the same registry. Every instance and
/// stream stays on record after its owner drops it, so probes can inspect
/// history; long-running hosts call [`prune_dropped`](Self::prune_dropped)
/// to keep the registry bounded.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    registry: Arc<Mutex<Registry>>,
}

impl HeadlessBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resource whose instances last `length_ticks` ticks.
    pub fn resource(&self, name: impl Into<String>, length_ticks: u32) -> Arc<dyn SoundResource> {
        Arc::new(HeadlessResource {
            name: name.into(),
            length_ticks: length_ticks.max(1),
            registry: Arc::clone(&self.registry),
        })
    }

    /// Advance every playing instance and stream by one tick.
    pub fn advance(&self) {
        with_registry(&self.registry, |reg| {
            reg.instances.values_mut().for_each(InstanceSlot::tick);
            reg.streams.values_mut().for_each(StreamSlot::tick);
        });
    }

    /// Advance `ticks` times.
    pub fn advance_by(&self, ticks: u32) {
        for _ in 0..ticks {
            self.advance();
        }
    }

    /// Force every unfinished instance of `name` to the end of its clip.
    ///
    /// Returns how many instances were stopped.
    pub fn finish(&self, name: &str) -> usize {
        with_registry(&self.registry, |reg| {
            let mut finished = 0;
            for slot in reg
                .instances
                .values_mut()
                .filter(|s| s.name == name && !s.dropped && s.state != PlaybackState::Stopped)
            {
                slot.state = PlaybackState::Stopped;
                slot.position = 0;
                finished += 1;
            }
            finished
        })
    }

    /// Every instance created from `name`, oldest first.
    pub fn instances(&self, name: &str) -> Vec<InstanceProbe> {
        with_registry(&self.registry, |reg| {
            reg.instances
                .values()
                .filter(|s| s.name == name)
                .map(InstanceSlot::probe)
                .collect()
        })
    }

    /// Most recently created instance of `name`.
    pub fn latest(&self, name: &str) -> Option<InstanceProbe> {
        self.instances(name).pop()
    }

    /// Instances whose handle is still held and which have not stopped.
    pub fn live_instance_count(&self) -> usize {
        with_registry(&self.registry, |reg| {
            reg.instances
                .values()
                .filter(|s| !s.dropped && s.state != PlaybackState::Stopped)
                .count()
        })
    }

    /// Every streaming output opened so far, oldest first.
    pub fn streams(&self) -> Vec<StreamProbe> {
        with_registry(&self.registry, |reg| {
            reg.streams.values().map(StreamSlot::probe).collect()
        })
    }

    /// Streaming outputs still owned by a voice.
    pub fn open_stream_count(&self) -> usize {
        with_registry(&self.registry, |reg| {
            reg.streams.values().filter(|s| !s.dropped).count()
        })
    }

    /// Forget every instance and stream whose owner has been dropped.
    ///
    /// Returns how many records were removed.
    pub fn prune_dropped(&self) -> usize {
        with_registry(&self.registry, |reg| {
            let before = reg.instances.len() + reg.streams.len();
            reg.instances.retain(|_, slot| !slot.dropped);
            reg.streams.retain(|_, slot| !slot.dropped);
            before - reg.instances.len() - reg.streams.len()
        })
    }
}

impl StreamingDevice for HeadlessBackend {
    fn open(&self, format: PcmFormat) -> Result<Box<dyn StreamingOutput>> {
        let id = with_registry(&self.registry, |reg| {
            let id = reg.allocate_id();
            reg.streams.insert(id, StreamSlot {
                format,
                queue: VecDeque::new(),
                submissions: Vec::new(),
                state: PlaybackState::Stopped,
                volume: 1.0,
                buffer_needed: false,
                dropped: false,
            });
            id
        });
        Ok(Box::new(HeadlessStream {
            id,
            registry: Arc::clone(&self.registry),
        }))
    }
}

struct HeadlessResource {
    name: String,
    length_ticks: u32,
    registry: Arc<Mutex<Registry>>,
}

impl SoundResource for HeadlessResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn instantiate(&self) -> Result<Box<dyn SoundInstance>> {
        let id = with_registry(&self.registry, |reg| {
            let id = reg.allocate_id();
            reg.instances.insert(id, InstanceSlot {
                name: self.name.clone(),
                length_ticks: self.length_ticks,
                position: 0,
                state: PlaybackState::Stopped,
                volume: 1.0,
                looped: false,
                plays: 0,
                dropped: false,
            });
            id
        });
        Ok(Box::new(HeadlessInstance {
            id,
            registry: Arc::clone(&self.registry),
        }))
    }
}

struct HeadlessInstance {
    id: usize,
    registry: Arc<Mutex<Registry>>,
}

impl HeadlessInstance {
    fn with_slot<R>(&self, f: impl FnOnce(&mut InstanceSlot) -> R) -> Option<R> {
        with_registry(&self.registry, |reg| reg.instances.get_mut(&self.id).map(f))
    }
}

impl SoundInstance for HeadlessInstance {
    fn play(&mut self) {
        self.with_slot(|slot| match slot.state {
            PlaybackState::Stopped => {
                slot.position = 0;
                slot.plays += 1;
                slot.state = PlaybackState::Playing;
            }
            PlaybackState::Paused => slot.state = PlaybackState::Playing,
            PlaybackState::Playing => {}
        });
    }

    fn pause(&mut self) {
        self.with_slot(|slot| {
            if slot.state == PlaybackState::Playing {
                slot.state = PlaybackState::Paused;
            }
        });
    }

    fn resume(&mut self) {
        self.with_slot(|slot| {
            if slot.state == PlaybackState::Paused {
                slot.state = PlaybackState::Playing;
            }
        });
    }

    fn stop(&mut self) {
        self.with_slot(|slot| {
            slot.state = PlaybackState::Stopped;
            slot.position = 0;
        });
    }

    fn set_volume(&mut self, volume: f32) {
        self.with_slot(|slot| slot.volume = volume);
    }

    fn set_looped(&mut self, looped: bool) {
        self.with_slot(|slot| slot.looped = looped);
    }

    fn state(&self) -> PlaybackState {
        self.with_slot(|slot| slot.state)
            .unwrap_or(PlaybackState::Stopped)
    }
}

impl Drop for HeadlessInstance {
    fn drop(&mut self) {
        self.with_slot(|slot| {
            slot.state = PlaybackState::Stopped;
            slot.dropped = true;
        });
    }
}

struct HeadlessStream {
    id: usize,
    registry: Arc<Mutex<Registry>>,
}

impl HeadlessStream {
    fn with_slot<R>(&self, f: impl FnOnce(&mut StreamSlot) -> R) -> Option<R> {
        with_registry(&self.registry, |reg| reg.streams.get_mut(&self.id).map(f))
    }
}

fn buffer_ticks(len: usize, format: PcmFormat) -> u32 {
    let bytes_per_tick = (format.sample_rate as usize * format.frame_bytes()
        / TICKS_PER_SECOND as usize)
        .max(1);
    len.div_ceil(bytes_per_tick).max(1) as u32
}

impl StreamingOutput for HeadlessStream {
    fn submit_buffer(&mut self, data: Arc<[u8]>, looping: bool) {
        self.with_slot(|slot| {
            let length = buffer_ticks(data.len(), slot.format);
            slot.queue.push_back(QueuedBuffer {
                length,
                remaining: length,
                looping,
            });
            slot.submissions.push(Submission {
                len: data.len(),
                looping,
            });
        });
    }

    fn play(&mut self) {
        self.with_slot(|slot| {
            slot.state = PlaybackState::Playing;
            if slot.queue.is_empty() {
                slot.buffer_needed = true;
            }
        });
    }

    fn pause(&mut self) {
        self.with_slot(|slot| {
            if slot.state == PlaybackState::Playing {
                slot.state = PlaybackState::Paused;
            }
        });
    }

    fn resume(&mut self) {
        self.with_slot(|slot| {
            if slot.state == PlaybackState::Paused {
                slot.state = PlaybackState::Playing;
            }
        });
    }

    fn stop(&mut self) {
        self.with_slot(|slot| {
            slot.queue.clear();
            slot.state = PlaybackState::Stopped;
            slot.buffer_needed = false;
        });
    }

    fn set_volume(&mut self, volume: f32) {
        self.with_slot(|slot| slot.volume = volume);
    }

    fn pending_buffer_count(&self) -> usize {
        self.with_slot(|slot| slot.queue.len()).unwrap_or(0)
    }

    fn take_buffer_needed(&mut self) -> bool {
        self.with_slot(|slot| std::mem::take(&mut slot.buffer_needed))
            .unwrap_or(false)
    }

    fn state(&self) -> PlaybackState {
        self.with_slot(|slot| slot.state)
            .unwrap_or(PlaybackState::Stopped)
    }
}

impl Drop for HeadlessStream {
    fn drop(&mut self) {
        self.with_slot(|slot| {
            slot.queue.clear();
            slot.state = PlaybackState::Stopped;
            slot.dropped = true;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChannelLayout;

    #[test]
    fn test_instance_finishes_after_length() {
        let backend = HeadlessBackend::new();
        let resource = backend.resource("beep", 3);
        let mut instance = resource.instantiate().unwrap();
        instance.play();
        backend.advance_by(2);
        assert_eq!(instance.state(), PlaybackState::Playing);
        backend.advance();
        assert_eq!(instance.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_looped_instance_never_stops() {
        let backend = HeadlessBackend::new();
        let resource = backend.resource("hum", 2);
        let mut instance = resource.instantiate().unwrap();
        instance.set_looped(true);
        instance.play();
        backend.advance_by(10);
        assert_eq!(instance.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_paused_instance_does_not_advance() {
        let backend = HeadlessBackend::new();
        let resource = backend.resource("beep", 2);
        let mut instance = resource.instantiate().unwrap();
        instance.play();
        instance.pause();
        backend.advance_by(5);
        assert_eq!(instance.state(), PlaybackState::Paused);
        instance.resume();
        backend.advance_by(2);
        assert_eq!(instance.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_drop_marks_probe() {
        let backend = HeadlessBackend::new();
        let resource = backend.resource("beep", 2);
        let instance = resource.instantiate().unwrap();
        drop(instance);
        let probe = backend.latest("beep").unwrap();
        assert!(probe.dropped);
        assert_eq!(backend.live_instance_count(), 0);
    }

    #[test]
    fn test_prune_forgets_only_released_records() {
        let backend = HeadlessBackend::new();
        let resource = backend.resource("beep", 2);
        let mut kept = resource.instantiate().unwrap();
        let released = resource.instantiate().unwrap();
        let stream = backend
            .open(PcmFormat::new(600, ChannelLayout::Mono))
            .unwrap();
        drop(released);
        drop(stream);

        assert_eq!(backend.prune_dropped(), 2);
        assert_eq!(backend.instances("beep").len(), 1);
        assert!(backend.streams().is_empty());

        kept.play();
        assert_eq!(kept.state(), PlaybackState::Playing);
        assert_eq!(backend.latest("beep").unwrap().plays, 1);
        assert_eq!(backend.prune_dropped(), 0);
    }

    #[test]
    fn test_stream_signals_buffer_needed_once_drained() {
        let backend = HeadlessBackend::new();
        // 600 Hz mono = 20 bytes per tick
        let format = PcmFormat::new(600, ChannelLayout::Mono);
        let mut stream = backend.open(format).unwrap();
        stream.submit_buffer(Arc::from(vec![0u8; 40]), false);
        stream.play();
        assert!(!stream.take_buffer_needed());
        backend.advance();
        assert_eq!(stream.pending_buffer_count(), 1);
        backend.advance();
        assert_eq!(stream.pending_buffer_count(), 0);
        assert_eq!(stream.state(), PlaybackState::Playing);
        assert!(stream.take_buffer_needed());
        assert!(!stream.take_buffer_needed());
    }

    #[test]
    fn test_looping_buffer_stays_queued() {
        let backend = HeadlessBackend::new();
        let format = PcmFormat::new(600, ChannelLayout::Mono);
        let mut stream = backend.open(format).unwrap();
        stream.submit_buffer(Arc::from(vec![0u8; 20]), true);
        stream.play();
        backend.advance_by(8);
        assert_eq!(stream.pending_buffer_count(), 1);
        assert!(!stream.take_buffer_needed());
        stream.stop();
        assert_eq!(stream.pending_buffer_count(), 0);
        assert_eq!(backend.streams()[0].submissions.len(), 1);
    }
}
