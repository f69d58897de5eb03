//! Registered machine sounds, the ten exclusive slots and the autonomous list.

use crate::backend::{PlaybackState, StreamingDevice};
use crate::error::AudioError;
use crate::sounds::{MACHINE_SLOT_COUNT, MACHINE_SOUND_COUNT};
use crate::streaming::{MachineClips, StreamingVoice};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sound index meaning "no machine noise".
pub const NO_MACHINE_SOUND: i32 = -1;

/// Handle to a machine voice owned by a [`MachineBank`].
///
/// Slot 0 is the autonomous list. Ids go stale once the voice is reaped;
/// stale ids are ignored everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MachineVoiceId {
    slot: u8,
    serial: u64,
}

impl MachineVoiceId {
    /// Slot the voice was allocated in (0 = autonomous).
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Whether the voice lives in the autonomous list.
    pub fn is_autonomous(&self) -> bool {
        self.slot == 0
    }
}

#[derive(Debug)]
struct MachineEntry {
    serial: u64,
    voice: StreamingVoice,
}

impl MachineEntry {
    fn is_finished(&self) -> bool {
        self.voice.is_disposed() || self.voice.state() == PlaybackState::Stopped
    }
}

/// Owns every machine voice.
#[derive(Debug)]
pub struct MachineBank {
    clips: [Option<Arc<MachineClips>>; MACHINE_SOUND_COUNT],
    slots: [Option<MachineEntry>; MACHINE_SLOT_COUNT],
    autonomous: Vec<MachineEntry>,
    next_serial: u64,
}

impl MachineBank {
    /// Empty bank with nothing registered.
    pub fn new() -> Self {
        Self {
            clips: std::array::from_fn(|_| None),
            slots: std::array::from_fn(|_| None),
            autonomous: Vec::new(),
            next_serial: 1,
        }
    }

    /// Register the clips for one sound index.
    pub fn register(&mut self, index: usize, clips: MachineClips) -> Result<(), AudioError> {
        self.check_registrable(index)?;
        debug!(
            index,
            intro = clips.has_intro(),
            outro = clips.has_outro(),
            "Registered machine sound"
        );
        self.clips[index] = Some(Arc::new(clips));
        Ok(())
    }

    /// Register several sounds. Nothing is registered if any entry fails.
    pub fn register_many(
        &mut self,
        indices: &[usize],
        clips: Vec<MachineClips>,
    ) -> Result<(), AudioError> {
        if indices.len() != clips.len() {
            return Err(AudioError::MismatchedLengths {
                indices: indices.len(),
                clips: clips.len(),
            });
        }
        for (pos, &index) in indices.iter().enumerate() {
            self.check_registrable(index)?;
            if indices[..pos].contains(&index) {
                return Err(AudioError::DuplicateMachineSound(index));
            }
        }
        for (&index, clips) in indices.iter().zip(clips) {
            self.register(index, clips)?;
        }
        Ok(())
    }

    fn check_registrable(&self, index: usize) -> Result<(), AudioError> {
        match self.clips.get(index) {
            None => Err(AudioError::InvalidMachineSound(
                i32::try_from(index).unwrap_or(i32::MAX),
            )),
            Some(Some(_)) => Err(AudioError::DuplicateMachineSound(index)),
            Some(None) => Ok(()),
        }
    }

    /// Whether a sound index has clips.
    pub fn is_registered(&self, index: usize) -> bool {
        self.clips.get(index).is_some_and(Option::is_some)
    }

    /// Allocate and start a voice.
    ///
    /// `sound_index` -1 yields `None`. Slot 0 always allocates into the
    /// autonomous list; slots 1 to 10 allocate only when their occupant is
    /// gone or stopped. A device that fails to open is logged and yields
    /// `None`.
    pub fn request(
        &mut self,
        device: &dyn StreamingDevice,
        sound_index: i32,
        slot: usize,
        volume: f32,
        suspended: bool,
    ) -> Result<Option<MachineVoiceId>, AudioError> {
        if sound_index == NO_MACHINE_SOUND {
            return Ok(None);
        }
        let index = usize::try_from(sound_index)
            .ok()
            .filter(|&i| i < MACHINE_SOUND_COUNT)
            .ok_or(AudioError::InvalidMachineSound(sound_index))?;
        if slot > MACHINE_SLOT_COUNT {
            return Err(AudioError::InvalidMachineSlot(slot));
        }
        let clips = self.clips[index]
            .clone()
            .ok_or(AudioError::UnregisteredMachineSound(index))?;

        if slot > 0 {
            if let Some(occupant) = &mut self.slots[slot - 1] {
                if !occupant.is_finished() {
                    debug!(slot, "Machine slot busy");
                    return Ok(None);
                }
                occupant.voice.dispose();
            }
            self.slots[slot - 1] = None;
        }

        let output = match device.open(clips.format()) {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to open streaming output for machine sound {}: {:#}", index, e);
                return Ok(None);
            }
        };
        let mut voice = StreamingVoice::new(output, clips);
        voice.set_volume(volume);
        voice.play();
        if suspended {
            voice.pause();
        }

        let serial = self.next_serial;
        self.next_serial += 1;
        let entry = MachineEntry { serial, voice };
        if slot == 0 {
            self.autonomous.push(entry);
        } else {
            self.slots[slot - 1] = Some(entry);
        }
        debug!(index, slot, serial, "Machine voice started");
        Ok(Some(MachineVoiceId {
            slot: slot as u8,
            serial,
        }))
    }

    fn entry(&self, id: MachineVoiceId) -> Option<&MachineEntry> {
        if id.is_autonomous() {
            self.autonomous.iter().find(|e| e.serial == id.serial)
        } else {
            self.slots
                .get(usize::from(id.slot) - 1)?
                .as_ref()
                .filter(|e| e.serial == id.serial)
        }
    }

    fn entry_mut(&mut self, id: MachineVoiceId) -> Option<&mut MachineEntry> {
        if id.is_autonomous() {
            self.autonomous.iter_mut().find(|e| e.serial == id.serial)
        } else {
            self.slots
                .get_mut(usize::from(id.slot) - 1)?
                .as_mut()
                .filter(|e| e.serial == id.serial)
        }
    }

    /// The voice behind an id, unless it has been reaped.
    pub fn voice(&self, id: MachineVoiceId) -> Option<&StreamingVoice> {
        self.entry(id).map(|e| &e.voice)
    }

    /// Mutable access to the voice behind an id.
    pub fn voice_mut(&mut self, id: MachineVoiceId) -> Option<&mut StreamingVoice> {
        self.entry_mut(id).map(|e| &mut e.voice)
    }

    /// Stop a voice. Returns false for stale ids.
    pub fn stop(&mut self, id: MachineVoiceId, immediate: bool) -> bool {
        match self.voice_mut(id) {
            Some(voice) => {
                voice.stop(immediate);
                true
            }
            None => false,
        }
    }

    fn each_voice(&mut self, mut f: impl FnMut(&mut StreamingVoice)) {
        for entry in self.slots.iter_mut().flatten() {
            f(&mut entry.voice);
        }
        for entry in &mut self.autonomous {
            f(&mut entry.voice);
        }
    }

    /// Service live voices, then drop every finished one.
    ///
    /// Returns how many voices were reaped.
    pub fn service_and_reap(&mut self) -> usize {
        self.each_voice(StreamingVoice::service);

        let mut reaped = 0;
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(MachineEntry::is_finished) {
                if let Some(mut entry) = slot.take() {
                    entry.voice.dispose();
                    reaped += 1;
                }
            }
        }
        let before = self.autonomous.len();
        self.autonomous.retain_mut(|entry| {
            if entry.is_finished() {
                entry.voice.dispose();
                false
            } else {
                true
            }
        });
        reaped + (before - self.autonomous.len())
    }

    /// Hard-stop and drop every voice. Returns how many were live.
    pub fn reset(&mut self) -> usize {
        let mut count = 0;
        self.each_voice(|voice| {
            voice.dispose();
            count += 1;
        });
        self.slots = std::array::from_fn(|_| None);
        self.autonomous.clear();
        count
    }

    /// Apply one volume to every voice.
    pub fn set_volume(&mut self, volume: f32) {
        self.each_voice(|voice| voice.set_volume(volume));
    }

    /// Pause every voice.
    pub fn pause_all(&mut self) {
        self.each_voice(StreamingVoice::pause);
    }

    /// Resume every voice.
    pub fn resume_all(&mut self) {
        self.each_voice(StreamingVoice::resume);
    }

    /// Numbers of the slots holding a voice.
    pub fn occupied_slots(&self) -> Vec<u8> {
        (1..=MACHINE_SLOT_COUNT as u8)
            .filter(|&n| self.slots[usize::from(n) - 1].is_some())
            .collect()
    }

    /// Voices in the autonomous list.
    pub fn autonomous_count(&self) -> usize {
        self.autonomous.len()
    }

    /// Every voice held, slotted or autonomous.
    pub fn voice_count(&self) -> usize {
        self.slots.iter().flatten().count() + self.autonomous.len()
    }
}

impl Default for MachineBank {
    fn default() -> Self {
        Self::new()
    }
}
