//! Preloaded sound resources, keyed by effect, song and voice index.

use crate::backend::SoundResource;
use crate::error::AudioError;
use crate::sounds::{EffectId, SongId, VOICE_BANK_SIZE};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Every playable resource the engine can instantiate.
///
/// Built once at startup after content is loaded, then handed to the engine.
pub struct SoundBank {
    effects: HashMap<EffectId, Arc<dyn SoundResource>>,
    songs: HashMap<SongId, Vec<Arc<dyn SoundResource>>>,
    voices: [Option<Arc<dyn SoundResource>>; VOICE_BANK_SIZE],
}

impl SoundBank {
    /// Create an empty bank.
    pub fn new() -> Self {
        Self {
            effects: HashMap::new(),
            songs: HashMap::new(),
            voices: std::array::from_fn(|_| None),
        }
    }

    /// Register the resource for a one-shot effect.
    pub fn register_effect(
        &mut self,
        id: EffectId,
        resource: Arc<dyn SoundResource>,
    ) -> Result<(), AudioError> {
        if self.effects.contains_key(&id) {
            return Err(AudioError::DuplicateEffect(id));
        }
        debug!("Registered effect {:?} ({})", id, resource.name());
        self.effects.insert(id, resource);
        Ok(())
    }

    /// Register a song as `[loop]`, `[intro, loop]` or `[intro, loop, outro]`.
    pub fn register_song(
        &mut self,
        id: SongId,
        clips: Vec<Arc<dyn SoundResource>>,
    ) -> Result<(), AudioError> {
        if !(1..=3).contains(&clips.len()) {
            return Err(AudioError::InvalidSongClips {
                song: id,
                count: clips.len(),
            });
        }
        if self.songs.contains_key(&id) {
            return Err(AudioError::DuplicateSong(id));
        }
        debug!("Registered song {:?} with {} clips", id, clips.len());
        self.songs.insert(id, clips);
        Ok(())
    }

    /// Register a voice-acting clip.
    pub fn register_voice(
        &mut self,
        index: usize,
        resource: Arc<dyn SoundResource>,
    ) -> Result<(), AudioError> {
        let slot = self
            .voices
            .get_mut(index)
            .ok_or(AudioError::InvalidVoiceIndex(index))?;
        if slot.is_some() {
            return Err(AudioError::DuplicateVoice(index));
        }
        *slot = Some(resource);
        Ok(())
    }

    /// Resource for an effect.
    pub fn effect(&self, id: EffectId) -> Option<&Arc<dyn SoundResource>> {
        self.effects.get(&id)
    }

    /// Ordered clips for a song (length 1, 2 or 3).
    pub fn song(&self, id: SongId) -> Option<&[Arc<dyn SoundResource>]> {
        self.songs.get(&id).map(Vec::as_slice)
    }

    /// Resource for a voice clip.
    pub fn voice(&self, index: usize) -> Option<&Arc<dyn SoundResource>> {
        self.voices.get(index).and_then(Option::as_ref)
    }
}

impl Default for SoundBank {
    fn default() -> Self {
        Self::new()
    }
}
