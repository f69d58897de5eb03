//! The engine façade: music, effects, voice-over and machine noises.

use crate::backend::StreamingDevice;
use crate::bank::SoundBank;
use crate::crossfade::{CrossfadeController, FadeContext, FadeOutcome};
use crate::custom_music::{CustomMusic, MediaLibrary, SkipDirection, TransportError, TransportPolicy};
use crate::error::AudioError;
use crate::handle::SoundHandle;
use crate::machines::{MachineBank, MachineVoiceId};
use crate::mix::{DuckReason, MixState, SuspendEdge};
use crate::settings::MixSettings;
use crate::sounds::{EffectId, SongId, TrackPart, MAX_PLAYABLE_VOICE, NON_DUCKING_VOICE};
use crate::streaming::{MachineClips, StreamingVoice};
use crate::track::TrackSet;
use clockwork_core::{FrameInput, FrameTick};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct VoiceOver {
    index: usize,
    handle: SoundHandle,
}

/// Owns every live sound and drives them once per frame.
///
/// Construct one at startup, call the `play_*` methods from gameplay and UI,
/// and call [`update`](Self::update) once per frame. Nothing here panics or
/// reports runtime conditions as errors: missing clips are logged and
/// skipped, finished sounds are reaped.
pub struct AudioEngine {
    bank: SoundBank,
    device: Box<dyn StreamingDevice>,
    settings: MixSettings,
    mix: MixState,
    current: Option<TrackSet>,
    crossfade: CrossfadeController,
    one_shots: Vec<SoundHandle>,
    siren: Option<SoundHandle>,
    win: Option<SoundHandle>,
    voice_over: Option<VoiceOver>,
    machines: MachineBank,
    custom_music: Option<CustomMusic>,
    tick: FrameTick,
}

impl AudioEngine {
    /// Create an engine over a loaded bank and a streaming device.
    pub fn new(bank: SoundBank, device: Box<dyn StreamingDevice>, settings: MixSettings) -> Self {
        debug!(muted = settings.muted, "Audio engine initialized");
        Self {
            bank,
            device,
            settings,
            mix: MixState::new(),
            current: None,
            crossfade: CrossfadeController::new(),
            one_shots: Vec::new(),
            siren: None,
            win: None,
            voice_over: None,
            machines: MachineBank::new(),
            custom_music: None,
            tick: FrameTick::ZERO,
        }
    }

    /// Attach the player's music library.
    pub fn with_custom_music(
        mut self,
        library: Arc<dyn MediaLibrary>,
        policy: TransportPolicy,
    ) -> Self {
        self.custom_music = Some(CustomMusic::new(library, policy));
        self
    }

    /// Current mix preferences.
    pub fn settings(&self) -> &MixSettings {
        &self.settings
    }

    /// Mutable mix preferences. Volume changes reach live sounds on the next
    /// update.
    pub fn settings_mut(&mut self) -> &mut MixSettings {
        &mut self.settings
    }

    /// Tick of the last update.
    pub fn tick(&self) -> FrameTick {
        self.tick
    }

    /// Song currently selected, if any.
    pub fn current_song(&self) -> Option<SongId> {
        self.current.as_ref().map(TrackSet::song)
    }

    /// The current track's handles.
    pub fn current_track(&self) -> Option<&TrackSet> {
        self.current.as_ref()
    }

    /// The crossfade in progress, if any.
    pub fn crossfade(&self) -> &CrossfadeController {
        &self.crossfade
    }

    /// Whether the music is ducked.
    pub fn is_ducked(&self) -> bool {
        self.mix.ducking().is_active()
    }

    /// Whether focus loss or pause currently holds every sound.
    pub fn is_suspended(&self) -> bool {
        self.mix.is_suspended()
    }

    /// Whether the player's own music replaces the soundtrack.
    pub fn is_custom_music_active(&self) -> bool {
        self.custom_music.as_ref().is_some_and(CustomMusic::is_active)
    }

    /// Live one-shot effects, including a playing siren or win jingle.
    pub fn one_shot_count(&self) -> usize {
        self.one_shots.len() + usize::from(self.siren.is_some()) + usize::from(self.win.is_some())
    }

    /// Index of the voice-over clip playing, if any.
    pub fn voice_over_index(&self) -> Option<usize> {
        self.voice_over.as_ref().map(|v| v.index)
    }

    /// Machine voices and slots.
    pub fn machines(&self) -> &MachineBank {
        &self.machines
    }

    fn bgm_held(&self) -> bool {
        self.mix.is_suspended() || self.is_custom_music_active()
    }

    fn duck_factor(&self) -> f32 {
        self.mix.ducking().factor()
    }

    // ---- Music ----

    /// Switch the background music to `song`, crossfading from whatever is
    /// audible. Requesting the song that is already playing does nothing.
    pub fn play_track(&mut self, song: SongId) {
        if let Some(current) = &self.current {
            if current.song() == song && !current.looping().is_disposed() {
                return;
            }
        }
        let Some(clips) = self.bank.song(song) else {
            debug!("Song not registered: {:?}", song);
            return;
        };
        let mut next = match TrackSet::instantiate(song, clips) {
            Ok(track) => track,
            Err(e) => {
                warn!("Failed to start song {:?}: {:#}", song, e);
                return;
            }
        };

        self.crossfade.cancel();
        let max = self.settings.music_level();
        let factor = self.duck_factor();
        let outgoing = self.current.take().and_then(|mut old| match old.audible_part() {
            Some(part) => Some((old, part)),
            None => {
                old.dispose();
                None
            }
        });

        match outgoing {
            Some((old, part)) => {
                let from_level = old
                    .part(part)
                    .map(|h| (h.volume() / factor).min(max))
                    .unwrap_or(0.0);
                next.start(0.0);
                self.crossfade.begin(old, part, from_level);
            }
            None => {
                let volume = if self.settings.muted { 0.0 } else { max * factor };
                next.start(volume);
            }
        }
        if self.bgm_held() {
            next.pause();
        }
        debug!(
            song = ?song,
            fading = self.crossfade.is_crossfading(),
            "Playing track"
        );
        self.current = Some(next);
    }

    /// Play the current song's outro in place of its loop.
    pub fn finish_track(&mut self) {
        let held = self.bgm_held();
        let Some(track) = self.current.as_mut() else {
            return;
        };
        if track.play_outro() {
            debug!(song = ?track.song(), "Finishing track");
            if held {
                track.pause();
            }
        }
    }

    /// Stop and drop every music handle.
    pub fn stop_music(&mut self) {
        self.crossfade.cancel();
        if let Some(mut track) = self.current.take() {
            track.dispose();
        }
    }

    // ---- Effects and voice ----

    /// Fire a one-shot effect at the SFX volume.
    pub fn play_sound_effect(&mut self, effect: EffectId) {
        let Some(resource) = self.bank.effect(effect) else {
            debug!("Effect not registered: {:?}", effect);
            return;
        };
        let mut handle = match SoundHandle::from_resource(resource) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to play effect {:?}: {:#}", effect, e);
                return;
            }
        };
        handle.set_volume(self.settings.effective_sfx_volume());
        handle.play();
        if self.mix.is_suspended() {
            handle.pause();
        }

        if effect.is_exclusive() {
            if let Some(mut old) = self.siren.replace(handle) {
                old.dispose();
            }
        } else if effect.ducks_music() {
            if let Some(mut old) = self.win.replace(handle) {
                old.dispose();
            }
            if self.mix.duck(DuckReason::Jingle) {
                self.apply_duck_change();
            }
        } else {
            self.one_shots.push(handle);
        }
    }

    /// Play a voice-acting clip, replacing any clip already playing.
    ///
    /// Only indices up to 10 are playable even though the bank holds 13.
    pub fn play_voice_acting(&mut self, index: usize) {
        if !self.settings.voice_clips_enabled {
            self.stop_voice_over();
            return;
        }
        if index > MAX_PLAYABLE_VOICE {
            debug!(index, "Voice clip index not playable");
            return;
        }
        let Some(resource) = self.bank.voice(index) else {
            debug!(index, "Voice clip not registered");
            return;
        };
        let mut handle = match SoundHandle::from_resource(resource) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to play voice clip {}: {:#}", index, e);
                return;
            }
        };

        self.stop_voice_over();
        handle.set_volume(self.settings.effective_voice_volume());
        handle.play();
        if self.mix.is_suspended() {
            handle.pause();
        }
        self.voice_over = Some(VoiceOver { index, handle });
        if index != NON_DUCKING_VOICE && self.mix.duck(DuckReason::VoiceOver) {
            self.apply_duck_change();
        }
    }

    fn stop_voice_over(&mut self) {
        if let Some(mut voice) = self.voice_over.take() {
            voice.handle.dispose();
            if self.mix.release(DuckReason::VoiceOver) {
                self.apply_duck_change();
            }
        }
    }

    // ---- Machines ----

    /// Register the PCM clips for a machine sound index (0 to 10).
    pub fn register_machine_sound(
        &mut self,
        index: usize,
        clips: MachineClips,
    ) -> Result<(), AudioError> {
        self.machines.register(index, clips)
    }

    /// Register several machine sounds at once.
    pub fn register_machine_sounds(
        &mut self,
        indices: &[usize],
        clips: Vec<MachineClips>,
    ) -> Result<(), AudioError> {
        self.machines.register_many(indices, clips)
    }

    /// Start a machine noise in `slot` (0 = autonomous, 1 to 10 exclusive).
    ///
    /// Returns `Ok(None)` for sound index -1, for a busy slot, or when the
    /// streaming device cannot open an output.
    pub fn get_machine_noise(
        &mut self,
        sound_index: i32,
        slot: usize,
    ) -> Result<Option<MachineVoiceId>, AudioError> {
        self.machines.request(
            self.device.as_ref(),
            sound_index,
            slot,
            self.settings.effective_sfx_volume(),
            self.mix.is_suspended(),
        )
    }

    /// The machine voice behind an id, unless it has been reaped.
    pub fn machine_voice(&self, id: MachineVoiceId) -> Option<&StreamingVoice> {
        self.machines.voice(id)
    }

    /// Stop a machine voice, through its outro unless `immediate`.
    pub fn stop_machine(&mut self, id: MachineVoiceId, immediate: bool) -> bool {
        self.machines.stop(id, immediate)
    }

    /// Pause one machine voice.
    pub fn pause_machine(&mut self, id: MachineVoiceId) {
        if let Some(voice) = self.machines.voice_mut(id) {
            voice.pause();
        }
    }

    /// Resume one machine voice.
    pub fn resume_machine(&mut self, id: MachineVoiceId) {
        if let Some(voice) = self.machines.voice_mut(id) {
            voice.resume();
        }
    }

    // ---- Custom music ----

    /// Replace the soundtrack with the player's music library.
    pub fn start_custom_music(&mut self) -> Result<(), TransportError> {
        let music = self.custom_music.as_mut().ok_or(TransportError::NoLibrary)?;
        music.activate()?;
        if let Some(track) = self.current.as_mut() {
            track.pause();
        }
        self.crossfade.pause();
        Ok(())
    }

    /// Return to the soundtrack.
    pub fn stop_custom_music(&mut self) {
        let Some(music) = self.custom_music.as_mut() else {
            return;
        };
        if !music.is_active() {
            return;
        }
        music.deactivate();
        if !self.mix.is_suspended() {
            if let Some(track) = self.current.as_mut() {
                track.resume();
            }
            self.crossfade.resume();
        }
    }

    /// Skip to the next or previous library track.
    pub fn skip_custom_track(&mut self, direction: SkipDirection) -> Result<(), TransportError> {
        match self.custom_music.as_mut() {
            Some(music) => music.skip(direction),
            None => Err(TransportError::NoLibrary),
        }
    }

    // ---- Mute ----

    /// Flip the persisted mute preference and apply it right away.
    pub fn toggle_mute(&mut self) {
        self.settings.toggle_mute();
        info!(muted = self.settings.muted, "Mute toggled");
        self.apply_mix();
    }

    // ---- Per-frame update ----

    /// Advance one frame.
    pub fn update(&mut self, frame: &FrameInput) {
        self.tick = frame.tick;

        let ducked = self.mix.ducking().is_active();
        if let Some(music) = self.custom_music.as_mut().filter(|m| m.is_active()) {
            music.set_quiet(ducked);
        }

        if self.win.as_ref().is_some_and(|h| !h.is_live()) {
            if let Some(mut win) = self.win.take() {
                win.dispose();
            }
            self.mix.release(DuckReason::Jingle);
        }

        self.apply_mix();
        self.advance_crossfade();

        self.one_shots.retain_mut(|handle| {
            if handle.is_live() {
                true
            } else {
                handle.dispose();
                false
            }
        });
        if self.siren.as_ref().is_some_and(|h| !h.is_live()) {
            if let Some(mut siren) = self.siren.take() {
                siren.dispose();
            }
        }

        self.machines.service_and_reap();
        if self.mix.observe_level(frame.level) {
            let wiped = self.machines.reset();
            debug!(level = frame.level, wiped, "Level changed, machine voices cleared");
        }

        if self.voice_over.as_ref().is_some_and(|v| !v.handle.is_live()) {
            self.stop_voice_over();
        }

        if frame.mute_toggle_pressed {
            self.toggle_mute();
        }

        match self.mix.observe_suspension(frame) {
            SuspendEdge::Suspended => self.pause_everything(),
            SuspendEdge::Resumed => self.resume_everything(),
            SuspendEdge::Unchanged => {}
        }
    }

    fn advance_crossfade(&mut self) {
        let ctx = FadeContext {
            max: self.settings.music_level(),
            duck_factor: self.duck_factor(),
            muted: self.settings.muted,
            held: self.bgm_held(),
        };
        match self.current.as_mut() {
            Some(track) => {
                if self.crossfade.advance(track, ctx) == FadeOutcome::Completed {
                    debug!(song = ?track.song(), "Crossfade finished");
                }
            }
            None => self.crossfade.cancel(),
        }
    }

    /// Push the mix state onto every live sound.
    fn apply_mix(&mut self) {
        if self.settings.muted {
            self.set_effect_volumes(0.0, 0.0);
            self.machines.set_volume(0.0);
            self.crossfade.interrupt_for_mute();
            self.silence_bgm();
        } else {
            let sfx = self.settings.sfx_level();
            self.set_effect_volumes(sfx, self.settings.voice_level());
            self.machines.set_volume(sfx);
            self.apply_bgm_level();
            self.start_loop_after_intro();
        }
    }

    fn set_effect_volumes(&mut self, sfx: f32, voice: f32) {
        for handle in self
            .one_shots
            .iter_mut()
            .chain(self.siren.as_mut())
            .chain(self.win.as_mut())
        {
            handle.set_volume(sfx);
        }
        if let Some(voice_over) = self.voice_over.as_mut() {
            voice_over.handle.set_volume(voice);
        }
    }

    /// Steady-state BGM volume; the crossfade owns it while one runs.
    fn apply_bgm_level(&mut self) {
        if self.settings.muted || !self.crossfade.is_idle() {
            return;
        }
        let volume = self.settings.music_level() * self.duck_factor();
        if let Some(track) = self.current.as_mut() {
            track.set_bgm_volume(volume);
        }
    }

    /// Rescale the audible BGM right away when ducking starts or ends,
    /// including both sides of a crossfade.
    fn apply_duck_change(&mut self) {
        if self.settings.muted {
            return;
        }
        let factor = self.duck_factor();
        let volume = self.settings.music_level() * factor;
        let Some(track) = self.current.as_mut() else {
            return;
        };
        if self.crossfade.is_idle() {
            track.set_bgm_volume(volume);
        } else {
            self.crossfade.apply_duck(track, factor);
        }
    }

    fn start_loop_after_intro(&mut self) {
        let held = self.bgm_held();
        let Some(track) = self.current.as_mut() else {
            return;
        };
        if track.intro_finished() {
            let volume = track.bgm_volume();
            track.start_loop(volume);
            if held {
                track.pause();
            }
        }
    }

    /// Keep the BGM running silently on its loop while muted.
    fn silence_bgm(&mut self) {
        let held = self.bgm_held();
        let Some(track) = self.current.as_mut() else {
            return;
        };
        if !track.looping().is_disposed() && !track.looping().is_live() {
            track.stop_intro();
            track.start_loop(0.0);
            if held {
                track.pause();
            }
        }
        track.set_bgm_volume(0.0);
    }

    fn pause_everything(&mut self) {
        debug!("Audio suspended");
        if let Some(track) = self.current.as_mut() {
            track.pause();
        }
        self.crossfade.pause();
        self.each_effect(SoundHandle::pause);
        self.machines.pause_all();
    }

    fn resume_everything(&mut self) {
        debug!("Audio resumed");
        if !self.is_custom_music_active() {
            if let Some(track) = self.current.as_mut() {
                track.resume();
            }
            self.crossfade.resume();
        }
        self.each_effect(SoundHandle::resume);
        self.machines.resume_all();
    }

    fn each_effect(&mut self, mut f: impl FnMut(&mut SoundHandle)) {
        for handle in self
            .one_shots
            .iter_mut()
            .chain(self.siren.as_mut())
            .chain(self.win.as_mut())
        {
            f(handle);
        }
        if let Some(voice_over) = self.voice_over.as_mut() {
            f(&mut voice_over.handle);
        }
    }

    /// Stop and drop every sound. Used on teardown.
    pub fn stop_all(&mut self) {
        self.stop_music();
        self.each_effect(SoundHandle::dispose);
        self.one_shots.clear();
        self.siren = None;
        self.win = None;
        self.mix.release(DuckReason::Jingle);
        self.stop_voice_over();
        let machines = self.machines.reset();
        if let Some(music) = self.custom_music.as_mut() {
            music.deactivate();
        }
        info!(machines, "All audio stopped");
    }

    // ---- Inspection ----

    /// Serializable summary of the engine state, written to traces.
    pub fn snapshot(&self) -> EngineSnapshot {
        let track = self.current.as_ref();
        EngineSnapshot {
            tick: self.tick.0,
            song: track.map(TrackSet::song),
            bgm_part: track.map(TrackSet::bgm_part),
            bgm_volume: track.map(TrackSet::bgm_volume).unwrap_or(0.0),
            fade: self.crossfade.phase_name().to_string(),
            crossfade: self.crossfade.outgoing().map(|out| CrossfadeSnapshot {
                from_song: out.track.song(),
                from_part: out.part,
                from_level: out.level,
                to_level: self.crossfade.incoming_level().unwrap_or(0.0),
            }),
            one_shots: self.one_shot_count(),
            voice_over: self.voice_over_index(),
            ducked: self.is_ducked(),
            muted: self.settings.muted,
            suspended: self.mix.is_suspended(),
            custom_music: self.is_custom_music_active(),
            machine_slots: self.machines.occupied_slots(),
            autonomous_machines: self.machines.autonomous_count(),
        }
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("settings", &self.settings)
            .field("mix", &self.mix)
            .field("current", &self.current_song())
            .field("crossfade", &self.crossfade.phase_name())
            .field("machines", &self.machines.voice_count())
            .field("tick", &self.tick)
            .finish()
    }
}

/// Outgoing side of a crossfade in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossfadeSnapshot {
    /// Song fading out
    pub from_song: SongId,
    /// Part of it that is audible
    pub from_part: TrackPart,
    /// Un-ducked outgoing level
    pub from_level: f32,
    /// Un-ducked incoming level
    pub to_level: f32,
}

/// One tick of engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Frame tick of the last update
    pub tick: u64,
    /// Current song
    pub song: Option<SongId>,
    /// Part carrying the current song
    pub bgm_part: Option<TrackPart>,
    /// Volume of that part
    pub bgm_volume: f32,
    /// `idle`, `fading-in` or `crossfading`
    pub fade: String,
    /// Outgoing side while crossfading
    pub crossfade: Option<CrossfadeSnapshot>,
    /// Live one-shot effects
    pub one_shots: usize,
    /// Voice-over clip playing
    pub voice_over: Option<usize>,
    /// Whether the music is ducked
    pub ducked: bool,
    /// Whether audio is muted
    pub muted: bool,
    /// Whether focus loss or pause holds every sound
    pub suspended: bool,
    /// Whether custom music replaces the soundtrack
    pub custom_music: bool,
    /// Occupied machine slots
    pub machine_slots: Vec<u8>,
    /// Autonomous machine voices
    pub autonomous_machines: usize,
}
