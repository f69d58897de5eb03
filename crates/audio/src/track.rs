//! The one to three handles that make up a background music cue.

use crate::backend::SoundResource;
use crate::handle::SoundHandle;
use crate::sounds::{SongId, TrackPart};
use anyhow::{bail, Result};
use std::sync::Arc;

/// Live handles for one song.
///
/// The loop handle always exists; intro and outro exist exactly when the
/// song was registered with them.
#[derive(Debug)]
pub struct TrackSet {
    song: SongId,
    intro: Option<SoundHandle>,
    looping: SoundHandle,
    outro: Option<SoundHandle>,
    loop_started: bool,
}

impl TrackSet {
    /// Instantiate fresh handles from a registered clip list.
    pub fn instantiate(song: SongId, clips: &[Arc<dyn SoundResource>]) -> Result<Self> {
        let (intro, looping, outro) = match clips {
            [looping] => (None, looping, None),
            [intro, looping] => (Some(intro), looping, None),
            [intro, looping, outro] => (Some(intro), looping, Some(outro)),
            _ => bail!("song {:?} has {} clips", song, clips.len()),
        };

        let mut looping = SoundHandle::from_resource(looping)?;
        looping.set_looped(true);
        Ok(Self {
            song,
            intro: intro.map(SoundHandle::from_resource).transpose()?,
            looping,
            outro: outro.map(SoundHandle::from_resource).transpose()?,
            loop_started: false,
        })
    }

    /// Song this set plays.
    pub fn song(&self) -> SongId {
        self.song
    }

    /// Whether the song has an intro clip.
    pub fn has_intro(&self) -> bool {
        self.intro.is_some()
    }

    /// Whether the song has an outro clip.
    pub fn has_outro(&self) -> bool {
        self.outro.is_some()
    }

    /// Whether the loop has been started (or deliberately retired).
    pub fn loop_started(&self) -> bool {
        self.loop_started
    }

    /// The loop handle.
    pub fn looping(&self) -> &SoundHandle {
        &self.looping
    }

    /// Handle for a part, if the song has it.
    pub fn part(&self, part: TrackPart) -> Option<&SoundHandle> {
        match part {
            TrackPart::Intro => self.intro.as_ref(),
            TrackPart::Loop => Some(&self.looping),
            TrackPart::Outro => self.outro.as_ref(),
        }
    }

    /// Mutable handle for a part, if the song has it.
    pub fn part_mut(&mut self, part: TrackPart) -> Option<&mut SoundHandle> {
        match part {
            TrackPart::Intro => self.intro.as_mut(),
            TrackPart::Loop => Some(&mut self.looping),
            TrackPart::Outro => self.outro.as_mut(),
        }
    }

    /// Live part with precedence outro, then loop, then intro.
    pub fn audible_part(&self) -> Option<TrackPart> {
        [TrackPart::Outro, TrackPart::Loop, TrackPart::Intro]
            .into_iter()
            .find(|&part| self.part(part).is_some_and(SoundHandle::is_live))
    }

    /// Part that carries the song right now, whether or not it is live.
    pub fn bgm_part(&self) -> TrackPart {
        if self.outro.as_ref().is_some_and(SoundHandle::is_live) {
            TrackPart::Outro
        } else if self.intro.is_some() && !self.loop_started {
            TrackPart::Intro
        } else {
            TrackPart::Loop
        }
    }

    /// Current volume of the carrying part.
    pub fn bgm_volume(&self) -> f32 {
        self.part(self.bgm_part())
            .map(SoundHandle::volume)
            .unwrap_or(0.0)
    }

    /// Set the volume of the carrying part.
    pub fn set_bgm_volume(&mut self, volume: f32) {
        if let Some(handle) = self.part_mut(self.bgm_part()) {
            handle.set_volume(volume);
        }
    }

    /// Start the song from its first clip.
    pub fn start(&mut self, volume: f32) {
        match self.intro.as_mut() {
            Some(intro) => {
                intro.set_volume(volume);
                intro.play();
            }
            None => self.start_loop(volume),
        }
    }

    /// Start the loop clip.
    pub fn start_loop(&mut self, volume: f32) {
        self.looping.set_looped(true);
        self.looping.set_volume(volume);
        self.looping.play();
        self.loop_started = true;
    }

    /// The intro ran to completion and the loop still has to take over.
    pub fn intro_finished(&self) -> bool {
        !self.loop_started && self.intro.as_ref().is_some_and(|i| !i.is_live())
    }

    /// Stop the intro without starting the loop.
    pub fn stop_intro(&mut self) {
        if let Some(intro) = self.intro.as_mut() {
            intro.stop();
        }
    }

    /// Replace intro/loop with the outro at the current volume.
    ///
    /// Intro and loop are disposed, so a later request for the same song
    /// starts it afresh. Returns false when the song has no outro.
    pub fn play_outro(&mut self) -> bool {
        let volume = self.bgm_volume();
        let Some(outro) = self.outro.as_mut() else {
            return false;
        };
        outro.set_volume(volume);
        outro.play();
        if let Some(intro) = self.intro.as_mut() {
            intro.dispose();
        }
        self.looping.dispose();
        self.loop_started = true;
        true
    }

    /// Pause every live part.
    pub fn pause(&mut self) {
        self.each_handle(SoundHandle::pause);
    }

    /// Resume every paused part.
    pub fn resume(&mut self) {
        self.each_handle(SoundHandle::resume);
    }

    /// Stop and dispose every part.
    pub fn dispose(&mut self) {
        self.each_handle(SoundHandle::dispose);
    }

    fn each_handle(&mut self, mut f: impl FnMut(&mut SoundHandle)) {
        if let Some(intro) = self.intro.as_mut() {
            f(intro);
        }
        f(&mut self.looping);
        if let Some(outro) = self.outro.as_mut() {
            f(outro);
        }
    }
}
