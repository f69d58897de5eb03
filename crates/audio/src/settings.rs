//! Mix-level preferences and volume controls.

use serde::{Deserialize, Serialize};

/// Persisted mix preferences, read and written by the options menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixSettings {
    /// Master volume (0.0 to 1.0)
    pub master: f32,
    /// Music volume (0.0 to 1.0)
    pub music: f32,
    /// Sound effects volume (0.0 to 1.0), also used for machine sounds
    pub sfx: f32,
    /// Voice-acting volume (0.0 to 1.0)
    pub voice: f32,
    /// Whether audio is muted
    pub muted: bool,
    /// Whether voice-acting clips play at all
    pub voice_clips_enabled: bool,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            master: 1.0,
            music: 0.6,
            sfx: 1.0,
            voice: 1.0,
            muted: false,
            voice_clips_enabled: true,
        }
    }
}

impl MixSettings {
    /// Create new mix settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Full music level (master * music), ignoring mute.
    ///
    /// This is the `max` every crossfade ramps towards.
    pub fn music_level(&self) -> f32 {
        self.master * self.music
    }

    /// Full SFX level (master * sfx), ignoring mute.
    pub fn sfx_level(&self) -> f32 {
        self.master * self.sfx
    }

    /// Full voice level (master * voice), ignoring mute.
    pub fn voice_level(&self) -> f32 {
        self.master * self.voice
    }

    /// SFX volume a newly started effect gets.
    pub fn effective_sfx_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.sfx_level()
        }
    }

    /// Voice volume a newly started clip gets.
    pub fn effective_voice_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.voice_level()
        }
    }

    /// Toggle mute state.
    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Set master volume (clamped to 0.0-1.0).
    pub fn set_master(&mut self, volume: f32) {
        self.master = volume.clamp(0.0, 1.0);
    }

    /// Set music volume (clamped to 0.0-1.0).
    pub fn set_music(&mut self, volume: f32) {
        self.music = volume.clamp(0.0, 1.0);
    }

    /// Set SFX volume (clamped to 0.0-1.0).
    pub fn set_sfx(&mut self, volume: f32) {
        self.sfx = volume.clamp(0.0, 1.0);
    }

    /// Set voice volume (clamped to 0.0-1.0).
    pub fn set_voice(&mut self, volume: f32) {
        self.voice = volume.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = MixSettings::default();
        assert_eq!(settings.master, 1.0);
        assert_eq!(settings.music, 0.6);
        assert!(!settings.muted);
        assert!(settings.voice_clips_enabled);
    }

    #[test]
    fn test_levels() {
        let settings = MixSettings {
            master: 0.5,
            music: 0.8,
            sfx: 0.6,
            voice: 1.0,
            ..Default::default()
        };

        assert!((settings.music_level() - 0.4).abs() < 0.001);
        assert!((settings.sfx_level() - 0.3).abs() < 0.001);
        assert!((settings.voice_level() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_mute_only_affects_effective_volumes() {
        let mut settings = MixSettings::default();
        settings.toggle_mute();
        assert!(settings.muted);
        assert_eq!(settings.effective_sfx_volume(), 0.0);
        assert_eq!(settings.effective_voice_volume(), 0.0);
        assert!(settings.music_level() > 0.0);

        settings.toggle_mute();
        assert!(settings.effective_sfx_volume() > 0.0);
    }

    #[test]
    fn test_volume_clamping() {
        let mut settings = MixSettings::default();
        settings.set_master(1.5);
        assert_eq!(settings.master, 1.0);

        settings.set_music(-0.5);
        assert_eq!(settings.music, 0.0);
    }
}
