use anyhow::{Context, Result};
use clockwork_audio::{MixSettings, TransportPolicy};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};
use tracing::warn;

pub const DEFAULT_AUDIO_CONFIG_PATH: &str = "config/audio.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Master volume (0.0 to 1.0).
    pub master_volume: f32,
    /// Music volume (0.0 to 1.0).
    pub music_volume: f32,
    /// Sound effects and machine volume (0.0 to 1.0).
    pub sfx_volume: f32,
    /// Voice-acting volume (0.0 to 1.0).
    pub voice_volume: f32,
    /// Whether audio is muted.
    pub audio_muted: bool,
    pub voice_clips_enabled: bool,
    /// How long one music library call may take before it is retried.
    pub transport_timeout_ms: u64,
    /// Music library attempts before giving up.
    pub transport_attempts: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let mix = MixSettings::default();
        let policy = TransportPolicy::default();
        Self {
            master_volume: mix.master,
            music_volume: mix.music,
            sfx_volume: mix.sfx,
            voice_volume: mix.voice,
            audio_muted: mix.muted,
            voice_clips_enabled: mix.voice_clips_enabled,
            transport_timeout_ms: policy.timeout.as_millis() as u64,
            transport_attempts: policy.attempts,
        }
    }
}

impl AudioConfig {
    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AudioConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    AudioConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_AUDIO_CONFIG_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else {
                    warn!(
                        "Audio config not found at {}. Using defaults",
                        path.display()
                    );
                }
                AudioConfig::default()
            }
        }
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, toml).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Mix preferences for the engine, with volumes clamped to 0..=1.
    pub fn mix_settings(&self) -> MixSettings {
        let mut mix = MixSettings {
            muted: self.audio_muted,
            voice_clips_enabled: self.voice_clips_enabled,
            ..MixSettings::default()
        };
        mix.set_master(self.master_volume);
        mix.set_music(self.music_volume);
        mix.set_sfx(self.sfx_volume);
        mix.set_voice(self.voice_volume);
        mix
    }

    /// Copy the engine's (possibly changed) preferences back for saving.
    pub fn store_mix_settings(&mut self, mix: &MixSettings) {
        self.master_volume = mix.master;
        self.music_volume = mix.music;
        self.sfx_volume = mix.sfx;
        self.voice_volume = mix.voice;
        self.audio_muted = mix.muted;
        self.voice_clips_enabled = mix.voice_clips_enabled;
    }

    pub fn transport_policy(&self) -> TransportPolicy {
        TransportPolicy {
            timeout: Duration::from_millis(self.transport_timeout_ms.max(1)),
            attempts: self.transport_attempts.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_config(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "clockwork-config-{}-{}/audio.toml",
            name,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = AudioConfig::load_from_path(&temp_config("missing"));
        assert_eq!(cfg, AudioConfig::default());
        assert_eq!(cfg.transport_policy(), TransportPolicy::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = temp_config("partial");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "audio_muted = true\nmusic_volume = 2.5\n").unwrap();

        let cfg = AudioConfig::load_from_path(&path);
        assert!(cfg.audio_muted);
        assert_eq!(cfg.sfx_volume, 1.0);
        let mix = cfg.mix_settings();
        assert!(mix.muted);
        assert_eq!(mix.music, 1.0);
    }

    #[test]
    fn invalid_file_falls_back() {
        let path = temp_config("invalid");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "audio_muted = \"loud\"").unwrap();
        assert_eq!(AudioConfig::load_from_path(&path), AudioConfig::default());
    }

    #[test]
    fn saved_preferences_load_back() {
        let path = temp_config("roundtrip");
        let mut cfg = AudioConfig::default();
        let mut mix = cfg.mix_settings();
        mix.toggle_mute();
        mix.voice_clips_enabled = false;
        cfg.store_mix_settings(&mix);
        cfg.transport_attempts = 0;
        cfg.save_to_path(&path).unwrap();

        let loaded = AudioConfig::load_from_path(&path);
        assert_eq!(loaded, cfg);
        assert!(loaded.mix_settings().muted);
        assert_eq!(loaded.transport_policy().attempts, 1);
    }
}
