//! Tracked wrapper around one platform sound instance.

use crate::backend::{PlaybackState, SoundInstance, SoundResource};
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// A playable sound with its mix volume, loop flag and disposal state.
///
/// Once disposed, a handle reports [`PlaybackState::Stopped`] and ignores
/// every command; the platform instance is never touched again.
pub struct SoundHandle {
    name: String,
    instance: Box<dyn SoundInstance>,
    volume: f32,
    looped: bool,
    disposed: bool,
}

impl SoundHandle {
    /// Create a stopped handle from a preloaded resource.
    pub fn from_resource(resource: &Arc<dyn SoundResource>) -> Result<Self> {
        let instance = resource.instantiate()?;
        Ok(Self {
            name: resource.name().to_string(),
            instance,
            volume: 1.0,
            looped: false,
            disposed: false,
        })
    }

    /// Resource name this handle was created from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start playback (restart when stopped, continue when paused).
    pub fn play(&mut self) {
        if !self.disposed {
            self.instance.play();
        }
    }

    /// Pause if playing.
    pub fn pause(&mut self) {
        if !self.disposed {
            self.instance.pause();
        }
    }

    /// Continue if paused.
    pub fn resume(&mut self) {
        if !self.disposed {
            self.instance.resume();
        }
    }

    /// Stop and rewind.
    pub fn stop(&mut self) {
        if !self.disposed {
            self.instance.stop();
        }
    }

    /// Set the volume, clamped to 0.0-1.0.
    pub fn set_volume(&mut self, volume: f32) {
        if self.disposed {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        self.instance.set_volume(self.volume);
    }

    /// Last volume set on this handle.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set the loop flag.
    pub fn set_looped(&mut self, looped: bool) {
        if self.disposed {
            return;
        }
        self.looped = looped;
        self.instance.set_looped(looped);
    }

    /// Whether the handle loops.
    pub fn is_looped(&self) -> bool {
        self.looped
    }

    /// Platform state; `Stopped` once disposed.
    pub fn state(&self) -> PlaybackState {
        if self.disposed {
            PlaybackState::Stopped
        } else {
            self.instance.state()
        }
    }

    /// Whether the handle is audibly playing.
    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Playing or paused (not stopped, not disposed).
    pub fn is_live(&self) -> bool {
        self.state() != PlaybackState::Stopped
    }

    /// Whether the handle has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Stop and release. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.instance.stop();
            self.disposed = true;
        }
    }
}

impl fmt::Debug for SoundHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundHandle")
            .field("name", &self.name)
            .field("volume", &self.volume)
            .field("looped", &self.looped)
            .field("disposed", &self.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;

    #[test]
    fn test_disposed_handle_ignores_commands() {
        let backend = HeadlessBackend::new();
        let resource = backend.resource("click", 4);
        let mut handle = SoundHandle::from_resource(&resource).unwrap();
        handle.set_volume(0.5);
        handle.play();
        assert!(handle.is_playing());

        handle.dispose();
        assert!(handle.is_disposed());
        assert_eq!(handle.state(), PlaybackState::Stopped);

        handle.play();
        handle.set_volume(0.9);
        assert_eq!(handle.volume(), 0.5);
        let probe = backend.latest("click").unwrap();
        assert_eq!(probe.state, PlaybackState::Stopped);
        assert_eq!(probe.plays, 1);
    }

    #[test]
    fn test_volume_is_clamped() {
        let backend = HeadlessBackend::new();
        let resource = backend.resource("click", 4);
        let mut handle = SoundHandle::from_resource(&resource).unwrap();
        handle.set_volume(1.7);
        assert_eq!(handle.volume(), 1.0);
        handle.set_volume(-1.0);
        assert_eq!(handle.volume(), 0.0);
    }

    #[test]
    fn test_live_covers_paused() {
        let backend = HeadlessBackend::new();
        let resource = backend.resource("click", 4);
        let mut handle = SoundHandle::from_resource(&resource).unwrap();
        assert!(!handle.is_live());
        handle.play();
        handle.pause();
        assert!(handle.is_live());
        assert!(!handle.is_playing());
    }
}
