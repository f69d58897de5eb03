//! The player's own music library, played instead of the soundtrack.
//!
//! Library transport calls can block for a long time on some platforms, so
//! [`CustomMusic::skip`] runs them on a worker thread and waits a bounded
//! time. A worker that misses the deadline is abandoned; the next attempt
//! asks for one more track of skip to step past whatever stalled.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failures reported by a music library, shown to the player as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// No library is installed or reachable.
    #[error("No music library is available.")]
    NoLibrary,
    /// The track is copy-protected.
    #[error("This song is protected and cannot be played.")]
    Protected,
    /// The library holds no playable songs.
    #[error("There are no songs in your music library.")]
    NoSongs,
    /// Custom music is not switched on.
    #[error("Custom music is not playing.")]
    Inactive,
    /// Every attempt timed out.
    #[error("Could not change song after {attempts} attempts.")]
    CouldNotPlay {
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// The library failed in some other way.
    #[error("The music library reported an error: {0}")]
    Library(String),
}

/// Platform music library.
///
/// Implementations are shared with worker threads.
pub trait MediaLibrary: Send + Sync {
    /// Whether a library is present and usable.
    fn is_available(&self) -> bool;
    /// Move `skip` tracks forward and play.
    fn move_next(&self, skip: u32) -> Result<(), TransportError>;
    /// Move `skip` tracks back and play.
    fn move_previous(&self, skip: u32) -> Result<(), TransportError>;
    /// Lower (or restore) the library's playback volume.
    fn set_quiet(&self, quiet: bool);
}

/// Direction of a track change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDirection {
    /// Next track.
    Next,
    /// Previous track.
    Previous,
}

/// Bounded-wait settings for transport calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportPolicy {
    /// How long to wait for one attempt.
    pub timeout: Duration,
    /// Attempts before giving up.
    pub attempts: u32,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            attempts: 5,
        }
    }
}

/// Activation state and transport for the custom music library.
pub struct CustomMusic {
    library: Arc<dyn MediaLibrary>,
    policy: TransportPolicy,
    active: bool,
    quiet: bool,
}

impl CustomMusic {
    /// Wrap a library.
    pub fn new(library: Arc<dyn MediaLibrary>, policy: TransportPolicy) -> Self {
        Self {
            library,
            policy,
            active: false,
            quiet: false,
        }
    }

    /// Whether custom music replaces the soundtrack.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the library is currently quieted for ducking.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Wait settings in effect.
    pub fn policy(&self) -> TransportPolicy {
        self.policy
    }

    /// Switch custom music on and start the first track.
    pub fn activate(&mut self) -> Result<(), TransportError> {
        if !self.library.is_available() {
            return Err(TransportError::NoLibrary);
        }
        self.active = true;
        info!("Custom music activated");
        if let Err(e) = self.run_with_retries(SkipDirection::Next) {
            self.active = false;
            return Err(e);
        }
        Ok(())
    }

    /// Switch custom music off.
    pub fn deactivate(&mut self) {
        if self.active {
            info!("Custom music deactivated");
        }
        self.active = false;
        self.set_quiet(false);
    }

    /// Quiet or unquiet the library. Only calls through on a change.
    pub fn set_quiet(&mut self, quiet: bool) {
        if self.quiet == quiet {
            return;
        }
        self.quiet = quiet;
        self.library.set_quiet(quiet);
    }

    /// Change track in the given direction.
    pub fn skip(&mut self, direction: SkipDirection) -> Result<(), TransportError> {
        if !self.active {
            return Err(TransportError::Inactive);
        }
        self.run_with_retries(direction)
    }

    fn run_with_retries(&self, direction: SkipDirection) -> Result<(), TransportError> {
        for attempt in 1..=self.policy.attempts {
            match self.attempt(direction, attempt) {
                Some(result) => return result,
                None => warn!(
                    ?direction,
                    attempt,
                    timeout_ms = self.policy.timeout.as_millis() as u64,
                    "Music library did not respond in time"
                ),
            }
        }
        Err(TransportError::CouldNotPlay {
            attempts: self.policy.attempts,
        })
    }

    /// One bounded attempt. `None` means the worker missed the deadline.
    fn attempt(
        &self,
        direction: SkipDirection,
        skip: u32,
    ) -> Option<Result<(), TransportError>> {
        let (tx, rx) = mpsc::channel();
        let library = Arc::clone(&self.library);
        let spawned = thread::Builder::new()
            .name("custom-music".into())
            .spawn(move || {
                let result = match direction {
                    SkipDirection::Next => library.move_next(skip),
                    SkipDirection::Previous => library.move_previous(skip),
                };
                // The receiver is gone if the caller already gave up.
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            return Some(Err(TransportError::Library(e.to_string())));
        }

        match rx.recv_timeout(self.policy.timeout) {
            Ok(result) => {
                debug!(?direction, skip, ok = result.is_ok(), "Transport call returned");
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(TransportError::Library(
                "transport worker exited without a result".into(),
            ))),
        }
    }
}

impl std::fmt::Debug for CustomMusic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomMusic")
            .field("policy", &self.policy)
            .field("active", &self.active)
            .field("quiet", &self.quiet)
            .finish()
    }
}
