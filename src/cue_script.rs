//! Cue scripts: tick-stamped engine requests replayed by the headless runner.

use anyhow::{anyhow, bail, Context, Result};
use clockwork_audio::{EffectId, SkipDirection, SongId};
use clockwork_core::FrameTick;
use serde::Deserialize;
use std::{collections::VecDeque, fmt, fs, path::Path, str::FromStr};

#[derive(Debug, Deserialize)]
struct CueScriptFile {
    steps: Vec<CueScriptStepDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct CueScriptStepDef {
    tick: u64,
    command: String,
}

#[derive(Debug, Clone)]
struct CueScriptStep {
    tick: FrameTick,
    cue: Cue,
}

/// One scripted request to the engine or change to the frame inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cue {
    /// `play-track <song>`
    PlayTrack(SongId),
    /// `finish-track`: play the current song's outro.
    FinishTrack,
    /// `stop-music`
    StopMusic,
    /// `sfx <effect>`
    Sfx(EffectId),
    /// `voice <index>`
    Voice(usize),
    /// `machine <sound> <slot>`; sound -1 requests nothing.
    Machine { sound: i32, slot: usize },
    /// `stop-machine <slot> [now]`: stops the newest voice started in `slot`.
    StopMachine { slot: usize, immediate: bool },
    /// `level <index>`
    Level(u32),
    /// `pause`: the game enters its paused state.
    Pause,
    /// `resume`
    Resume,
    /// `focus`: the window regains focus.
    Focus,
    /// `blur`
    Blur,
    /// `mute`: presses the mute key for one frame.
    Mute,
    /// `custom-on`: switch to the player's music library.
    CustomOn,
    /// `custom-off`
    CustomOff,
    /// `custom-next` / `custom-prev`
    CustomSkip(SkipDirection),
}

fn arg<T: FromStr>(parts: &[&str], index: usize, what: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    let raw = parts
        .get(index)
        .ok_or_else(|| anyhow!("'{}' is missing its {}", parts[0], what))?;
    raw.parse::<T>()
        .map_err(|err| anyhow!("'{}': bad {} '{}': {}", parts[0], what, raw, err))
}

impl FromStr for Cue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let Some(&name) = parts.first() else {
            bail!("empty cue");
        };
        let cue = match name {
            "play-track" => Cue::PlayTrack(arg(&parts, 1, "song name")?),
            "finish-track" => Cue::FinishTrack,
            "stop-music" => Cue::StopMusic,
            "sfx" => Cue::Sfx(arg(&parts, 1, "effect name")?),
            "voice" => Cue::Voice(arg(&parts, 1, "voice index")?),
            "machine" => Cue::Machine {
                sound: arg(&parts, 1, "sound index")?,
                slot: arg(&parts, 2, "slot number")?,
            },
            "stop-machine" => Cue::StopMachine {
                slot: arg(&parts, 1, "slot number")?,
                immediate: match parts.get(2) {
                    None => false,
                    Some(&"now") => true,
                    Some(other) => bail!("'stop-machine': expected 'now', got '{other}'"),
                },
            },
            "level" => Cue::Level(arg(&parts, 1, "level index")?),
            "pause" => Cue::Pause,
            "resume" => Cue::Resume,
            "focus" => Cue::Focus,
            "blur" => Cue::Blur,
            "mute" => Cue::Mute,
            "custom-on" => Cue::CustomOn,
            "custom-off" => Cue::CustomOff,
            "custom-next" => Cue::CustomSkip(SkipDirection::Next),
            "custom-prev" => Cue::CustomSkip(SkipDirection::Previous),
            other => bail!("unknown cue '{other}'"),
        };
        Ok(cue)
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cue::PlayTrack(song) => write!(f, "play-track {}", song.name()),
            Cue::FinishTrack => f.write_str("finish-track"),
            Cue::StopMusic => f.write_str("stop-music"),
            Cue::Sfx(effect) => write!(f, "sfx {}", effect.name()),
            Cue::Voice(index) => write!(f, "voice {index}"),
            Cue::Machine { sound, slot } => write!(f, "machine {sound} {slot}"),
            Cue::StopMachine { slot, immediate } => {
                write!(f, "stop-machine {slot}")?;
                if *immediate {
                    f.write_str(" now")?;
                }
                Ok(())
            }
            Cue::Level(level) => write!(f, "level {level}"),
            Cue::Pause => f.write_str("pause"),
            Cue::Resume => f.write_str("resume"),
            Cue::Focus => f.write_str("focus"),
            Cue::Blur => f.write_str("blur"),
            Cue::Mute => f.write_str("mute"),
            Cue::CustomOn => f.write_str("custom-on"),
            Cue::CustomOff => f.write_str("custom-off"),
            Cue::CustomSkip(SkipDirection::Next) => f.write_str("custom-next"),
            Cue::CustomSkip(SkipDirection::Previous) => f.write_str("custom-prev"),
        }
    }
}

/// Deterministic cue script runner.
///
/// Scripts are a simple list of `{tick, command}` steps, executed in file order.
#[derive(Debug)]
pub struct CueScriptPlayer {
    pending: VecDeque<CueScriptStep>,
    last_tick: FrameTick,
}

impl CueScriptPlayer {
    /// Load a cue script from a JSON file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read cue script {}", path.display()))?;
        Self::from_json(&contents).with_context(|| format!("in cue script {}", path.display()))
    }

    /// Load a cue script from an in-memory JSON string.
    pub fn from_json(contents: &str) -> Result<Self> {
        let file: CueScriptFile = serde_json::from_str(contents)?;
        if file.steps.is_empty() {
            bail!("cue script contains no steps");
        }

        let mut pending = VecDeque::with_capacity(file.steps.len());
        let mut last_tick: Option<u64> = None;
        for (index, step) in file.steps.into_iter().enumerate() {
            if let Some(prev) = last_tick {
                if step.tick < prev {
                    bail!("cue script steps must be sorted by tick");
                }
            }
            last_tick = Some(step.tick);

            let cue = step
                .command
                .trim()
                .parse::<Cue>()
                .with_context(|| format!("step {} (tick {})", index + 1, step.tick))?;
            pending.push_back(CueScriptStep {
                tick: FrameTick(step.tick),
                cue,
            });
        }

        Ok(Self {
            pending,
            last_tick: FrameTick(last_tick.unwrap_or(0)),
        })
    }

    /// Drain and return all cues scheduled for ticks `<= tick`.
    pub fn drain_ready(&mut self, tick: FrameTick) -> Vec<Cue> {
        let mut cues = Vec::new();
        while self.pending.front().is_some_and(|step| step.tick <= tick) {
            if let Some(step) = self.pending.pop_front() {
                cues.push(step.cue);
            }
        }
        cues
    }

    /// Whether every step has been drained.
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    /// Tick of the final step.
    pub fn last_tick(&self) -> FrameTick {
        self.last_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cue_script_rejects_unsorted_ticks() {
        let json = r#"{
            "steps": [
                {"tick": 2, "command": "play-track title"},
                {"tick": 1, "command": "sfx pickup"}
            ]
        }"#;
        let err = CueScriptPlayer::from_json(json).unwrap_err();
        assert!(
            err.to_string().contains("sorted by tick"),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn cue_script_rejects_unknown_cue() {
        let json = r#"{"steps": [{"tick": 0, "command": "play-track elevator"}]}"#;
        let err = CueScriptPlayer::from_json(json).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("step 1"), "unexpected error: {message}");
        assert!(message.contains("elevator"), "unexpected error: {message}");
    }

    #[test]
    fn cue_script_drains_in_order_and_is_deterministic() {
        let json = r#"{
            "steps": [
                {"tick": 1, "command": "play-track title"},
                {"tick": 1, "command": "machine 3 2"},
                {"tick": 3, "command": "stop-machine 2 now"}
            ]
        }"#;
        let mut script = CueScriptPlayer::from_json(json).expect("script should parse");
        assert_eq!(script.last_tick(), FrameTick(3));

        assert_eq!(script.drain_ready(FrameTick(0)), Vec::<Cue>::new());
        assert_eq!(
            script.drain_ready(FrameTick(1)),
            vec![
                Cue::PlayTrack(SongId::Title),
                Cue::Machine { sound: 3, slot: 2 }
            ]
        );
        assert_eq!(script.drain_ready(FrameTick(2)), Vec::<Cue>::new());
        assert_eq!(
            script.drain_ready(FrameTick(3)),
            vec![Cue::StopMachine {
                slot: 2,
                immediate: true
            }]
        );
        assert!(script.is_finished());
    }

    #[test]
    fn cue_names_round_trip_through_display() {
        for raw in [
            "play-track workshop",
            "finish-track",
            "sfx siren",
            "voice 12",
            "machine -1 0",
            "stop-machine 4",
            "level 7",
            "custom-prev",
        ] {
            let cue: Cue = raw.parse().unwrap();
            assert_eq!(cue.to_string(), raw);
        }
        assert!("machine 3".parse::<Cue>().is_err());
        assert!("stop-machine 1 later".parse::<Cue>().is_err());
    }
}
