use crate::cue_script::{Cue, CueScriptPlayer};
use crate::demo_content::{self, ClipSpec};
use anyhow::{Context, Result};
use clockwork_audio::{
    AudioEngine, EngineSnapshot, HeadlessBackend, MachineVoiceId, MediaLibrary, MixSettings,
    SoundResource, StreamingDevice, TransportError, TransportPolicy,
};
use clockwork_core::{FrameInput, FrameTick, GameState};
use clockwork_testkit::{EventRecord, JsonlSink, TraceHeader};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Ticks to keep running after the last cue so fades and outros can finish.
const SETTLE_TICKS: u64 = 120;

const DEMO_SCRIPT: &str = r#"{
    "steps": [
        {"tick": 0, "command": "play-track title"},
        {"tick": 30, "command": "sfx menu-select"},
        {"tick": 60, "command": "play-track map"},
        {"tick": 90, "command": "machine 1 1"},
        {"tick": 95, "command": "machine 0 0"},
        {"tick": 120, "command": "voice 3"},
        {"tick": 200, "command": "sfx win"},
        {"tick": 260, "command": "blur"},
        {"tick": 300, "command": "focus"},
        {"tick": 330, "command": "stop-machine 1"},
        {"tick": 360, "command": "level 2"},
        {"tick": 400, "command": "play-track finale"},
        {"tick": 420, "command": "mute"},
        {"tick": 480, "command": "mute"},
        {"tick": 540, "command": "custom-on"},
        {"tick": 600, "command": "custom-next"},
        {"tick": 660, "command": "custom-off"},
        {"tick": 700, "command": "finish-track"}
    ]
}"#;

pub struct HeadlessConfig {
    pub settings: MixSettings,
    pub policy: TransportPolicy,
    pub script: Option<PathBuf>,
    pub trace: Option<PathBuf>,
    pub max_ticks: Option<u64>,
    /// Play through the default output device instead of the silent clock.
    pub device: bool,
}

/// What a finished run leaves behind.
#[derive(Debug)]
pub struct RunSummary {
    pub ticks: u64,
    pub trace_lines: usize,
    pub settings: MixSettings,
    pub last: EngineSnapshot,
}

#[derive(Serialize)]
struct CueEvent {
    cue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Drives time forward between engine updates.
enum Clock {
    Headless(HeadlessBackend),
    #[cfg(feature = "rodio_backend")]
    Realtime {
        _backend: clockwork_audio::backend::rodio_output::RodioBackend,
    },
}

impl Clock {
    fn tick(&self) {
        match self {
            Clock::Headless(backend) => {
                backend.advance();
                backend.prune_dropped();
            }
            #[cfg(feature = "rodio_backend")]
            Clock::Realtime { .. } => {
                std::thread::sleep(std::time::Duration::from_secs_f64(1.0 / 60.0))
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Clock::Headless(_) => "headless",
            #[cfg(feature = "rodio_backend")]
            Clock::Realtime { .. } => "realtime",
        }
    }
}

/// Stand-in for the player's music library: cycles through a fixed playlist.
struct ScriptedLibrary {
    playlist: Vec<&'static str>,
    position: Mutex<usize>,
}

impl ScriptedLibrary {
    fn new() -> Self {
        Self {
            playlist: vec!["lathe-blues", "gearbox-waltz", "steam-reverie"],
            position: Mutex::new(0),
        }
    }

    fn step(&self, forward: bool, skip: u32) {
        let len = self.playlist.len();
        let mut position = match self.position.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let skip = skip as usize % len;
        *position = if forward {
            (*position + skip) % len
        } else {
            (*position + len - skip) % len
        };
        info!(track = self.playlist[*position], "Custom music track");
    }
}

impl MediaLibrary for ScriptedLibrary {
    fn is_available(&self) -> bool {
        true
    }

    fn move_next(&self, skip: u32) -> Result<(), TransportError> {
        self.step(true, skip);
        Ok(())
    }

    fn move_previous(&self, skip: u32) -> Result<(), TransportError> {
        self.step(false, skip);
        Ok(())
    }

    fn set_quiet(&self, quiet: bool) {
        info!(quiet, "Custom music volume");
    }
}

struct Runner {
    engine: AudioEngine,
    frame: FrameInput,
    machines: Vec<(usize, MachineVoiceId)>,
}

impl Runner {
    /// Apply one cue. Returns the failure message when the engine refused it.
    fn apply(&mut self, cue: &Cue) -> Option<String> {
        match cue {
            Cue::PlayTrack(song) => self.engine.play_track(*song),
            Cue::FinishTrack => self.engine.finish_track(),
            Cue::StopMusic => self.engine.stop_music(),
            Cue::Sfx(effect) => self.engine.play_sound_effect(*effect),
            Cue::Voice(index) => self.engine.play_voice_acting(*index),
            Cue::Machine { sound, slot } => {
                match self.engine.get_machine_noise(*sound, *slot) {
                    Ok(Some(id)) => self.machines.push((*slot, id)),
                    Ok(None) => info!(sound, slot, "Machine noise not started"),
                    Err(err) => return Some(err.to_string()),
                }
            }
            Cue::StopMachine { slot, immediate } => {
                let found = self.machines.iter().rposition(|(s, _)| s == slot);
                match found {
                    Some(position) => {
                        let (_, id) = self.machines.remove(position);
                        self.engine.stop_machine(id, *immediate);
                    }
                    None => return Some(format!("no machine voice in slot {slot}")),
                }
            }
            Cue::Level(level) => self.frame.level = *level,
            Cue::Pause => self.frame.game_state = GameState::Paused,
            Cue::Resume => self.frame.game_state = GameState::Running,
            Cue::Focus => self.frame.window_focused = true,
            Cue::Blur => self.frame.window_focused = false,
            Cue::Mute => self.frame.mute_toggle_pressed = true,
            Cue::CustomOn => {
                if let Err(err) = self.engine.start_custom_music() {
                    return Some(err.to_string());
                }
            }
            Cue::CustomOff => self.engine.stop_custom_music(),
            Cue::CustomSkip(direction) => {
                if let Err(err) = self.engine.skip_custom_track(*direction) {
                    return Some(err.to_string());
                }
            }
        }
        None
    }

    fn forget_reaped_machines(&mut self) {
        let engine = &self.engine;
        self.machines
            .retain(|(_, id)| engine.machine_voice(*id).is_some());
    }
}

pub fn run(cfg: HeadlessConfig) -> Result<RunSummary> {
    let (mut script, source) = match cfg.script.as_deref() {
        Some(path) => (
            CueScriptPlayer::from_path(path)?,
            path.display().to_string(),
        ),
        None => (
            CueScriptPlayer::from_json(DEMO_SCRIPT).context("built-in demo script")?,
            "built-in demo".to_string(),
        ),
    };

    let (engine, clock) = build_engine(cfg.settings, cfg.device)?;
    let mut runner = Runner {
        engine: engine.with_custom_music(Arc::new(ScriptedLibrary::new()), cfg.policy),
        frame: FrameInput::new(FrameTick::ZERO),
        machines: Vec::new(),
    };
    let (indices, clips) = demo_content::machine_clips()?;
    runner
        .engine
        .register_machine_sounds(&indices, clips)
        .context("registering demo machine sounds")?;

    let mut sink = match cfg.trace.as_deref() {
        Some(path) => {
            let mut sink = JsonlSink::create(path)?;
            sink.write(&TraceHeader::now(source.clone()))?;
            Some(sink)
        }
        None => None,
    };

    info!(clock = clock.name(), script = %source, "Headless audio run starting");

    let settle_until = script.last_tick().0 + SETTLE_TICKS;
    let mut ticks = 0u64;
    let mut last = runner.engine.snapshot();
    loop {
        let tick = runner.frame.tick;
        match cfg.max_ticks {
            Some(max) if tick.0 >= max => break,
            None if script.is_finished() && tick.0 > settle_until => break,
            _ => {}
        }

        for cue in script.drain_ready(tick) {
            let error = runner.apply(&cue);
            if let Some(err) = &error {
                warn!(%cue, tick = tick.0, "Cue failed: {err}");
            }
            if let Some(sink) = sink.as_mut() {
                sink.write(&EventRecord {
                    tick,
                    kind: "cue",
                    payload: CueEvent {
                        cue: cue.to_string(),
                        error,
                    },
                })?;
            }
        }

        clock.tick();
        runner.engine.update(&runner.frame);
        runner.forget_reaped_machines();
        last = runner.engine.snapshot();
        if let Some(sink) = sink.as_mut() {
            sink.write(&EventRecord {
                tick,
                kind: "snapshot",
                payload: &last,
            })?;
        }

        ticks += 1;
        runner.frame = runner.frame.next();
    }

    runner.engine.stop_all();
    let trace_lines = match sink.as_mut() {
        Some(sink) => {
            sink.flush()?;
            sink.lines()
        }
        None => 0,
    };
    info!(ticks, trace_lines, "Headless audio run finished");

    Ok(RunSummary {
        ticks,
        trace_lines,
        settings: runner.engine.settings().clone(),
        last,
    })
}

fn build_engine(settings: MixSettings, device: bool) -> Result<(AudioEngine, Clock)> {
    if device {
        if let Some(built) = device_engine(&settings)? {
            return Ok(built);
        }
    }

    let backend = HeadlessBackend::new();
    let bank = demo_content::build_bank(&mut |spec: &ClipSpec| {
        let resource: Arc<dyn SoundResource> = backend.resource(spec.name, spec.ticks);
        Ok(resource)
    })?;
    let streams: Box<dyn StreamingDevice> = Box::new(backend.clone());
    Ok((
        AudioEngine::new(bank, streams, settings),
        Clock::Headless(backend),
    ))
}

#[cfg(feature = "rodio_backend")]
fn device_engine(settings: &MixSettings) -> Result<Option<(AudioEngine, Clock)>> {
    use clockwork_audio::backend::rodio_output::RodioBackend;

    let backend = match RodioBackend::new() {
        Ok(backend) => backend,
        Err(err) => {
            warn!("Audio device unavailable, running headless: {err:#}");
            return Ok(None);
        }
    };
    let bank = demo_content::build_bank(&mut |spec: &ClipSpec| {
        Ok(backend.resource(spec.name, demo_content::wav_bytes(spec)?))
    })?;
    let streams: Box<dyn StreamingDevice> = Box::new(backend.streaming_device());
    let engine = AudioEngine::new(bank, streams, settings.clone());
    Ok(Some((engine, Clock::Realtime { _backend: backend })))
}

#[cfg(not(feature = "rodio_backend"))]
fn device_engine(_settings: &MixSettings) -> Result<Option<(AudioEngine, Clock)>> {
    warn!("Built without rodio_backend; running headless");
    Ok(None)
}
