//! End-to-end engine scenarios on the headless backend.
//!
//! Every test drives the engine exactly like a host loop would: advance the
//! backend one tick, then call `update` with that frame's inputs.

use clockwork_audio::{
    AudioEngine, ChannelLayout, EffectId, HeadlessBackend, MachineClips, MediaLibrary,
    MixSettings, PcmFormat, PlaybackState, SongId, SoundBank, TrackPart, TransportError,
    TransportPolicy, VoicePhase,
};
use clockwork_core::{FrameInput, FrameTick, GameState};
use std::sync::Arc;

const SONG_LOOP_TICKS: u32 = 10_000;

struct Harness {
    backend: HeadlessBackend,
    engine: AudioEngine,
    frame: FrameInput,
}

impl Harness {
    fn new() -> Self {
        let backend = HeadlessBackend::new();
        let mut bank = SoundBank::new();
        bank.register_song(
            SongId::Title,
            vec![backend.resource("a-loop", SONG_LOOP_TICKS)],
        )
        .unwrap();
        bank.register_song(
            SongId::Map,
            vec![
                backend.resource("b-intro", 30),
                backend.resource("b-loop", SONG_LOOP_TICKS),
            ],
        )
        .unwrap();
        bank.register_song(
            SongId::Finale,
            vec![
                backend.resource("f-intro", 20),
                backend.resource("f-loop", SONG_LOOP_TICKS),
                backend.resource("f-outro", 40),
            ],
        )
        .unwrap();
        bank.register_effect(EffectId::Pickup, backend.resource("pickup", 4))
            .unwrap();
        bank.register_voice(1, backend.resource("vo-long", 1_000))
            .unwrap();

        let mut engine = AudioEngine::new(bank, Box::new(backend.clone()), MixSettings::default());
        engine
            .register_machine_sounds(
                &[3, 4],
                vec![machine_clips(true, true), machine_clips(false, false)],
            )
            .unwrap();

        Self {
            backend,
            engine,
            frame: FrameInput::new(FrameTick::ZERO),
        }
    }

    fn step(&mut self) {
        self.backend.advance();
        self.engine.update(&self.frame);
        self.frame = self.frame.next();
    }

    fn run(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Step until the crossfade is idle, returning the ticks taken.
    fn run_until_idle(&mut self, limit: u32) -> u32 {
        let mut ticks = 0;
        while !self.engine.crossfade().is_idle() {
            assert!(ticks < limit, "crossfade still running after {limit} ticks");
            self.step();
            ticks += 1;
        }
        ticks
    }

    fn max(&self) -> f32 {
        self.engine.settings().music_level()
    }
}

// 600 Hz mono: 20 bytes per tick.
fn machine_clips(intro: bool, outro: bool) -> MachineClips {
    MachineClips::new(
        PcmFormat::new(600, ChannelLayout::Mono),
        intro.then(|| vec![0; 40]),
        vec![0; 100],
        outro.then(|| vec![0; 60]),
    )
    .unwrap()
}

#[test]
fn repeat_play_track_allocates_nothing() {
    let mut h = Harness::new();
    h.engine.play_track(SongId::Title);
    h.step();
    h.engine.play_track(SongId::Title);
    h.engine.play_track(SongId::Title);

    assert_eq!(h.backend.instances("a-loop").len(), 1);
    assert!(h.engine.crossfade().is_idle());
    assert_eq!(h.engine.current_song(), Some(SongId::Title));
}

#[test]
fn one_clip_to_two_clip_crossfade() {
    let mut h = Harness::new();
    h.engine.play_track(SongId::Title);
    h.step();
    h.engine.play_track(SongId::Map);

    let snapshot = h.engine.snapshot();
    let fade = snapshot.crossfade.expect("crossfade should be running");
    assert_eq!(fade.from_song, SongId::Title);
    assert_eq!(fade.from_part, TrackPart::Loop);
    assert_eq!(snapshot.bgm_part, Some(TrackPart::Intro));
    let intro = h.backend.latest("b-intro").unwrap();
    assert_eq!(intro.state, PlaybackState::Playing);
    assert_eq!(intro.volume, 0.0);

    let ticks = h.run_until_idle(110);
    assert!((99..=101).contains(&ticks), "took {ticks} ticks");
    assert_eq!(h.engine.current_song(), Some(SongId::Map));
    assert_eq!(h.engine.current_track().unwrap().bgm_part(), TrackPart::Loop);
    assert_eq!(h.backend.latest("b-loop").unwrap().volume, h.max());
    assert_eq!(h.backend.latest("a-loop").unwrap().state, PlaybackState::Stopped);
}

#[test]
fn crossfade_completing_while_ducked_lands_on_half() {
    let mut h = Harness::new();
    h.engine.play_track(SongId::Title);
    h.step();
    h.engine.play_track(SongId::Map);
    h.run(10);
    h.engine.play_voice_acting(1);
    assert!(h.engine.is_ducked());

    h.run_until_idle(110);
    let bgm = h.engine.current_track().unwrap().bgm_volume();
    assert_eq!(bgm, h.max() * 0.5);
}

#[test]
fn second_request_during_crossfade_collapses_the_first() {
    let mut h = Harness::new();
    h.engine.play_track(SongId::Title);
    h.step();
    h.engine.play_track(SongId::Map);
    h.run(40);
    h.engine.play_track(SongId::Finale);

    // The Title loop was fading out; it is gone now.
    let a = h.backend.latest("a-loop").unwrap();
    assert!(a.dropped);
    let fade = h.engine.snapshot().crossfade.unwrap();
    assert_eq!(fade.from_song, SongId::Map);
    assert_eq!(fade.from_part, TrackPart::Loop);
}

#[test]
fn mute_round_trip_restores_steady_volume() {
    let mut h = Harness::new();
    h.engine.play_track(SongId::Title);
    h.run(5);
    let steady = h.backend.latest("a-loop").unwrap().volume;

    h.frame.mute_toggle_pressed = true;
    h.run(20);
    assert!(h.engine.settings().muted);
    let silent = h.backend.latest("a-loop").unwrap();
    assert_eq!(silent.volume, 0.0);
    assert_eq!(silent.state, PlaybackState::Playing);

    h.frame.mute_toggle_pressed = true;
    h.step();
    assert!(!h.engine.settings().muted);
    assert_eq!(h.backend.latest("a-loop").unwrap().volume, steady);
}

#[test]
fn voice_over_mid_crossfade_halves_both_sides_at_once() {
    let mut h = Harness::new();
    h.engine.play_track(SongId::Title);
    h.step();
    h.engine.play_track(SongId::Map);
    h.run(50);
    assert!(h.engine.crossfade().is_crossfading());
    let incoming = h.engine.current_track().unwrap().bgm_volume();
    let outgoing = h.backend.latest("a-loop").unwrap().volume;

    h.engine.play_voice_acting(1);
    assert!(h.engine.is_ducked());
    let ducked_in = h.engine.current_track().unwrap().bgm_volume();
    let ducked_out = h.backend.latest("a-loop").unwrap().volume;
    assert!((ducked_in - incoming * 0.5).abs() < 1e-5, "incoming {ducked_in}");
    assert!((ducked_out - outgoing * 0.5).abs() < 1e-5, "outgoing {ducked_out}");
}

#[test]
fn track_requested_while_paused_crossfades_only_after_resume() {
    let mut h = Harness::new();
    h.engine.play_track(SongId::Title);
    h.step();
    h.frame.game_state = GameState::Paused;
    h.step();

    h.engine.play_track(SongId::Map);
    assert!(h.engine.crossfade().is_crossfading());
    assert_eq!(h.backend.latest("b-intro").unwrap().state, PlaybackState::Paused);
    assert_eq!(h.backend.latest("a-loop").unwrap().state, PlaybackState::Paused);
    h.run(10);
    assert_eq!(h.engine.crossfade().incoming_level(), Some(0.0));

    h.frame.game_state = GameState::Running;
    h.step();
    assert_eq!(h.backend.latest("b-intro").unwrap().state, PlaybackState::Playing);
    assert_eq!(h.backend.latest("a-loop").unwrap().state, PlaybackState::Playing);
    h.run_until_idle(110);
    assert_eq!(h.engine.current_song(), Some(SongId::Map));
}

#[test]
fn mute_mid_crossfade_drops_outgoing_and_resumes_ramp() {
    let mut h = Harness::new();
    h.engine.play_track(SongId::Title);
    h.step();
    h.engine.play_track(SongId::Map);
    h.run(20);

    h.frame.mute_toggle_pressed = true;
    h.step();
    assert_eq!(h.engine.crossfade().phase_name(), "fading-in");
    assert!(h.backend.latest("a-loop").unwrap().dropped);
    let level = h.engine.crossfade().incoming_level().unwrap();

    // Muting stopped the intro and parked the song on its silent loop.
    h.run(10);
    assert_eq!(h.backend.latest("b-intro").unwrap().state, PlaybackState::Stopped);
    let b_loop = h.backend.latest("b-loop").unwrap();
    assert_eq!(b_loop.state, PlaybackState::Playing);
    assert_eq!(b_loop.volume, 0.0);
    assert_eq!(h.engine.crossfade().incoming_level(), Some(level));

    // Unmuting lands at the end of the tick; the ramp moves on the next one.
    h.frame.mute_toggle_pressed = true;
    h.step();
    assert_eq!(h.engine.current_track().unwrap().bgm_volume(), 0.0);
    h.step();
    assert!(h.engine.current_track().unwrap().bgm_volume() > level);
    h.run_until_idle(110);
    assert_eq!(h.backend.latest("b-loop").unwrap().volume, h.max());
}

#[test]
fn intro_hands_over_to_loop_without_a_gap() {
    let mut h = Harness::new();
    h.engine.play_track(SongId::Map);
    h.run(30);
    let track = h.engine.current_track().unwrap();
    assert_eq!(track.bgm_part(), TrackPart::Loop);
    let b_loop = h.backend.latest("b-loop").unwrap();
    assert_eq!(b_loop.state, PlaybackState::Playing);
    assert!(b_loop.looped);
    assert_eq!(b_loop.volume, h.max());
}

#[test]
fn finish_track_plays_outro_and_allows_restart() {
    let mut h = Harness::new();
    h.engine.play_track(SongId::Finale);
    h.run(25);
    h.engine.finish_track();

    let outro = h.backend.latest("f-outro").unwrap();
    assert_eq!(outro.state, PlaybackState::Playing);
    assert_eq!(outro.volume, h.max());
    assert!(h.engine.current_track().unwrap().looping().is_disposed());

    h.run(5);
    h.engine.play_track(SongId::Finale);
    let fade = h.engine.snapshot().crossfade.unwrap();
    assert_eq!(fade.from_part, TrackPart::Outro);
    assert_eq!(h.backend.instances("f-intro").len(), 2);
}

#[test]
fn stop_music_mid_crossfade_silences_both_songs() {
    let mut h = Harness::new();
    h.engine.play_track(SongId::Title);
    h.step();
    h.engine.play_track(SongId::Map);
    h.run(10);
    assert!(h.engine.crossfade().is_crossfading());

    h.engine.stop_music();
    assert_eq!(h.engine.current_song(), None);
    assert!(h.engine.crossfade().is_idle());
    assert_eq!(h.backend.live_instance_count(), 0);

    h.step();
    assert_eq!(h.engine.snapshot().song, None);
}

#[test]
fn machine_slot_is_exclusive() {
    let mut h = Harness::new();
    let first = h.engine.get_machine_noise(3, 2).unwrap();
    let second = h.engine.get_machine_noise(3, 2).unwrap();
    assert!(first.is_some());
    assert!(second.is_none());
}

#[test]
fn stopped_machine_frees_its_slot_for_the_next_request() {
    let mut h = Harness::new();
    let id = h.engine.get_machine_noise(4, 7).unwrap().unwrap();
    h.engine.stop_machine(id, true);
    let again = h.engine.get_machine_noise(4, 7).unwrap();
    assert!(again.is_some());
    assert!(h.engine.machine_voice(id).is_none());
}

#[test]
fn machine_outro_plays_once() {
    let mut h = Harness::new();
    let id = h.engine.get_machine_noise(3, 1).unwrap().unwrap();
    h.run(3);
    assert_eq!(
        h.engine.machine_voice(id).map(|v| v.phase()),
        Some(VoicePhase::Loop)
    );

    h.engine.stop_machine(id, false);
    h.engine.stop_machine(id, false);
    assert_eq!(
        h.engine.machine_voice(id).map(|v| v.phase()),
        Some(VoicePhase::Outro)
    );
    assert_eq!(h.backend.streams()[0].submissions_of_len(60), 1);

    // outro lasts 3 ticks; the voice is reaped right after it drains
    h.run(3);
    assert!(h.engine.machine_voice(id).is_none());
    assert!(h.engine.machines().occupied_slots().is_empty());
}

#[test]
fn graceful_stop_while_paused_holds_the_outro() {
    let mut h = Harness::new();
    let id = h.engine.get_machine_noise(3, 1).unwrap().unwrap();
    h.run(3);
    h.frame.game_state = GameState::Paused;
    h.step();
    assert_eq!(h.backend.streams()[0].state, PlaybackState::Paused);

    h.engine.stop_machine(id, false);
    let stream = &h.backend.streams()[0];
    assert_eq!(stream.state, PlaybackState::Paused);
    assert_eq!(stream.submissions_of_len(60), 1);
    assert_eq!(
        h.engine.machine_voice(id).map(|v| v.phase()),
        Some(VoicePhase::Outro)
    );

    h.run(10);
    assert!(h.engine.machine_voice(id).is_some());

    h.frame.game_state = GameState::Running;
    h.step();
    assert_eq!(h.backend.streams()[0].state, PlaybackState::Playing);
    h.run(3);
    assert!(h.engine.machine_voice(id).is_none());
}

#[test]
fn machine_loop_keeps_streaming() {
    let mut h = Harness::new();
    let id = h.engine.get_machine_noise(3, 1).unwrap().unwrap();
    h.run(40);
    let voice = h.engine.machine_voice(id).unwrap();
    assert_eq!(voice.state(), PlaybackState::Playing);
    assert!(h.backend.streams()[0].submissions_of_len(100) > 1);
}

#[test]
fn level_change_wipes_machines() {
    let mut h = Harness::new();
    h.step();
    h.engine.get_machine_noise(3, 1).unwrap();
    h.engine.get_machine_noise(4, 0).unwrap();
    h.engine.get_machine_noise(4, 0).unwrap();
    h.step();
    assert_eq!(h.engine.machines().voice_count(), 3);

    h.frame.level = 1;
    h.step();
    assert_eq!(h.engine.machines().voice_count(), 0);
    assert_eq!(h.backend.open_stream_count(), 0);
}

#[test]
fn muted_engine_starts_effects_silently() {
    let mut h = Harness::new();
    h.engine.toggle_mute();
    h.engine.play_sound_effect(EffectId::Pickup);
    let id = h.engine.get_machine_noise(4, 1).unwrap().unwrap();
    assert_eq!(h.backend.latest("pickup").unwrap().volume, 0.0);
    assert_eq!(h.engine.machine_voice(id).unwrap().volume(), 0.0);
}

struct QuietLibrary;

impl MediaLibrary for QuietLibrary {
    fn is_available(&self) -> bool {
        true
    }

    fn move_next(&self, _skip: u32) -> Result<(), TransportError> {
        Ok(())
    }

    fn move_previous(&self, _skip: u32) -> Result<(), TransportError> {
        Err(TransportError::NoSongs)
    }

    fn set_quiet(&self, _quiet: bool) {}
}

#[test]
fn custom_music_holds_the_soundtrack() {
    let mut h = Harness::new();
    h.engine = {
        let backend = h.backend.clone();
        let mut bank = SoundBank::new();
        bank.register_song(SongId::Title, vec![backend.resource("a-loop", 500)])
            .unwrap();
        bank.register_song(SongId::Map, vec![backend.resource("b-loop", 500)])
            .unwrap();
        AudioEngine::new(bank, Box::new(backend), MixSettings::default())
            .with_custom_music(Arc::new(QuietLibrary), TransportPolicy::default())
    };

    h.engine.play_track(SongId::Title);
    h.engine.start_custom_music().unwrap();
    assert_eq!(h.backend.latest("a-loop").unwrap().state, PlaybackState::Paused);

    h.engine.play_track(SongId::Map);
    assert_eq!(h.backend.latest("b-loop").unwrap().state, PlaybackState::Paused);
    h.run(50);
    assert!(h.engine.crossfade().is_crossfading());

    assert_eq!(
        h.engine
            .skip_custom_track(clockwork_audio::SkipDirection::Previous)
            .unwrap_err()
            .to_string(),
        "There are no songs in your music library."
    );

    h.engine.stop_custom_music();
    assert_eq!(h.backend.latest("b-loop").unwrap().state, PlaybackState::Playing);
    h.run_until_idle(110);
    assert_eq!(h.engine.current_song(), Some(SongId::Map));
}

#[test]
fn custom_music_without_library_reports_error() {
    let mut h = Harness::new();
    assert_eq!(
        h.engine.start_custom_music(),
        Err(TransportError::NoLibrary)
    );
    assert!(!h.engine.is_custom_music_active());
}
