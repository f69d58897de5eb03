use clockwork_testkit::read_jsonl;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn scratch_dir(stem: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "clockwork_{stem}_{:x}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn run_clockwork(args: &[&str]) -> Output {
    let bin = env!("CARGO_BIN_EXE_clockwork");
    Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("spawn clockwork")
}

fn snapshot_at(records: &[Value], tick: u64) -> &Value {
    records
        .iter()
        .find(|r| r["kind"] == "snapshot" && r["tick"] == tick)
        .unwrap_or_else(|| panic!("no snapshot for tick {tick}"))
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

#[test]
fn scripted_run_writes_trace_and_persists_mute() {
    let dir = scratch_dir("cue_trace");
    let script = dir.join("cues.json");
    let trace = dir.join("out").join("trace.jsonl");
    let config = dir.join("audio.toml");

    std::fs::write(&config, "music_volume = 0.4\n").expect("write config");
    std::fs::write(
        &script,
        r#"{
            "steps": [
                {"tick": 0, "command": "play-track map"},
                {"tick": 10, "command": "machine 1 2"},
                {"tick": 12, "command": "machine 1 2"},
                {"tick": 20, "command": "machine 9 3"},
                {"tick": 30, "command": "mute"},
                {"tick": 40, "command": "play-track title"},
                {"tick": 60, "command": "stop-machine 2 now"}
            ]
        }"#,
    )
    .expect("write script");

    let output = run_clockwork(&[
        "--config",
        path_arg(&config),
        "--script",
        path_arg(&script),
        "--trace",
        path_arg(&trace),
        "--persist",
    ]);
    assert!(
        output.status.success(),
        "clockwork failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("181 ticks"), "unexpected stdout: {stdout}");

    let records: Vec<Value> = read_jsonl(&trace).expect("trace readable");
    assert_eq!(records[0]["kind"], "header");
    assert!(records[0]["source"]
        .as_str()
        .is_some_and(|s| s.ends_with("cues.json")));

    let snapshots = records.iter().filter(|r| r["kind"] == "snapshot").count();
    assert_eq!(snapshots, 181);

    assert_eq!(snapshot_at(&records, 0)["payload"]["song"], "Map");
    assert_eq!(
        snapshot_at(&records, 15)["payload"]["machine_slots"],
        serde_json::json!([2])
    );
    assert_eq!(snapshot_at(&records, 29)["payload"]["muted"], false);
    assert_eq!(snapshot_at(&records, 30)["payload"]["muted"], true);
    assert_eq!(snapshot_at(&records, 30)["payload"]["bgm_volume"], 0.0);
    assert_eq!(
        snapshot_at(&records, 60)["payload"]["machine_slots"],
        serde_json::json!([])
    );
    assert_eq!(snapshot_at(&records, 180)["payload"]["song"], "Title");

    let failed: Vec<&Value> = records
        .iter()
        .filter(|r| r["kind"] == "cue" && r["payload"]["error"].is_string())
        .collect();
    assert_eq!(failed.len(), 1, "only the unregistered sound should fail");
    assert_eq!(failed[0]["tick"], 20);
    assert!(failed[0]["payload"]["error"]
        .as_str()
        .is_some_and(|e| e.contains("not registered")));

    let saved: toml::Table = toml::from_str(
        &std::fs::read_to_string(&config).expect("config persisted"),
    )
    .expect("saved config is TOML");
    assert_eq!(
        saved.get("audio_muted").and_then(toml::Value::as_bool),
        Some(true)
    );
    let music = saved
        .get("music_volume")
        .and_then(toml::Value::as_float)
        .expect("music volume saved");
    assert!((music - 0.4).abs() < 1e-6, "music volume {music}");
}

#[test]
fn bad_script_fails_the_run() {
    let dir = scratch_dir("bad_script");
    let script = dir.join("cues.json");
    std::fs::write(
        &script,
        r#"{"steps": [{"tick": 0, "command": "play-track elevator"}]}"#,
    )
    .expect("write script");

    let output = run_clockwork(&["--script", path_arg(&script), "--max-ticks", "5"]);
    assert!(!output.status.success());
}

#[test]
fn max_ticks_bounds_the_default_run() {
    let dir = scratch_dir("max_ticks");
    let trace = dir.join("trace.jsonl");
    let config = dir.join("missing.toml");

    let output = run_clockwork(&[
        "--config",
        path_arg(&config),
        "--trace",
        path_arg(&trace),
        "--max-ticks",
        "45",
    ]);
    assert!(output.status.success());

    let records: Vec<Value> = read_jsonl(&trace).expect("trace readable");
    let last = records
        .iter()
        .rev()
        .find(|r| r["kind"] == "snapshot")
        .expect("at least one snapshot");
    assert_eq!(last["tick"], 44);
    assert!(!config.exists(), "config is only written with --persist");
}
