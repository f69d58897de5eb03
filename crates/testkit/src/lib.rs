#![warn(missing_docs)]
//! Trace plumbing for headless runs: newline-delimited JSON event streams.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clockwork_core::FrameTick;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// First line of every trace, describing the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceHeader {
    /// Always `"header"`, so readers can tell it from event lines.
    pub kind: String,
    /// Free-form label, usually the cue script path.
    pub source: String,
    /// Wall-clock start time (RFC 3339).
    pub started_at: DateTime<Utc>,
    /// Crate version that produced the trace.
    pub version: String,
}

impl TraceHeader {
    /// Header stamped with the current time.
    pub fn now(source: impl Into<String>) -> Self {
        Self {
            kind: "header".to_string(),
            source: source.into(),
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Event record captured by headless runs.
#[derive(Debug, Serialize)]
pub struct EventRecord<'a, P: Serialize> {
    /// Frame tick when the event occurred.
    pub tick: FrameTick,
    /// Human-readable kind label.
    pub kind: &'a str,
    /// Event payload.
    pub payload: P,
}

/// A sink that writes newline-delimited JSON to disk.
pub struct JsonlSink {
    writer: BufWriter<File>,
    lines: usize,
}

impl JsonlSink {
    /// Create a new sink at `path`, creating parent directories if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create trace directory {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create trace file {}", path.display()))?;
        debug!("Writing trace to {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    /// Append one JSON line.
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    /// Lines written so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flush buffered lines to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush trace")
    }
}

/// Read every line of a JSONL file as `T`. Blank lines are skipped.
pub fn read_jsonl<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open trace {}", path.display()))?;
    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid JSON line", path.display(), number + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(stem: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "{}-{}/trace.jsonl",
            stem,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn sink_writes_header_and_events() {
        let path = temp_path("clockwork-trace");
        let mut sink = JsonlSink::create(&path).expect("sink create");
        sink.write(&TraceHeader::now("unit-test")).unwrap();
        sink.write(&EventRecord {
            tick: FrameTick(3),
            kind: "snapshot",
            payload: serde_json::json!({ "song": "Title" }),
        })
        .unwrap();
        assert_eq!(sink.lines(), 2);
        sink.flush().unwrap();

        let lines: Vec<Value> = read_jsonl(&path).expect("readable");
        assert_eq!(lines.len(), 2);
        let header: TraceHeader = serde_json::from_value(lines[0].clone()).unwrap();
        assert_eq!(header.source, "unit-test");
        assert_eq!(lines[1]["tick"], 3);
        assert_eq!(lines[1]["payload"]["song"], "Title");
    }

    #[test]
    fn read_reports_bad_line() {
        let path = temp_path("clockwork-bad-trace");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{\"tick\":1}\n\nnot json\n").unwrap();
        let err = read_jsonl::<Value, _>(&path).unwrap_err();
        assert!(format!("{err:#}").contains(":3: invalid JSON line"));
    }
}
