//! clockwork - game audio engine
//!
//! Headless runner: plays a cue script against the engine and records a trace

mod config;
mod cue_script;
mod demo_content;
mod headless;

use anyhow::Result;
use config::{AudioConfig, DEFAULT_AUDIO_CONFIG_PATH};
use headless::HeadlessConfig;
use std::{env, path::PathBuf};
use tracing::info;

fn main() -> Result<()> {
    // Initialize tracing with WARN level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    info!("Starting clockwork v{}", env!("CARGO_PKG_VERSION"));

    let cli = CliOptions::parse(env::args().skip(1));
    if cli.help {
        print_usage();
        return Ok(());
    }
    if cli.device && !cfg!(feature = "rodio_backend") {
        tracing::warn!("--device requires the rodio_backend feature; running headless");
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIO_CONFIG_PATH));
    let mut config = AudioConfig::load_from_path(&config_path);

    let summary = headless::run(HeadlessConfig {
        settings: config.mix_settings(),
        policy: config.transport_policy(),
        script: cli.script,
        trace: cli.trace.clone(),
        max_ticks: cli.max_ticks,
        device: cli.device,
    })?;

    if cli.persist {
        config.store_mix_settings(&summary.settings);
        config.save_to_path(&config_path)?;
        info!(path = %config_path.display(), "Saved audio preferences");
    }

    println!(
        "clockwork: {} ticks, song {}, muted {}",
        summary.ticks,
        summary
            .last
            .song
            .map(|song| song.name())
            .unwrap_or("none"),
        summary.settings.muted
    );
    if let Some(trace) = &cli.trace {
        println!(
            "clockwork: wrote {} trace lines to {}",
            summary.trace_lines,
            trace.display()
        );
    }
    Ok(())
}

fn print_usage() {
    println!(
        "usage: clockwork [--config PATH] [--script PATH] [--trace PATH] [--max-ticks N] [--persist] [--device]"
    );
}

#[derive(Debug, Default)]
struct CliOptions {
    help: bool,
    config: Option<PathBuf>,
    script: Option<PathBuf>,
    trace: Option<PathBuf>,
    max_ticks: Option<u64>,
    persist: bool,
    device: bool,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut opts = CliOptions::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => opts.help = true,
                "--config" => {
                    if let Some(path) = args.next() {
                        opts.config = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--config requires a file path");
                    }
                }
                "--script" => {
                    if let Some(path) = args.next() {
                        opts.script = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--script requires a file path");
                    }
                }
                "--trace" => {
                    if let Some(path) = args.next() {
                        opts.trace = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--trace requires a file path");
                    }
                }
                "--max-ticks" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<u64>() {
                            Ok(value) => opts.max_ticks = Some(value),
                            Err(err) => {
                                tracing::error!(%err, value = %raw, "--max-ticks must be an integer");
                            }
                        }
                    } else {
                        tracing::error!("--max-ticks requires an integer");
                    }
                }
                "--persist" => opts.persist = true,
                "--device" => opts.device = true,
                other => tracing::warn!("Ignoring unknown argument: {other}"),
            }
        }

        opts
    }
}
