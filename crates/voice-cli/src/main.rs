//! voice-cli: queue tracks, decode them with ffmpeg, and write paced Opus frames.
//!
//! Frames go to a file (or stdout with `--output -`) in the `voice-frame-proto`
//! format. Playback is controlled by typing commands on stdin.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use voice_cli::{cli, config, runtime};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,voice_player=info,voice_cli=info")
        }))
        .init();

    let file = match args.config.as_deref() {
        Some(path) => config::CliConfig::load(path)?,
        None => config::CliConfig::default(),
    };
    let run = config::resolve(args, file);
    runtime::run(run, true)
}
