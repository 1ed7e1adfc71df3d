//! CLI configuration: optional TOML file plus command-line overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

pub use voice_player::config::PlayerConfig;

use crate::cli::Args;

const DEFAULT_OUTPUT: &str = "voice-output.vfrm";

/// File-level configuration loaded from TOML. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    /// Frame output path, or `-` for stdout.
    pub output: Option<String>,
    /// URLs queued at startup, before any given on the command line.
    pub queue: Option<Vec<String>>,
    /// Playback engine settings.
    pub player: Option<PlayerConfig>,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        toml::from_str::<CliConfig>(&raw).with_context(|| format!("parse config {:?}", path))
    }
}

/// Effective settings for one run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub output: String,
    pub urls: Vec<String>,
    pub player: PlayerConfig,
}

/// Merge file settings with flags; flags win.
pub fn resolve(args: Args, file: CliConfig) -> RunConfig {
    let mut player = file.player.unwrap_or_default();
    if let Some(ffmpeg) = args.ffmpeg {
        player.ffmpeg_path = ffmpeg;
    }
    if let Some(ytdlp) = args.ytdlp {
        player.ytdlp_path = ytdlp;
    }
    if args.bitrate.is_some() {
        player.bitrate_bps = args.bitrate;
    }
    if args.stall_timeout_ms.is_some() {
        player.stall_timeout_ms = args.stall_timeout_ms;
    }

    let output = args
        .output
        .or(file.output)
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    let mut urls = file.queue.unwrap_or_default();
    urls.extend(args.urls);

    RunConfig {
        output,
        urls,
        player,
    }
}
