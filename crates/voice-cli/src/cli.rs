use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "voice-cli", version)]
pub struct Args {
    /// Track URLs to queue at startup
    pub urls: Vec<String>,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Frame output path, or `-` for stdout
    #[arg(long, short)]
    pub output: Option<String>,

    /// Decoder executable (default: ffmpeg)
    #[arg(long)]
    pub ffmpeg: Option<String>,

    /// Metadata lookup executable (default: yt-dlp)
    #[arg(long)]
    pub ytdlp: Option<String>,

    /// Opus bitrate in bits per second
    #[arg(long)]
    pub bitrate: Option<i32>,

    /// Kill the decoder after this many milliseconds without progress
    #[arg(long)]
    pub stall_timeout_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_urls_and_overrides() {
        let args = Args::parse_from([
            "voice-cli",
            "--output",
            "-",
            "--ffmpeg",
            "/opt/ffmpeg",
            "https://a",
            "https://b",
        ]);
        assert_eq!(args.output.as_deref(), Some("-"));
        assert_eq!(args.ffmpeg.as_deref(), Some("/opt/ffmpeg"));
        assert_eq!(args.urls, vec!["https://a", "https://b"]);
        assert!(args.config.is_none());
    }
}
