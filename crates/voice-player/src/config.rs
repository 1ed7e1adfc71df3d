use std::time::Duration;

use serde::Deserialize;

/// Output sample rate of the decode process and the encoder (Hz).
pub const SAMPLE_RATE: u32 = 48_000;
/// Interleaved channel count of the decode output.
pub const CHANNELS: usize = 2;
/// Sample-frames per compressed frame (20 ms at 48 kHz).
pub const FRAME_SAMPLES: usize = 960;
/// Raw bytes per block handed to the encoder (16-bit interleaved stereo).
pub const BLOCK_BYTES: usize = FRAME_SAMPLES * CHANNELS * 2;
/// Upper bound for one compressed frame.
pub const MAX_FRAME_BYTES: usize = 4000;
/// Wall-clock duration of one frame.
pub const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Playback engine settings shared by lookup, decode and status stages.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Decoder executable.
    pub ffmpeg_path: String,
    /// Metadata lookup executable.
    pub ytdlp_path: String,
    /// Target Opus bitrate; encoder default when unset.
    pub bitrate_bps: Option<i32>,
    /// Period of the now-playing status refresh.
    pub status_interval_ms: u64,
    /// Kill a decode session that reports no progress for this long (disabled when unset).
    pub stall_timeout_ms: Option<u64>,
    /// Capacity of the progress channel between tracker and consumer.
    pub progress_buffer: usize,
    /// Thumbnail used when lookup returns something that is not a URL.
    pub default_thumbnail: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ytdlp_path: "yt-dlp".to_string(),
            bitrate_bps: None,
            status_interval_ms: 1000,
            stall_timeout_ms: None,
            progress_buffer: 64,
            default_thumbnail: "https://example.com/default-thumbnail.png".to_string(),
        }
    }
}

impl PlayerConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms.max(50))
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
