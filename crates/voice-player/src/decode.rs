//! External decode process lifecycle.
//!
//! A decode session is one `ffmpeg` run: stream URL in, raw 48 kHz stereo s16le on
//! stdout, `-progress` key/value lines on stderr. Cancellation goes through a
//! [`CancellationToken`]; a reaper task owns the child and kills it when the token fires.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{CHANNELS, SAMPLE_RATE};
use crate::error::{PlayerError, Result};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// A running decode process: PCM output, status output and the handle to stop it.
pub struct DecodeSession {
    pub pcm: BoxedReader,
    pub status: BoxedReader,
    pub handle: ProcessHandle,
}

/// Cancellation handle for one decode session.
///
/// `kill` is idempotent and never fails; racing a natural exit is harmless.
pub struct ProcessHandle {
    token: CancellationToken,
    reaper: Option<JoinHandle<()>>,
}

impl ProcessHandle {
    /// Handle whose cancellation is observed by `reaper` (if any).
    pub fn new(token: CancellationToken, reaper: Option<JoinHandle<()>>) -> Self {
        Self { token, reaper }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn kill(&self) {
        self.token.cancel();
    }

    /// Kill the process and wait until it has been reaped.
    pub async fn shutdown(mut self) {
        self.kill();
        if let Some(reaper) = self.reaper.take() {
            if let Err(e) = reaper.await {
                tracing::debug!(error = %e, "decoder reaper task failed");
            }
        }
    }
}

/// Starts decode sessions. The controller only talks to this seam.
#[async_trait]
pub trait DecodeLauncher: Send + Sync {
    /// Start decoding `stream_url` from `start_offset` seconds.
    async fn start(&self, stream_url: &str, start_offset: f64) -> Result<DecodeSession>;
}

/// Arguments for one decode run.
pub fn ffmpeg_args(stream_url: &str, start_offset: f64) -> Vec<String> {
    vec![
        "-ss".to_string(),
        format!("{:.2}", start_offset.max(0.0)),
        "-i".to_string(),
        stream_url.to_string(),
        "-ac".to_string(),
        CHANNELS.to_string(),
        "-f".to_string(),
        "s16le".to_string(),
        "-ar".to_string(),
        SAMPLE_RATE.to_string(),
        "pipe:1".to_string(),
        "-progress".to_string(),
        "pipe:2".to_string(),
    ]
}

/// [`DecodeLauncher`] backed by the `ffmpeg` executable.
#[derive(Clone, Debug)]
pub struct FfmpegLauncher {
    program: String,
}

impl FfmpegLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl DecodeLauncher for FfmpegLauncher {
    async fn start(&self, stream_url: &str, start_offset: f64) -> Result<DecodeSession> {
        let mut child = Command::new(&self.program)
            .args(ffmpeg_args(stream_url, start_offset))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlayerError::SpawnFailed(format!("{}: {e}", self.program)))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.start_kill();
            return Err(PlayerError::SpawnFailed("decoder pipes unavailable".to_string()));
        };

        tracing::debug!(pid = ?child.id(), offset = start_offset, "decoder started");
        let token = CancellationToken::new();
        let reaper = tokio::spawn(reap(child, token.clone()));
        Ok(DecodeSession {
            pcm: Box::new(stdout),
            status: Box::new(stderr),
            handle: ProcessHandle::new(token, Some(reaper)),
        })
    }
}

async fn reap(mut child: Child, token: CancellationToken) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => tracing::debug!(%status, "decoder exited"),
            Err(e) => tracing::debug!(error = %e, "decoder wait failed"),
        },
        _ = token.cancelled() => {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "decoder kill failed");
            }
            if let Err(e) = child.wait().await {
                tracing::debug!(error = %e, "decoder wait after kill failed");
            }
        }
    }
}
