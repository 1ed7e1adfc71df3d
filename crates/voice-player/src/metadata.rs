//! Track metadata lookup.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{PlayerError, Result};
use crate::track::{TrackDescriptor, parse_duration_text};

/// Resolves a request reference (page URL) into a playable [`TrackDescriptor`].
///
/// May be slow; callers invoke it without holding any lock.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, request: &str) -> Result<TrackDescriptor>;
}

/// [`TrackResolver`] backed by the `yt-dlp` executable.
#[derive(Clone, Debug)]
pub struct YtDlpResolver {
    program: String,
    default_thumbnail: String,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>, default_thumbnail: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            default_thumbnail: default_thumbnail.into(),
        }
    }

    fn args(request: &str) -> [&str; 7] {
        [
            "-f",
            "bestaudio",
            "--get-title",
            "--get-url",
            "--get-duration",
            "--get-thumbnail",
            request,
        ]
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, request: &str) -> Result<TrackDescriptor> {
        let output = Command::new(&self.program)
            .args(Self::args(request))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PlayerError::LookupFailed(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(request, status = %output.status, "metadata lookup failed");
            return Err(PlayerError::LookupFailed(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_lookup_output(&stdout, request, &self.default_thumbnail)
    }
}

/// Build a descriptor from lookup output: title, stream URL, thumbnail, duration.
pub fn parse_lookup_output(
    stdout: &str,
    request: &str,
    default_thumbnail: &str,
) -> Result<TrackDescriptor> {
    let lines: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let [title, stream_url, thumbnail, duration, ..] = lines.as_slice() else {
        return Err(PlayerError::LookupFailed(
            "could not fetch all song information".to_string(),
        ));
    };

    let thumbnail = if thumbnail.starts_with("http") {
        thumbnail.to_string()
    } else {
        default_thumbnail.to_string()
    };
    let duration_secs = parse_duration_text(duration).unwrap_or_else(|| {
        tracing::debug!(request, duration, "unparsable duration, using 0");
        0
    });

    Ok(TrackDescriptor::new(
        *title,
        *stream_url,
        duration_secs,
        thumbnail,
        request,
    ))
}
