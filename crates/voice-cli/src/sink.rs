//! Frame sink writing the `voice-frame-proto` format to a file or stdout.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::{Interval, MissedTickBehavior};
use voice_frame_proto::{FrameKind, encode_speaking, write_frame, write_prelude};
use voice_player::config::FRAME_DURATION;
use voice_player::{FrameSink, SinkError};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Writes frames at real-time cadence (one per 20 ms).
pub struct FrameFileSink {
    inner: Mutex<SinkInner>,
}

struct SinkInner {
    out: BoxedWriter,
    prelude_written: bool,
    /// Set by `disconnect`; cleared when the next track starts speaking.
    closed: bool,
    pacer: Option<Interval>,
}

impl SinkInner {
    async fn write_record(&mut self, kind: FrameKind, payload: &[u8]) -> std::io::Result<()> {
        let mut buf = Vec::with_capacity(payload.len() + 16);
        if !self.prelude_written {
            write_prelude(&mut buf)?;
        }
        write_frame(&mut buf, kind, payload)?;
        self.out.write_all(&buf).await?;
        self.prelude_written = true;
        self.out.flush().await
    }
}

impl FrameFileSink {
    /// Open `target` for writing; `-` means stdout.
    pub async fn open(target: &str) -> Result<Self> {
        let out: BoxedWriter = if target == "-" {
            Box::new(tokio::io::stdout())
        } else {
            let file = tokio::fs::File::create(target)
                .await
                .with_context(|| format!("create output {target}"))?;
            Box::new(file)
        };
        Ok(Self::from_writer(out))
    }

    pub fn from_writer(out: BoxedWriter) -> Self {
        Self {
            inner: Mutex::new(SinkInner {
                out,
                prelude_written: false,
                closed: false,
                pacer: None,
            }),
        }
    }
}

#[async_trait]
impl FrameSink for FrameFileSink {
    async fn set_speaking(&self, speaking: bool) -> Result<(), SinkError> {
        let mut g = self.inner.lock().await;
        if !speaking {
            g.pacer = None;
            if g.closed {
                return Ok(());
            }
        }
        g.closed = false;
        g.write_record(FrameKind::Speaking, &encode_speaking(speaking))
            .await?;
        Ok(())
    }

    async fn send_frame(&self, frame: Vec<u8>) -> Result<(), SinkError> {
        let mut g = self.inner.lock().await;
        if g.closed {
            return Err(SinkError::NotConnected);
        }
        let pacer = g.pacer.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(FRAME_DURATION);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        pacer.tick().await;
        g.write_record(FrameKind::Audio, &frame).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SinkError> {
        let mut g = self.inner.lock().await;
        g.pacer = None;
        if g.closed {
            return Ok(());
        }
        g.closed = true;
        if g.prelude_written {
            g.write_record(FrameKind::End, &[]).await?;
        }
        Ok(())
    }
}
