//! Elapsed-time samples parsed from the decoder's status stream.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, oneshot};

/// Receiving half of a running progress tracker.
pub struct ProgressFeed {
    /// Elapsed seconds, one value per `out_time=` line. Closed at end of stream.
    pub updates: mpsc::Receiver<f64>,
    /// Fires exactly once: `Ok` at end of stream, or the read error.
    pub done: oneshot::Receiver<io::Result<()>>,
}

/// Parse an `out_time=H:M:S[.fraction]` status line into seconds.
///
/// Anything else (other attributes, `N/A`, negative stamps) yields `None`.
pub fn parse_out_time(line: &str) -> Option<f64> {
    let value = line.trim().strip_prefix("out_time=")?;
    let mut parts = value.split(':');
    let hours = parse_component(parts.next()?)?;
    let minutes = parse_component(parts.next()?)?;
    let seconds = parse_component(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn parse_component(part: &str) -> Option<f64> {
    let v = part.parse::<f64>().ok()?;
    (v.is_finite() && v >= 0.0 && !part.starts_with('-')).then_some(v)
}

/// Spawn a task that reads `status` line by line and publishes elapsed-time samples.
///
/// The stream is drained to the end even after the update receiver is dropped, so
/// the decoder never blocks on a full status pipe.
pub fn spawn_tracker<R>(status: R, buffer: usize) -> ProgressFeed
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, updates) = mpsc::channel(buffer.max(1));
    let (done_tx, done) = oneshot::channel();

    tokio::spawn(async move {
        let result = track(status, tx).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "progress stream read failed");
        }
        let _ = done_tx.send(result);
    });

    ProgressFeed { updates, done }
}

async fn track<R>(status: R, tx: mpsc::Sender<f64>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(status);
    let mut raw = Vec::new();
    let mut tx = Some(tx);
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }
        // Log lines share the pipe and may carry metadata in any encoding.
        let line = String::from_utf8_lossy(&raw);
        let Some(elapsed) = parse_out_time(&line) else {
            continue;
        };
        if let Some(sender) = &tx {
            if sender.send(elapsed).await.is_err() {
                tx = None;
            }
        }
    }
    Ok(())
}
