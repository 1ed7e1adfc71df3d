//! Periodic "now playing" refresh.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use voice_types::NowPlayingStatus;

/// Presentation-layer hook invoked with a fresh status sample on every tick.
pub trait StatusListener: Send + Sync {
    fn publish(&self, status: &NowPlayingStatus);
}

/// Spawn a task that samples `source` every `interval` and forwards `Some` results.
///
/// Ticks where `source` returns `None` (no current track) are skipped. The task ends
/// when `cancel` fires.
pub fn spawn_refresh<F>(
    interval: Duration,
    cancel: CancellationToken,
    listener: std::sync::Arc<dyn StatusListener>,
    source: F,
) -> JoinHandle<()>
where
    F: Fn() -> Option<NowPlayingStatus> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(status) = source() {
                        listener.publish(&status);
                    }
                }
            }
        }
    })
}
