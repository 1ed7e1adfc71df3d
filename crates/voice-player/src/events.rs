//! In-process event bus for playback notifications.
//!
//! Front-ends subscribe to learn about track transitions and failures that the
//! controller only logs otherwise.

use tokio::sync::broadcast;

use voice_types::TrackEndReason;

/// Playback notifications published by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    QueueChanged,
    TrackStarted { title: String, offset: f64 },
    TrackEnded { title: String, reason: TrackEndReason },
    /// Spawn, read, encode or lookup failure for one track.
    TrackFailed { title: String, error: String },
    PlaybackStopped,
    /// The playback loop exited; `error` is set when the sink became unavailable.
    LoopFinished { error: Option<String> },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Create a new event bus with a bounded broadcast channel.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    pub fn queue_changed(&self) {
        self.emit(PlayerEvent::QueueChanged);
    }

    pub fn track_started(&self, title: &str, offset: f64) {
        self.emit(PlayerEvent::TrackStarted {
            title: title.to_string(),
            offset,
        });
    }

    pub fn track_ended(&self, title: &str, reason: TrackEndReason) {
        self.emit(PlayerEvent::TrackEnded {
            title: title.to_string(),
            reason,
        });
    }

    pub fn track_failed(&self, title: &str, error: &dyn std::fmt::Display) {
        self.emit(PlayerEvent::TrackFailed {
            title: title.to_string(),
            error: error.to_string(),
        });
    }

    pub fn playback_stopped(&self) {
        self.emit(PlayerEvent::PlaybackStopped);
    }

    pub fn loop_finished(&self, error: Option<String>) {
        self.emit(PlayerEvent::LoopFinished { error });
    }

    fn emit(&self, event: PlayerEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
