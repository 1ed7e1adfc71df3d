//! Real-time audio playback engine for voice sinks.
//!
//! Tracks are resolved into [`TrackDescriptor`]s, decoded by an external process into
//! 48 kHz stereo PCM, re-encoded into 20 ms Opus frames and pushed to a [`FrameSink`].
//! [`PlaybackController`] owns the queue and exposes play/pause/resume/skip/stop/restart.

pub mod config;
pub mod controller;
pub mod decode;
pub mod encoder;
pub mod error;
pub mod events;
pub mod metadata;
pub mod progress;
pub mod queue;
pub mod sink;
pub mod state;
pub mod status;
pub mod track;

pub use config::PlayerConfig;
pub use controller::{Collaborators, PlaybackController};
pub use decode::{DecodeLauncher, DecodeSession, FfmpegLauncher, ProcessHandle};
pub use error::{PlayerError, Result};
pub use events::{EventBus, PlayerEvent};
pub use metadata::{TrackResolver, YtDlpResolver};
pub use queue::QueueManager;
pub use sink::{FrameSink, SinkError};
pub use status::StatusListener;
pub use track::{TrackDescriptor, format_duration, parse_duration_text};
