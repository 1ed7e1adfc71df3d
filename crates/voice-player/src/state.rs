//! Playback bookkeeping shared between the controller loop and control operations.
//!
//! [`PlaybackState`] and [`PlayingFlag`] each own their own mutex, separate from the
//! queue's. No operation holds two of them at once, so cross-domain reads (current
//! track plus pause flag) may be briefly stale.

use std::sync::{Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use voice_types::PlaybackPhase;

use crate::track::TrackDescriptor;

/// Progress of a restart request.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RestartStage {
    #[default]
    Idle,
    /// Session torn down, re-resolution in flight.
    Pending,
    /// Fresh descriptor ready to become current.
    Ready(TrackDescriptor),
    /// Re-resolution failed; the track is dropped.
    Failed,
}

#[derive(Debug, Default)]
struct StateInner {
    position: f64,
    baseline: f64,
    paused: bool,
    skip: bool,
    draining: bool,
    restart: RestartStage,
    /// Bumped by every stop; sessions started under an older epoch are stale.
    epoch: u64,
    next_session_id: u64,
    session: Option<ActiveSession>,
}

#[derive(Debug)]
struct ActiveSession {
    id: u64,
    token: CancellationToken,
}

impl StateInner {
    fn reset_fields(&mut self) {
        self.position = 0.0;
        self.baseline = 0.0;
        self.paused = false;
        self.skip = false;
        self.draining = false;
    }

    fn cancel_session(&self) {
        if let Some(session) = &self.session {
            session.token.cancel();
        }
    }
}

/// Copy of the playback fields at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct StateSnapshot {
    pub position: f64,
    pub baseline: f64,
    pub paused: bool,
    pub skip_requested: bool,
    pub session_active: bool,
    pub phase: PlaybackPhase,
}

impl StateSnapshot {
    /// Seconds into the track: session start offset plus reported progress.
    pub fn elapsed(&self) -> f64 {
        self.baseline + self.position
    }
}

#[derive(Debug, Default)]
pub struct PlaybackState {
    inner: Mutex<StateInner>,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StateInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Offset the next decode session should seek to.
    ///
    /// `baseline + position` when progress has been reported, otherwise `baseline`.
    /// Both are zero for a fresh track.
    pub fn start_offset(&self) -> f64 {
        let g = self.lock();
        if g.position > 0.0 {
            g.baseline + g.position
        } else {
            g.baseline
        }
    }

    /// Register a decode session that started at `offset`.
    ///
    /// Returns the session id, or `None` when a skip, restart or stop arrived while
    /// the process was starting; the caller must then kill it.
    pub fn begin_session(&self, token: CancellationToken, epoch: u64, offset: f64) -> Option<u64> {
        let mut g = self.lock();
        if g.skip || g.restart != RestartStage::Idle || g.epoch != epoch {
            return None;
        }
        g.cancel_session();
        g.next_session_id += 1;
        let id = g.next_session_id;
        g.session = Some(ActiveSession { id, token });
        g.baseline = offset;
        g.position = 0.0;
        g.draining = false;
        Some(id)
    }

    /// Forget the session handle. Position stays readable until the next reset.
    pub fn end_session(&self, id: u64) {
        let mut g = self.lock();
        if g.session.as_ref().is_some_and(|s| s.id == id) {
            g.session = None;
            g.draining = true;
        }
    }

    /// Record elapsed seconds reported by session `id`; stale sessions are ignored.
    pub fn set_position(&self, id: u64, position: f64) {
        let mut g = self.lock();
        if g.session.as_ref().is_some_and(|s| s.id == id) {
            g.position = position;
        }
    }

    /// Set the pause flag; returns `false` when it already had that value.
    pub fn set_paused(&self, paused: bool) -> bool {
        let mut g = self.lock();
        if g.paused == paused {
            return false;
        }
        g.paused = paused;
        true
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Flag a skip and cancel the running session, if any.
    pub fn request_skip(&self) {
        let mut g = self.lock();
        g.skip = true;
        g.cancel_session();
    }

    /// Consume the skip flag.
    pub fn take_skip(&self) -> bool {
        std::mem::take(&mut self.lock().skip)
    }

    /// Enter the restart stage: cancel the session and zero the fields.
    ///
    /// Returns the epoch the restart belongs to.
    pub fn begin_restart(&self) -> u64 {
        let mut g = self.lock();
        g.cancel_session();
        g.reset_fields();
        g.restart = RestartStage::Pending;
        g.epoch
    }

    /// Complete a restart started under `epoch`. Returns `false` if a stop intervened.
    pub fn finish_restart(&self, epoch: u64, fresh: Option<TrackDescriptor>) -> bool {
        let mut g = self.lock();
        if g.epoch != epoch || g.restart != RestartStage::Pending {
            return false;
        }
        g.restart = match fresh {
            Some(track) => RestartStage::Ready(track),
            None => RestartStage::Failed,
        };
        true
    }

    pub fn restart_pending(&self) -> bool {
        self.lock().restart == RestartStage::Pending
    }

    /// Take a settled restart outcome, leaving `Pending` untouched.
    pub fn take_restart(&self) -> RestartStage {
        let mut g = self.lock();
        if g.restart == RestartStage::Pending {
            return RestartStage::Pending;
        }
        std::mem::take(&mut g.restart)
    }

    /// Stop: invalidate the epoch, cancel the session and zero everything.
    pub fn stop(&self) {
        let mut g = self.lock();
        g.epoch += 1;
        g.cancel_session();
        g.reset_fields();
        g.restart = RestartStage::Idle;
    }

    /// Zero position, baseline, pause and skip after a track settles.
    pub fn reset(&self) {
        self.lock().reset_fields();
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let g = self.lock();
        let session_active = g.session.is_some();
        let phase = if g.restart == RestartStage::Pending {
            PlaybackPhase::Restarting
        } else if g.draining || (g.skip && session_active) {
            PlaybackPhase::Draining
        } else if session_active && g.paused {
            PlaybackPhase::Paused
        } else if session_active {
            PlaybackPhase::Playing
        } else {
            PlaybackPhase::Idle
        };
        StateSnapshot {
            position: g.position,
            baseline: g.baseline,
            paused: g.paused,
            skip_requested: g.skip,
            session_active,
            phase,
        }
    }
}

/// "Currently playing" flag: set while a playback loop task is alive.
#[derive(Debug, Default)]
pub struct PlayingFlag {
    inner: Mutex<bool>,
}

impl PlayingFlag {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the flag. Returns `true` if the caller should start a loop.
    pub fn try_begin(&self) -> bool {
        let mut g = self.lock();
        if *g {
            return false;
        }
        *g = true;
        true
    }

    pub fn end(&self) {
        *self.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.lock()
    }
}
