//! Pending tracks plus the "currently playing" slot.
//!
//! Both live under one mutex: popping the head must be atomic with the
//! "is the current slot empty" check, otherwise two callers could promote two tracks.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use voice_types::QueueSnapshot;

use crate::track::TrackDescriptor;

#[derive(Debug, Default)]
struct QueueInner {
    pending: VecDeque<TrackDescriptor>,
    current: Option<TrackDescriptor>,
}

/// FIFO of pending tracks feeding the playback loop.
///
/// A track is either pending, current, or absent. No operation blocks beyond the
/// mutex or fails.
#[derive(Debug, Default)]
pub struct QueueManager {
    inner: Mutex<QueueInner>,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a track to the tail.
    pub fn enqueue(&self, track: TrackDescriptor) {
        self.lock().pending.push_back(track);
    }

    /// Return the current track, promoting the head of the queue when the slot is empty.
    ///
    /// Idempotent while a track is mid-playback.
    pub fn peek_or_pop_current(&self) -> Option<TrackDescriptor> {
        let mut g = self.lock();
        if g.current.is_none() {
            g.current = g.pending.pop_front();
        }
        g.current.clone()
    }

    /// Current track without promoting anything.
    pub fn current(&self) -> Option<TrackDescriptor> {
        self.lock().current.clone()
    }

    /// Replace the current slot (used by restart with a freshly resolved descriptor).
    pub fn set_current(&self, track: TrackDescriptor) {
        self.lock().current = Some(track);
    }

    /// Drop the current track, returning it.
    pub fn clear_current(&self) -> Option<TrackDescriptor> {
        self.lock().current.take()
    }

    /// Empty both the pending sequence and the current slot.
    pub fn clear(&self) {
        let mut g = self.lock();
        g.pending.clear();
        g.current = None;
    }

    /// Whether a track is current or waiting.
    pub fn has_work(&self) -> bool {
        let g = self.lock();
        g.current.is_some() || !g.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Ordered copy for listings.
    pub fn snapshot(&self) -> QueueSnapshot {
        let g = self.lock();
        QueueSnapshot {
            current: g.current.as_ref().map(TrackDescriptor::to_item),
            pending: g.pending.iter().map(TrackDescriptor::to_item).collect(),
        }
    }
}
