//! Playback controller: queue draining, frame pump and control operations.
//!
//! One loop task drains the queue while the [`PlayingFlag`] is held. For each track it
//! starts a decode session, spawns the progress tracker and its consumer, and pumps
//! 3840-byte PCM blocks through the encoder into the sink until end of stream or
//! cancellation. Control operations never touch the process directly; they flip
//! state and cancel the session token.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use voice_types::{NowPlayingStatus, QueueSnapshot, TrackEndReason};

use crate::config::{BLOCK_BYTES, PlayerConfig};
use crate::decode::{BoxedReader, DecodeLauncher};
use crate::encoder::FrameEncoder;
use crate::error::{PlayerError, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::metadata::TrackResolver;
use crate::progress::{self, ProgressFeed};
use crate::queue::QueueManager;
use crate::sink::FrameSink;
use crate::state::{PlaybackState, PlayingFlag, RestartStage};
use crate::status::{self, StatusListener};
use crate::track::TrackDescriptor;

/// External collaborators the controller drives.
pub struct Collaborators {
    pub resolver: Arc<dyn TrackResolver>,
    pub launcher: Arc<dyn DecodeLauncher>,
    pub sink: Arc<dyn FrameSink>,
    pub status: Option<Arc<dyn StatusListener>>,
}

/// How one decode session ended.
#[derive(Debug)]
enum SessionEnd {
    Eof,
    Cancelled,
    /// Spawn, read, encode or watchdog failure. Only this track is affected.
    Aborted(PlayerError),
}

struct Shared {
    config: PlayerConfig,
    queue: QueueManager,
    state: Arc<PlaybackState>,
    playing: PlayingFlag,
    /// Signalled on resume, skip, stop and restart transitions.
    wake: Notify,
    events: EventBus,
    resolver: Arc<dyn TrackResolver>,
    launcher: Arc<dyn DecodeLauncher>,
    sink: Arc<dyn FrameSink>,
    status: Option<Arc<dyn StatusListener>>,
}

/// Handle to the playback engine. Cheap to clone.
///
/// Operations that may start the playback loop must be called from within a Tokio
/// runtime.
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<Shared>,
}

impl PlaybackController {
    pub fn new(config: PlayerConfig, parts: Collaborators) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                queue: QueueManager::new(),
                state: Arc::new(PlaybackState::new()),
                playing: PlayingFlag::default(),
                wake: Notify::new(),
                events: EventBus::new(),
                resolver: parts.resolver,
                launcher: parts.launcher,
                sink: parts.sink,
                status: parts.status,
            }),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PlayerEvent> {
        self.shared.events.subscribe()
    }

    /// Resolve `request`, queue the result and make sure the loop is running.
    pub async fn play(&self, request: &str) -> Result<TrackDescriptor> {
        let track = match self.shared.resolver.resolve(request).await {
            Ok(track) => track,
            Err(e) => {
                tracing::warn!(request, error = %e, "lookup failed");
                self.shared.events.track_failed(request, &e);
                return Err(e);
            }
        };
        self.enqueue(track.clone());
        Ok(track)
    }

    /// Queue an already resolved track. Starts the loop when none is active.
    pub fn enqueue(&self, track: TrackDescriptor) {
        self.shared.queue.enqueue(track.clone());
        tracing::info!(
            title = %track.title,
            duration = %track.duration_text,
            pending = self.shared.queue.pending_len(),
            "track queued"
        );
        self.shared.events.queue_changed();
        self.ensure_loop();
    }

    /// Suspend frame delivery. Returns `false` if already paused or nothing is playing.
    ///
    /// The current-track check and the pause flag live under different locks. A track
    /// that ends naturally in between hands the pause to the next track, which then
    /// starts paused.
    pub fn pause(&self) -> bool {
        if self.shared.queue.current().is_none() {
            return false;
        }
        let changed = self.shared.state.set_paused(true);
        if changed {
            tracing::info!("playback paused");
        }
        changed
    }

    /// Resume frame delivery. Returns `false` if not paused.
    pub fn resume(&self) -> bool {
        let changed = self.shared.state.set_paused(false);
        if changed {
            tracing::info!("playback resumed");
            self.shared.wake.notify_waiters();
        }
        changed
    }

    /// Abandon the current track and advance. Returns `false` if nothing is playing.
    ///
    /// As with [`pause`](Self::pause), a track that ends naturally right after the
    /// check passes the request on: the next track is refused at session start and
    /// reported as skipped.
    pub fn skip(&self) -> bool {
        let Some(track) = self.shared.queue.current() else {
            return false;
        };
        tracing::info!(title = %track.title, "skip requested");
        self.shared.state.request_skip();
        self.shared.wake.notify_waiters();
        true
    }

    /// Clear the queue, kill the session, reset state and disconnect the sink.
    pub async fn stop(&self) {
        tracing::info!("stop requested");
        self.shared.queue.clear();
        self.shared.state.stop();
        self.shared.wake.notify_waiters();
        if let Err(e) = self.shared.sink.disconnect().await {
            tracing::warn!(error = %e, "sink disconnect failed");
        }
        self.shared.events.playback_stopped();
        self.shared.events.queue_changed();
    }

    /// Tear down the current session and replay a freshly resolved copy from zero.
    pub async fn restart(&self) -> Result<TrackDescriptor> {
        let shared = &self.shared;
        let current = shared.queue.current().ok_or(PlayerError::NothingPlaying)?;
        tracing::info!(title = %current.title, "restart requested");

        let epoch = shared.state.begin_restart();
        shared.wake.notify_waiters();

        let resolved = shared.resolver.resolve(&current.request).await;
        let outcome = match resolved {
            Ok(fresh) => {
                if shared.state.finish_restart(epoch, Some(fresh.clone())) {
                    Ok(fresh)
                } else {
                    tracing::info!(title = %current.title, "restart superseded by stop");
                    Err(PlayerError::NothingPlaying)
                }
            }
            Err(e) => {
                tracing::warn!(title = %current.title, error = %e, "restart lookup failed");
                shared.state.finish_restart(epoch, None);
                shared.events.track_failed(&current.title, &e);
                Err(e)
            }
        };
        shared.wake.notify_waiters();
        self.ensure_loop();
        outcome
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.shared.queue.snapshot()
    }

    /// Current track with position and pause state, `None` when nothing is current.
    pub fn now_playing(&self) -> Option<NowPlayingStatus> {
        self.shared.now_playing()
    }

    /// Whether a playback loop task is alive.
    pub fn is_active(&self) -> bool {
        self.shared.playing.is_set()
    }

    fn ensure_loop(&self) {
        if self.shared.playing.try_begin() {
            tokio::spawn(run_loop(self.shared.clone()));
        }
    }
}

async fn run_loop(shared: Arc<Shared>) {
    loop {
        let refresh_cancel = CancellationToken::new();
        let refresh = shared.status.clone().map(|listener| {
            let source = shared.clone();
            status::spawn_refresh(
                shared.config.status_interval(),
                refresh_cancel.clone(),
                listener,
                move || source.now_playing(),
            )
        });

        let result = shared.drain_queue().await;

        refresh_cancel.cancel();
        if let Some(handle) = refresh {
            let _ = handle.await;
        }

        let error = match &result {
            Ok(()) => {
                tracing::info!("queue drained");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "playback loop aborted");
                Some(e.to_string())
            }
        };
        shared.playing.end();
        shared.events.loop_finished(error);

        // A track queued while the loop was winding down would otherwise be stranded.
        if result.is_err() || !shared.queue.has_work() || !shared.playing.try_begin() {
            break;
        }
    }
}

impl Shared {
    fn now_playing(&self) -> Option<NowPlayingStatus> {
        let track = self.queue.current()?;
        let snap = self.state.snapshot();
        Some(NowPlayingStatus {
            title: track.title,
            elapsed_secs: snap.elapsed(),
            total_secs: track.duration_secs,
            paused: snap.paused,
            thumbnail: track.thumbnail,
            phase: snap.phase,
        })
    }

    async fn drain_queue(&self) -> Result<()> {
        loop {
            self.apply_restart_outcome();
            let epoch = self.state.epoch();
            let Some(track) = self.queue.peek_or_pop_current() else {
                return Ok(());
            };

            match self.play_track(&track, epoch).await {
                Ok(end) => self.settle(&track, end, epoch).await,
                Err(e) => {
                    self.queue.clear_current();
                    self.state.reset();
                    self.events.track_ended(&track.title, TrackEndReason::Error);
                    return Err(e);
                }
            }
        }
    }

    /// Run one decode session for `track`. `Err` only for sink failures.
    async fn play_track(&self, track: &TrackDescriptor, epoch: u64) -> Result<SessionEnd> {
        let offset = self.state.start_offset();
        let session = match self.launcher.start(&track.stream_url, offset).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(title = %track.title, error = %e, "decoder spawn failed");
                return Ok(SessionEnd::Aborted(e));
            }
        };

        let token = session.handle.token();
        let Some(session_id) = self.state.begin_session(token.clone(), epoch, offset) else {
            session.handle.shutdown().await;
            return Ok(SessionEnd::Cancelled);
        };

        if let Err(e) = self.sink.set_speaking(true).await {
            session.handle.shutdown().await;
            self.state.end_session(session_id);
            return Err(e.into());
        }

        tracing::info!(title = %track.title, offset, "track started");
        self.events.track_started(&track.title, offset);

        let feed = progress::spawn_tracker(session.status, self.config.progress_buffer);
        let consumer = tokio::spawn(consume_progress(
            self.state.clone(),
            feed,
            session_id,
            token.clone(),
            self.config.stall_timeout(),
        ));

        let pumped = self.pump(session.pcm, &token, &track.title).await;

        session.handle.shutdown().await;
        let stalled = consumer.await.unwrap_or(false);
        self.state.end_session(session_id);

        if let Err(e) = self.sink.set_speaking(false).await {
            tracing::debug!(error = %e, "clearing speaking flag failed");
        }

        match pumped? {
            SessionEnd::Cancelled if stalled => Ok(SessionEnd::Aborted(
                PlayerError::StreamReadFailed("no decoder progress before stall timeout".to_string()),
            )),
            end => Ok(end),
        }
    }

    /// Move PCM blocks from the decoder to the sink until EOF or cancellation.
    async fn pump(
        &self,
        mut pcm: BoxedReader,
        token: &CancellationToken,
        title: &str,
    ) -> Result<SessionEnd> {
        let mut encoder = match FrameEncoder::new(self.config.bitrate_bps) {
            Ok(encoder) => encoder,
            Err(e) => {
                tracing::error!(title, error = %e, "encoder init failed");
                return Ok(SessionEnd::Aborted(e));
            }
        };
        let mut block = vec![0u8; BLOCK_BYTES];

        loop {
            // Not reading lets the pipe fill, which stalls the decoder at the pause point.
            if self.state.is_paused() {
                let resumed = self.wake.notified();
                if self.state.is_paused() {
                    tokio::select! {
                        _ = resumed => {}
                        _ = token.cancelled() => return Ok(SessionEnd::Cancelled),
                    }
                }
                continue;
            }

            let read = tokio::select! {
                r = read_block(&mut pcm, &mut block) => r,
                _ = token.cancelled() => return Ok(SessionEnd::Cancelled),
            };
            let filled = match read {
                Ok(0) => return Ok(SessionEnd::Eof),
                Ok(n) => n,
                Err(e) => {
                    if token.is_cancelled() {
                        return Ok(SessionEnd::Cancelled);
                    }
                    tracing::warn!(title, error = %e, "decoder read failed");
                    return Ok(SessionEnd::Aborted(PlayerError::StreamReadFailed(e.to_string())));
                }
            };
            if filled < BLOCK_BYTES {
                block[filled..].fill(0);
            }

            let frame = match encoder.encode(&block) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(title, error = %e, "frame encode failed");
                    return Ok(SessionEnd::Aborted(e));
                }
            };

            if let Err(e) = self.sink.send_frame(frame).await {
                if token.is_cancelled() {
                    return Ok(SessionEnd::Cancelled);
                }
                let e = PlayerError::from(e);
                if !e.is_fatal() {
                    tracing::warn!(title, error = %e, "frame dropped by sink");
                    return Ok(SessionEnd::Aborted(e));
                }
                tracing::error!(title, error = %e, "sink rejected frame");
                return Err(e);
            }

            if filled < BLOCK_BYTES {
                return Ok(SessionEnd::Eof);
            }
        }
    }

    /// Decide what happens to the current slot after a session ends.
    async fn settle(&self, track: &TrackDescriptor, end: SessionEnd, epoch: u64) {
        while self.state.restart_pending() {
            let changed = self.wake.notified();
            if !self.state.restart_pending() {
                break;
            }
            changed.await;
        }

        if self.state.epoch() != epoch {
            tracing::info!(title = %track.title, "track stopped");
            self.events.track_ended(&track.title, TrackEndReason::Stopped);
            return;
        }

        if self.state.take_skip() {
            tracing::info!(title = %track.title, "track skipped");
            self.finish_track(track, TrackEndReason::Skipped);
            return;
        }

        match self.state.take_restart() {
            RestartStage::Ready(fresh) => {
                tracing::info!(title = %fresh.title, "restarting from the beginning");
                self.events.track_ended(&track.title, TrackEndReason::Restarted);
                self.state.reset();
                self.queue.set_current(fresh);
                if self.state.epoch() != epoch {
                    self.queue.clear_current();
                }
                return;
            }
            RestartStage::Failed => {
                self.finish_track(track, TrackEndReason::Restarted);
                return;
            }
            RestartStage::Idle | RestartStage::Pending => {}
        }

        match end {
            SessionEnd::Eof => {
                tracing::info!(title = %track.title, "track finished");
                self.finish_track(track, TrackEndReason::Eof);
            }
            SessionEnd::Cancelled => {
                tracing::debug!(title = %track.title, "session cancelled");
                self.finish_track(track, TrackEndReason::Error);
            }
            SessionEnd::Aborted(e) => {
                self.events.track_failed(&track.title, &e);
                self.finish_track(track, TrackEndReason::Error);
            }
        }
    }

    fn finish_track(&self, track: &TrackDescriptor, reason: TrackEndReason) {
        self.queue.clear_current();
        self.state.reset();
        self.events.track_ended(&track.title, reason);
        self.events.queue_changed();
    }

    /// Apply a restart that settled while no session was running.
    fn apply_restart_outcome(&self) {
        match self.state.take_restart() {
            RestartStage::Ready(fresh) => {
                self.state.reset();
                self.queue.set_current(fresh);
            }
            RestartStage::Failed => {
                self.queue.clear_current();
                self.state.reset();
            }
            RestartStage::Idle | RestartStage::Pending => {}
        }
    }
}

/// Feed progress samples into the state; optionally cancel a stalled session.
///
/// Returns `true` if the stall watchdog fired. Runs until the tracker closes the
/// update channel, which happens once the decoder's status stream ends.
async fn consume_progress(
    state: Arc<PlaybackState>,
    mut feed: ProgressFeed,
    session_id: u64,
    token: CancellationToken,
    stall_timeout: Option<Duration>,
) -> bool {
    let mut stalled = false;
    loop {
        let next = match stall_timeout {
            Some(limit) if !stalled => {
                match tokio::time::timeout(limit, feed.updates.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        if !state.is_paused() && !token.is_cancelled() {
                            tracing::warn!(
                                timeout_ms = limit.as_millis() as u64,
                                "decoder stalled, killing session"
                            );
                            stalled = true;
                            token.cancel();
                        }
                        continue;
                    }
                }
            }
            _ => feed.updates.recv().await,
        };
        match next {
            Some(position) => state.set_position(session_id, position),
            None => break,
        }
    }
    if let Ok(Err(e)) = feed.done.await {
        tracing::debug!(error = %e, "progress tracker ended with error");
    }
    stalled
}

/// Fill `buf` from `reader` until it is full or the stream ends. Returns bytes read.
async fn read_block<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::broadcast;

    use crate::decode::{DecodeSession, ProcessHandle};
    use crate::sink::SinkError;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Clone)]
    enum Pcm {
        Bytes(u64),
        Endless,
        Hang,
    }

    #[derive(Clone)]
    struct Script {
        pcm: Pcm,
        status: String,
        spawn_fails: bool,
        /// Decoder exits right away; its output stays buffered in the pipes.
        exits_early: bool,
    }

    impl Script {
        fn bytes(n: u64) -> Self {
            Self {
                pcm: Pcm::Bytes(n),
                status: String::new(),
                spawn_fails: false,
                exits_early: false,
            }
        }

        fn endless() -> Self {
            Self {
                pcm: Pcm::Endless,
                ..Self::bytes(0)
            }
        }

        fn with_status(mut self, status: &str) -> Self {
            self.status = status.to_string();
            self
        }
    }

    /// Resolves `name` to a track whose stream URL carries a per-lookup counter.
    #[derive(Default)]
    struct FakeResolver {
        lookups: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl TrackResolver for FakeResolver {
        async fn resolve(&self, request: &str) -> Result<TrackDescriptor> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PlayerError::LookupFailed("unavailable".into()));
            }
            let n = self.lookups.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TrackDescriptor::new(
                request,
                format!("{request}#{n}"),
                120,
                "https://img",
                request,
            ))
        }
    }

    #[derive(Default)]
    struct FakeLauncher {
        scripts: Mutex<HashMap<String, Script>>,
        starts: Mutex<Vec<(String, f64)>>,
    }

    impl FakeLauncher {
        fn script(&self, name: &str, script: Script) {
            self.scripts.lock().unwrap().insert(name.to_string(), script);
        }

        fn starts(&self) -> Vec<(String, f64)> {
            self.starts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DecodeLauncher for FakeLauncher {
        async fn start(&self, stream_url: &str, start_offset: f64) -> Result<DecodeSession> {
            self.starts
                .lock()
                .unwrap()
                .push((stream_url.to_string(), start_offset));
            let name = stream_url.split('#').next().unwrap_or_default();
            let script = self
                .scripts
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .unwrap_or_else(|| Script::bytes(0));
            if script.spawn_fails {
                return Err(PlayerError::SpawnFailed("no such decoder".into()));
            }

            let (mut status_tx, status_rx) = tokio::io::duplex(4096);
            status_tx.write_all(script.status.as_bytes()).await.unwrap();
            let (hang_tx, hang_rx) = tokio::io::duplex(64);
            let pcm: BoxedReader = match script.pcm {
                Pcm::Bytes(n) => Box::new(tokio::io::repeat(7).take(n)),
                Pcm::Endless => Box::new(tokio::io::repeat(0)),
                Pcm::Hang => Box::new(hang_rx),
            };

            let token = CancellationToken::new();
            let killed = token.clone();
            let reaper = if script.exits_early {
                drop(status_tx);
                drop(hang_tx);
                tokio::spawn(async {})
            } else {
                tokio::spawn(async move {
                    killed.cancelled().await;
                    drop(status_tx);
                    drop(hang_tx);
                })
            };
            Ok(DecodeSession {
                pcm,
                status: Box::new(status_rx),
                handle: ProcessHandle::new(token, Some(reaper)),
            })
        }
    }

    #[derive(Default)]
    struct FakeSink {
        frames: AtomicUsize,
        disconnects: AtomicUsize,
        speaking: Mutex<Vec<bool>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl FrameSink for FakeSink {
        async fn set_speaking(&self, speaking: bool) -> std::result::Result<(), SinkError> {
            self.speaking.lock().unwrap().push(speaking);
            Ok(())
        }

        async fn send_frame(&self, frame: Vec<u8>) -> std::result::Result<(), SinkError> {
            assert!(!frame.is_empty());
            if self.fail.load(Ordering::SeqCst) {
                return Err(SinkError::NotConnected);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            self.frames.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> std::result::Result<(), SinkError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectStatus(Mutex<Vec<NowPlayingStatus>>);

    impl StatusListener for CollectStatus {
        fn publish(&self, status: &NowPlayingStatus) {
            self.0.lock().unwrap().push(status.clone());
        }
    }

    struct Harness {
        controller: PlaybackController,
        resolver: Arc<FakeResolver>,
        launcher: Arc<FakeLauncher>,
        sink: Arc<FakeSink>,
        status: Arc<CollectStatus>,
        events: broadcast::Receiver<PlayerEvent>,
    }

    fn harness(config: PlayerConfig) -> Harness {
        let resolver = Arc::new(FakeResolver::default());
        let launcher = Arc::new(FakeLauncher::default());
        let sink = Arc::new(FakeSink::default());
        let status = Arc::new(CollectStatus::default());
        let controller = PlaybackController::new(
            config,
            Collaborators {
                resolver: resolver.clone(),
                launcher: launcher.clone(),
                sink: sink.clone(),
                status: Some(status.clone()),
            },
        );
        let events = controller.subscribe();
        Harness {
            controller,
            resolver,
            launcher,
            sink,
            status,
            events,
        }
    }

    impl Harness {
        async fn next_matching(&mut self, pred: impl Fn(&PlayerEvent) -> bool) -> PlayerEvent {
            tokio::time::timeout(WAIT, async {
                loop {
                    let event = self.events.recv().await.unwrap();
                    if pred(&event) {
                        return event;
                    }
                }
            })
            .await
            .expect("timed out waiting for event")
        }

        async fn started(&mut self, title: &str) -> f64 {
            match self
                .next_matching(|e| matches!(e, PlayerEvent::TrackStarted { title: t, .. } if t == title))
                .await
            {
                PlayerEvent::TrackStarted { offset, .. } => offset,
                _ => unreachable!(),
            }
        }

        async fn ended(&mut self, title: &str) -> TrackEndReason {
            match self
                .next_matching(|e| matches!(e, PlayerEvent::TrackEnded { title: t, .. } if t == title))
                .await
            {
                PlayerEvent::TrackEnded { reason, .. } => reason,
                _ => unreachable!(),
            }
        }

        async fn loop_finished(&mut self) -> Option<String> {
            match self
                .next_matching(|e| matches!(e, PlayerEvent::LoopFinished { .. }))
                .await
            {
                PlayerEvent::LoopFinished { error } => error,
                _ => unreachable!(),
            }
        }
    }

    #[tokio::test]
    async fn plays_queue_in_order_and_resets_between_tracks() {
        let mut h = harness(PlayerConfig::default());
        h.launcher.script(
            "a",
            Script::bytes(BLOCK_BYTES as u64 * 5 + 100).with_status("out_time=00:01:00.000\n"),
        );
        h.launcher.script("b", Script::bytes(BLOCK_BYTES as u64 * 2));

        h.controller.play("a").await.unwrap();
        h.controller.play("b").await.unwrap();

        assert_eq!(h.started("a").await, 0.0);
        assert_eq!(h.ended("a").await, TrackEndReason::Eof);
        assert_eq!(h.started("b").await, 0.0);
        assert_eq!(h.ended("b").await, TrackEndReason::Eof);
        assert_eq!(h.loop_finished().await, None);

        assert_eq!(h.sink.frames.load(Ordering::SeqCst), 6 + 2);
        let starts = h.launcher.starts();
        assert_eq!(starts.len(), 2);
        assert!(starts.iter().all(|(_, offset)| *offset == 0.0));
        assert!(h.controller.queue_snapshot().is_empty());
        assert!(h.controller.now_playing().is_none());
        assert!(!h.controller.is_active());
        assert_eq!(*h.sink.speaking.lock().unwrap(), vec![true, false, true, false]);
    }

    #[tokio::test]
    async fn enqueue_while_playing_never_starts_second_loop() {
        let mut h = harness(PlayerConfig::default());
        h.launcher.script("a", Script::endless());
        h.launcher.script("b", Script::endless());

        h.controller.play("a").await.unwrap();
        h.started("a").await;
        h.controller.play("b").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(h.controller.is_active());
        assert_eq!(h.launcher.starts().len(), 1);
        let snap = h.controller.queue_snapshot();
        assert_eq!(snap.current.unwrap().title, "a");
        assert_eq!(snap.pending.len(), 1);

        assert!(h.controller.skip());
        assert_eq!(h.ended("a").await, TrackEndReason::Skipped);
        assert_eq!(h.started("b").await, 0.0);
        assert_eq!(h.launcher.starts().len(), 2);

        h.controller.stop().await;
        h.loop_finished().await;
    }

    #[tokio::test]
    async fn skip_while_paused_resets_state() {
        let mut h = harness(PlayerConfig::default());
        h.launcher
            .script("a", Script::endless().with_status("out_time=00:00:03.000\n"));

        h.controller.play("a").await.unwrap();
        h.started("a").await;

        assert!(h.controller.pause());
        assert!(!h.controller.pause());
        let status = h.controller.now_playing().unwrap();
        assert!(status.paused);
        assert_eq!(status.phase, voice_types::PlaybackPhase::Paused);

        assert!(h.controller.skip());
        assert_eq!(h.ended("a").await, TrackEndReason::Skipped);
        h.loop_finished().await;

        let snap = h.controller.shared.state.snapshot();
        assert_eq!(snap.position, 0.0);
        assert_eq!(snap.baseline, 0.0);
        assert!(!snap.paused);
        assert!(!snap.skip_requested);
        assert!(!h.controller.skip());
    }

    #[tokio::test]
    async fn skip_while_paused_after_decoder_exited() {
        let mut h = harness(PlayerConfig::default());
        h.launcher.script(
            "a",
            Script {
                exits_early: true,
                ..Script::bytes(BLOCK_BYTES as u64 * 10_000).with_status("out_time=00:00:03.000\n")
            },
        );
        h.launcher.script("b", Script::bytes(BLOCK_BYTES as u64));

        h.controller.play("a").await.unwrap();
        h.controller.play("b").await.unwrap();
        h.started("a").await;
        assert!(h.controller.pause());

        // Status stream already closed; wait for its last sample to land.
        tokio::time::timeout(WAIT, async {
            while h.controller.now_playing().map(|s| s.elapsed_secs) != Some(3.0) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(h.controller.skip());
        assert_eq!(h.ended("a").await, TrackEndReason::Skipped);
        assert_eq!(h.started("b").await, 0.0);
        assert_eq!(h.ended("b").await, TrackEndReason::Eof);
        assert_eq!(h.loop_finished().await, None);

        let snap = h.controller.shared.state.snapshot();
        assert_eq!(snap.position, 0.0);
        assert_eq!(snap.baseline, 0.0);
        assert!(!snap.paused);
        assert!(!snap.skip_requested);
        assert_eq!(
            h.launcher.starts(),
            vec![("a#1".to_string(), 0.0), ("b#2".to_string(), 0.0)]
        );
    }

    #[tokio::test]
    async fn pause_holds_frames_until_resume() {
        let mut h = harness(PlayerConfig::default());
        h.launcher.script("a", Script::endless());

        h.controller.play("a").await.unwrap();
        h.started("a").await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(h.controller.pause());
        tokio::time::sleep(Duration::from_millis(20)).await;
        let held = h.sink.frames.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.sink.frames.load(Ordering::SeqCst), held);

        assert!(h.controller.resume());
        assert!(!h.controller.resume());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.sink.frames.load(Ordering::SeqCst) > held);

        h.controller.stop().await;
        h.loop_finished().await;
    }

    #[tokio::test]
    async fn stop_clears_queue_and_disconnects() {
        let mut h = harness(PlayerConfig::default());
        h.launcher.script("a", Script::endless());
        h.launcher.script("b", Script::endless());

        h.controller.play("a").await.unwrap();
        h.controller.play("b").await.unwrap();
        h.started("a").await;

        h.controller.stop().await;
        assert_eq!(h.ended("a").await, TrackEndReason::Stopped);
        assert_eq!(h.loop_finished().await, None);

        assert!(h.controller.queue_snapshot().is_empty());
        assert!(h.controller.shared.queue.peek_or_pop_current().is_none());
        assert_eq!(h.sink.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(h.launcher.starts().len(), 1);

        h.launcher.script("c", Script::bytes(BLOCK_BYTES as u64));
        h.controller.play("c").await.unwrap();
        assert_eq!(h.started("c").await, 0.0);
        assert_eq!(h.ended("c").await, TrackEndReason::Eof);
    }

    #[tokio::test]
    async fn restart_replays_fresh_descriptor_from_zero() {
        let mut h = harness(PlayerConfig::default());
        h.launcher
            .script("a", Script::endless().with_status("out_time=00:00:05.000\n"));

        h.controller.play("a").await.unwrap();
        h.started("a").await;
        tokio::time::timeout(WAIT, async {
            while h.controller.now_playing().map(|s| s.elapsed_secs) != Some(5.0) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let fresh = h.controller.restart().await.unwrap();
        assert_eq!(fresh.stream_url, "a#2");
        assert_eq!(h.ended("a").await, TrackEndReason::Restarted);
        assert_eq!(h.started("a").await, 0.0);

        let starts = h.launcher.starts();
        assert_eq!(starts, vec![("a#1".to_string(), 0.0), ("a#2".to_string(), 0.0)]);
        assert_eq!(h.resolver.lookups.load(Ordering::SeqCst), 2);

        h.controller.stop().await;
        h.loop_finished().await;
    }

    #[tokio::test]
    async fn restart_without_track_is_rejected() {
        let h = harness(PlayerConfig::default());
        let err = h.controller.restart().await.unwrap_err();
        assert!(matches!(err, PlayerError::NothingPlaying));
    }

    #[tokio::test]
    async fn failed_restart_drops_track_and_advances() {
        let mut h = harness(PlayerConfig::default());
        h.launcher.script("a", Script::endless());
        h.launcher.script("b", Script::bytes(BLOCK_BYTES as u64));

        h.controller.play("a").await.unwrap();
        h.controller.play("b").await.unwrap();
        h.started("a").await;

        h.resolver.fail.store(true, Ordering::SeqCst);
        let err = h.controller.restart().await.unwrap_err();
        assert!(matches!(err, PlayerError::LookupFailed(_)));

        assert_eq!(h.ended("a").await, TrackEndReason::Restarted);
        assert_eq!(h.started("b").await, 0.0);
        assert_eq!(h.ended("b").await, TrackEndReason::Eof);
    }

    #[tokio::test]
    async fn spawn_failure_drops_only_that_track() {
        let mut h = harness(PlayerConfig::default());
        h.launcher.script(
            "a",
            Script {
                spawn_fails: true,
                ..Script::bytes(0)
            },
        );
        h.launcher.script("b", Script::bytes(BLOCK_BYTES as u64));

        h.controller.play("a").await.unwrap();
        h.controller.play("b").await.unwrap();

        let failed = h
            .next_matching(|e| matches!(e, PlayerEvent::TrackFailed { .. }))
            .await;
        assert!(matches!(failed, PlayerEvent::TrackFailed { ref title, .. } if title == "a"));
        assert_eq!(h.started("b").await, 0.0);
        assert_eq!(h.ended("b").await, TrackEndReason::Eof);
        assert_eq!(h.loop_finished().await, None);
    }

    #[tokio::test]
    async fn sink_failure_aborts_loop() {
        let mut h = harness(PlayerConfig::default());
        h.launcher.script("a", Script::endless());
        h.launcher.script("b", Script::endless());
        h.sink.fail.store(true, Ordering::SeqCst);

        h.controller.play("a").await.unwrap();
        h.controller.play("b").await.unwrap();

        let error = h.loop_finished().await.unwrap();
        assert!(error.contains("sink"));
        assert_eq!(h.launcher.starts().len(), 1);
        assert!(!h.controller.is_active());
        assert_eq!(h.controller.queue_snapshot().pending.len(), 1);
    }

    #[tokio::test]
    async fn watchdog_kills_stalled_decoder() {
        let mut h = harness(PlayerConfig {
            stall_timeout_ms: Some(100),
            ..PlayerConfig::default()
        });
        h.launcher.script(
            "a",
            Script {
                pcm: Pcm::Hang,
                ..Script::bytes(0)
            },
        );

        h.controller.play("a").await.unwrap();
        let failed = h
            .next_matching(|e| matches!(e, PlayerEvent::TrackFailed { .. }))
            .await;
        assert!(matches!(failed, PlayerEvent::TrackFailed { ref error, .. } if error.contains("stall")));
        assert_eq!(h.ended("a").await, TrackEndReason::Error);
    }

    #[tokio::test]
    async fn status_refresh_publishes_current_track() {
        let mut h = harness(PlayerConfig {
            status_interval_ms: 50,
            ..PlayerConfig::default()
        });
        h.launcher.script("a", Script::endless());

        h.controller.play("a").await.unwrap();
        h.started("a").await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        h.controller.stop().await;
        h.loop_finished().await;

        let seen = h.status.0.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|s| s.title == "a" && s.total_secs == 120));
    }

    #[tokio::test]
    async fn control_ops_without_track_are_noops() {
        let h = harness(PlayerConfig::default());
        assert!(!h.controller.pause());
        assert!(!h.controller.resume());
        assert!(!h.controller.skip());
        assert!(h.controller.now_playing().is_none());
        h.controller.stop().await;
        assert!(!h.controller.is_active());
    }

    #[tokio::test]
    async fn read_block_fills_across_short_reads() {
        let data = vec![1u8; 10];
        let mut reader = (&data[..4]).chain(&data[4..]);
        let mut buf = [0u8; 8];
        assert_eq!(read_block(&mut reader, &mut buf).await.unwrap(), 8);
        assert_eq!(read_block(&mut reader, &mut buf).await.unwrap(), 2);
        assert_eq!(read_block(&mut reader, &mut buf).await.unwrap(), 0);
    }
}
