//! Command loop driving the playback controller.
//!
//! Stdin lines and Ctrl-C are turned into [`CliCommand`]s on a crossbeam channel and
//! handled one at a time on the calling thread. Async controller calls run on a
//! multi-thread Tokio runtime owned by this module.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{RecvTimeoutError, Sender};
use tokio::runtime::Runtime;
use tokio::sync::broadcast;
use voice_player::{
    Collaborators, FfmpegLauncher, PlaybackController, PlayerEvent, StatusListener, YtDlpResolver,
};
use voice_types::NowPlayingStatus;

use crate::commands::{self, CliCommand, HELP};
use crate::config::RunConfig;
use crate::sink::FrameFileSink;

const IDLE_POLL: Duration = Duration::from_millis(250);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Logs each status sample at debug level.
struct LogStatus;

impl StatusListener for LogStatus {
    fn publish(&self, status: &NowPlayingStatus) {
        tracing::debug!(
            title = %status.title,
            elapsed = status.elapsed_secs,
            total = status.total_secs,
            paused = status.paused,
            "now playing"
        );
    }
}

/// User-facing replies. Go to stderr when frames are written to stdout.
#[derive(Clone, Copy)]
struct Replies {
    to_stderr: bool,
}

impl Replies {
    fn say(&self, msg: impl AsRef<str>) {
        if self.to_stderr {
            eprintln!("{}", msg.as_ref());
        } else {
            println!("{}", msg.as_ref());
        }
    }
}

/// Run until `quit`, Ctrl-C, or stdin closes with nothing left to play.
pub fn run(config: RunConfig, install_ctrlc: bool) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("voice-player")
        .build()
        .context("build tokio runtime")?;
    let guard = rt.enter();

    let sink = rt.block_on(FrameFileSink::open(&config.output))?;
    tracing::info!(output = %config.output, "frame output ready");

    let controller = PlaybackController::new(
        config.player.clone(),
        Collaborators {
            resolver: Arc::new(YtDlpResolver::new(
                config.player.ytdlp_path.clone(),
                config.player.default_thumbnail.clone(),
            )),
            launcher: Arc::new(FfmpegLauncher::new(config.player.ffmpeg_path.clone())),
            sink: Arc::new(sink),
            status: Some(Arc::new(LogStatus)),
        },
    );
    let replies = Replies {
        to_stderr: config.output == "-",
    };
    rt.spawn(report_events(controller.subscribe(), replies));

    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    if install_ctrlc {
        let tx = cmd_tx.clone();
        let _ = ctrlc::set_handler(move || {
            let _ = tx.send(CliCommand::Quit);
        });
    }
    let input_closed = Arc::new(AtomicBool::new(false));
    spawn_stdin_reader(cmd_tx, input_closed.clone(), replies);

    for url in &config.urls {
        handle(&rt, &controller, CliCommand::Play(url.clone()), replies);
    }

    loop {
        match cmd_rx.recv_timeout(IDLE_POLL) {
            Ok(CliCommand::Quit) => break,
            Ok(cmd) => handle(&rt, &controller, cmd, replies),
            Err(RecvTimeoutError::Timeout) => {
                if input_closed.load(Ordering::Relaxed) && !controller.is_active() {
                    tracing::info!("input closed and queue finished");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    rt.block_on(controller.stop());
    drop(guard);
    rt.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(())
}

fn spawn_stdin_reader(tx: Sender<CliCommand>, closed: Arc<AtomicBool>, replies: Replies) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            };
            match commands::parse_command(&line) {
                Ok(Some(cmd)) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(msg) => replies.say(msg),
            }
        }
        closed.store(true, Ordering::Relaxed);
    });
}

fn handle(rt: &Runtime, controller: &PlaybackController, cmd: CliCommand, replies: Replies) {
    match cmd {
        CliCommand::Play(url) => match rt.block_on(controller.play(&url)) {
            Ok(track) => replies.say(format!("queued: {} ({})", track.title, track.duration_text)),
            Err(e) => replies.say(format!("error: {e}")),
        },
        CliCommand::Pause => {
            if controller.pause() {
                replies.say("paused");
            } else {
                replies.say("already paused or nothing playing");
            }
        }
        CliCommand::Resume => {
            if controller.resume() {
                replies.say("resumed");
            } else {
                replies.say("not paused");
            }
        }
        CliCommand::Next => {
            if controller.skip() {
                replies.say("skipped");
            } else {
                replies.say("nothing playing");
            }
        }
        CliCommand::Stop => {
            rt.block_on(controller.stop());
            replies.say("stopped and queue cleared");
        }
        CliCommand::Restart => match rt.block_on(controller.restart()) {
            Ok(track) => replies.say(format!("restarting: {}", track.title)),
            Err(e) => replies.say(format!("error: {e}")),
        },
        CliCommand::Queue => replies.say(commands::format_queue(&controller.queue_snapshot())),
        CliCommand::NowPlaying => match controller.now_playing() {
            Some(status) => replies.say(commands::format_now_playing(&status)),
            None => replies.say("nothing playing"),
        },
        CliCommand::Help => replies.say(HELP),
        CliCommand::Quit => {}
    }
}

async fn report_events(mut rx: broadcast::Receiver<PlayerEvent>, replies: Replies) {
    loop {
        match rx.recv().await {
            Ok(PlayerEvent::TrackStarted { title, offset }) => {
                if offset > 0.0 {
                    replies.say(format!("now playing: {title} (from {offset:.1}s)"));
                } else {
                    replies.say(format!("now playing: {title}"));
                }
            }
            Ok(PlayerEvent::TrackFailed { title, error }) => {
                replies.say(format!("failed: {title}: {error}"));
            }
            Ok(PlayerEvent::LoopFinished { error: Some(error) }) => {
                replies.say(format!("playback aborted: {error}"));
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!(skipped = n, "event listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
