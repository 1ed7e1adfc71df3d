//! Interactive command parsing and reply formatting.

use voice_player::format_duration;
use voice_types::{NowPlayingStatus, QueueSnapshot};

/// Commands accepted by the command loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Play(String),
    Pause,
    Resume,
    Next,
    Stop,
    Restart,
    Queue,
    NowPlaying,
    Help,
    Quit,
}

pub const HELP: &str = "commands: play <url> | pause | resume | next | stop | restart | queue | nowplaying | quit";

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<CliCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let cmd = match word.to_ascii_lowercase().as_str() {
        "play" | "p" => {
            if rest.is_empty() {
                return Err("usage: play <url>".to_string());
            }
            CliCommand::Play(rest.to_string())
        }
        "pause" => CliCommand::Pause,
        "resume" => CliCommand::Resume,
        "next" | "skip" => CliCommand::Next,
        "stop" => CliCommand::Stop,
        "restart" => CliCommand::Restart,
        "queue" | "q" => CliCommand::Queue,
        "nowplaying" | "np" => CliCommand::NowPlaying,
        "help" | "?" => CliCommand::Help,
        "quit" | "exit" => CliCommand::Quit,
        other => return Err(format!("unknown command: {other} ({HELP})")),
    };
    Ok(Some(cmd))
}

pub fn format_queue(snapshot: &QueueSnapshot) -> String {
    if snapshot.is_empty() {
        return "queue is empty".to_string();
    }
    let mut out = String::new();
    if let Some(current) = &snapshot.current {
        out.push_str(&format!("now: {} ({})\n", current.title, current.duration));
    }
    for (i, item) in snapshot.pending.iter().enumerate() {
        out.push_str(&format!("{}. {} ({})\n", i + 1, item.title, item.duration));
    }
    out.trim_end().to_string()
}

pub fn format_now_playing(status: &NowPlayingStatus) -> String {
    let elapsed = format_duration(status.elapsed_secs.max(0.0) as u64);
    let total = format_duration(status.total_secs);
    let paused = if status.paused { " (paused)" } else { "" };
    format!("{} [{elapsed} / {total}]{paused}", status.title)
}
