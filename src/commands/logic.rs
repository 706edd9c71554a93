//! Pure presentation and input-parsing helpers for the console commands.
//!
//! These functions take plain values (no sockets, no counters) and can be
//! unit-tested without a runtime.

use std::net::SocketAddr;
use std::path::Path;

use crate::core::{BaselineRecord, CheckResult, ClientEvent, DisconnectReason, MonitorOutcome};

/// Format a rate in a compact human-readable form.
pub fn format_rate(bps: f64) -> String {
    if bps < 1024.0 {
        format!("{:.0} B/s", bps)
    } else if bps < 1024.0 * 1024.0 {
        format!("{:.1} KB/s", bps / 1024.0)
    } else {
        format!("{:.2} MB/s", bps / (1024.0 * 1024.0))
    }
}

pub fn render_calibration(record: &BaselineRecord, baseline_path: &Path) -> String {
    format!(
        "[monitor] Baseline calibrated:\n   - Average upload: {:.2} bytes/s\n   - Average download: {:.2} bytes/s\nSaved to {}.",
        record.upload_bytes_per_sec,
        record.download_bytes_per_sec,
        baseline_path.display()
    )
}

pub fn render_check(result: &CheckResult) -> String {
    let headline = if result.anomaly {
        format!("Anomaly detected! (threshold x{})", result.threshold_multiplier)
    } else {
        "Normal usage.".to_string()
    };
    format!(
        "[monitor] {headline}\n   - Current upload: {:.2} bytes/s ({}; baseline {:.2})\n   - Current download: {:.2} bytes/s ({}; baseline {:.2})",
        result.current.upload_bytes_per_sec,
        format_rate(result.current.upload_bytes_per_sec),
        result.baseline.upload_bytes_per_sec,
        result.current.download_bytes_per_sec,
        format_rate(result.current.download_bytes_per_sec),
        result.baseline.download_bytes_per_sec,
    )
}

pub fn render_outcome(outcome: &MonitorOutcome, baseline_path: &Path) -> String {
    match outcome {
        MonitorOutcome::Calibrated(record) => render_calibration(record, baseline_path),
        MonitorOutcome::Checked(result) => render_check(result),
    }
}

/// One display line per receive-task event.
pub fn render_event(event: &ClientEvent) -> String {
    match event {
        ClientEvent::Received(bytes) => {
            format!("[SERVER] {}", String::from_utf8_lossy(bytes))
        }
        ClientEvent::Disconnected(DisconnectReason::PeerClosed) => {
            "[DISCONNECTED] The server closed the connection.".to_string()
        }
        ClientEvent::Disconnected(DisconnectReason::Io(e)) => {
            format!("[DISCONNECTED] Error receiving message: {e}")
        }
    }
}

/// What a line typed into the chat console asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Connect,
    Status,
    Quit,
    Help,
    Message(String),
    /// Blank line: nothing to send.
    Empty,
    Unknown(String),
}

pub fn parse_console_input(line: &str) -> ConsoleInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleInput::Empty;
    }
    match trimmed {
        "/connect" => ConsoleInput::Connect,
        "/status" => ConsoleInput::Status,
        "/quit" | "/exit" => ConsoleInput::Quit,
        "/help" => ConsoleInput::Help,
        cmd if cmd.starts_with('/') && !cmd.starts_with("//") => {
            ConsoleInput::Unknown(cmd.to_string())
        }
        // "//text" sends a message that starts with a slash.
        _ if trimmed.starts_with("//") => {
            ConsoleInput::Message(trimmed[1..].to_string())
        }
        _ => ConsoleInput::Message(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

/// One `ip:port` per line, or a note that nothing was visible.
pub fn render_open_ports(listening: &[SocketAddr]) -> String {
    if listening.is_empty() {
        return "No open ports found, or insufficient permissions to list them.".to_string();
    }
    let mut out = String::from("Open ports:");
    for addr in listening {
        out.push('\n');
        out.push_str(&addr.to_string());
    }
    out
}

pub const CONSOLE_HELP: &str = "Commands: /connect, /status, /quit, /help. Anything else is sent as a message (prefix with // to send a leading slash).";
