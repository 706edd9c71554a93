//! Unified error type for the monitor, the chat client and the system commands.
//!
//! `AppError` is returned by every fallible operation in the crate. It
//! serializes as `{ "kind": "...", "message": "..." }` so `--json` output can
//! distinguish error categories.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::ser::SerializeStruct;

/// Application-level error.
///
/// Each variant names the resource involved and what was being attempted, so
/// the console can present a specific message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No baseline has been persisted yet.
    #[error("no baseline at {}; run a calibration first", path.display())]
    MissingBaseline { path: PathBuf },

    /// The baseline file exists but does not hold two comma-separated rates.
    #[error("baseline at {} is corrupt: {reason}", path.display())]
    CorruptBaseline { path: PathBuf, reason: String },

    /// Calibration refuses to overwrite an existing baseline.
    #[error("baseline already exists at {}; reset it before recalibrating", path.display())]
    BaselineExists { path: PathBuf },

    /// Measurement interval must be a finite, positive number of seconds.
    #[error("invalid measurement interval {0} s (must be > 0)")]
    InvalidInterval(f64),

    /// Host could not be resolved to a socket address.
    #[error("invalid server address {host}:{port}: {reason}")]
    InvalidAddress { host: String, port: u16, reason: String },

    /// Remote end actively refused the connection.
    #[error("connection to {host}:{port} refused")]
    ConnectionRefused { host: String, port: u16 },

    /// Operation requires a connected session.
    #[error("not connected; connect before {action}")]
    NotConnected { action: &'static str },

    /// The session was closed explicitly and cannot be reused.
    #[error("session closed; create a new client to {action}")]
    SessionClosed { action: &'static str },

    /// I/O and OS-level errors (filesystem, sockets, counters).
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// An external privileged command failed or could not be launched.
    #[error("`{command}` failed: {detail}")]
    PrivilegedOperationFailed { command: String, detail: String },

    /// Invalid or missing user input.
    #[error("{0}")]
    InvalidInput(String),
}

impl AppError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MissingBaseline { .. } => "MissingBaseline",
            AppError::CorruptBaseline { .. } => "CorruptBaseline",
            AppError::BaselineExists { .. } => "BaselineExists",
            AppError::InvalidInterval(_) => "InvalidInterval",
            AppError::InvalidAddress { .. } => "InvalidAddress",
            AppError::ConnectionRefused { .. } => "ConnectionRefused",
            AppError::NotConnected { .. } => "NotConnected",
            AppError::SessionClosed { .. } => "SessionClosed",
            AppError::Io { .. } => "Io",
            AppError::PrivilegedOperationFailed { .. } => "PrivilegedOperationFailed",
            AppError::InvalidInput(_) => "InvalidInput",
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn socket(action: &str, remote: Option<SocketAddr>, source: std::io::Error) -> Self {
        let context = match remote {
            Some(addr) => format!("{action} {addr}"),
            None => action.to_string(),
        };
        AppError::io(context, source)
    }
}

/// Custom Serialize: produces `{ "kind": "Variant", "message": "..." }`.
impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::io("i/o error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_returns_correct_variant_name() {
        assert_eq!(
            AppError::MissingBaseline { path: "red.txt".into() }.kind(),
            "MissingBaseline"
        );
        assert_eq!(AppError::InvalidInterval(0.0).kind(), "InvalidInterval");
        assert_eq!(
            AppError::NotConnected { action: "sending" }.kind(),
            "NotConnected"
        );
        assert_eq!(
            AppError::PrivilegedOperationFailed {
                command: "sudo iptables".into(),
                detail: "exit status 1".into(),
            }
            .kind(),
            "PrivilegedOperationFailed"
        );
        assert_eq!(AppError::InvalidInput("bad port".into()).kind(), "InvalidInput");
    }

    #[test]
    fn test_error_display_names_resource() {
        let err = AppError::CorruptBaseline {
            path: "red.txt".into(),
            reason: "expected 2 fields, found 1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("red.txt"));
        assert!(msg.contains("expected 2 fields"));

        let err = AppError::ConnectionRefused {
            host: "127.0.0.1".into(),
            port: 9,
        };
        assert_eq!(err.to_string(), "connection to 127.0.0.1:9 refused");
    }

    #[test]
    fn test_error_serializes_as_kind_and_message() {
        let err = AppError::NotConnected { action: "sending" };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "NotConnected");
        assert_eq!(json["message"], "not connected; connect before sending");
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_from_io_error_produces_io_variant() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let app_err: AppError = io_err.into();
        assert_eq!(app_err.kind(), "Io");
        assert!(app_err.to_string().contains("file missing"));
    }

    #[test]
    fn test_socket_error_mentions_remote() {
        let addr: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let err = AppError::socket(
            "sending to",
            Some(addr),
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe"),
        );
        assert_eq!(err.to_string(), "sending to 10.0.0.1:5000: broken pipe");
    }
}
