//! Core logic: traffic baseline monitoring and the chat session.
//!
//! - [`TrafficMonitor`] — calibrate-or-check against a persisted baseline
//! - [`BaselineStore`] / [`BaselineRecord`] — the one-line baseline file
//! - [`SystemCounters`] — system-wide byte counters via `sysinfo`
//! - [`ChatClient`] — one TCP session with a background receive task

pub mod baseline;
pub mod chat;
pub mod counters;
pub mod traffic;

pub use baseline::{parse_baseline, serialize_baseline, BaselineRecord, BaselineStore};
pub use chat::{ChatClient, ClientEvent, ConnectOutcome, ConnectionState, DisconnectReason, EventSink};
pub use counters::{CounterReading, CounterSource, SystemCounters};
pub use traffic::{
    CheckResult, MonitorOutcome, MonitorSettings, Rates, SampleWindow, TrafficMonitor,
};
