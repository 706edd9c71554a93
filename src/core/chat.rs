//! Single-connection TCP chat client.
//!
//! A [`ChatClient`] owns at most one live session. Connecting spawns exactly
//! one receive task, which reads the socket until the peer closes or errors
//! and forwards every chunk, in wire order, to the caller's event channel.
//! The caller's context stays free to send and to drain that channel; it is
//! the only place display state gets touched.
//!
//! State machine: `Disconnected -> Connecting -> Connected -> Disconnected`
//! (peer closed / I/O error, driven by the receive task), and any state
//! `-> Closed` on [`ChatClient::close`]. `Closed` is terminal.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config;
use crate::error::AppError;

/// Lifecycle state of a client's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

/// Why the receive task ended a session on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Zero-length read: the peer closed its end.
    PeerClosed,
    /// The socket reported an error.
    Io(String),
}

/// Everything the receive task reports to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// One chunk exactly as the transport produced it.
    Received(Vec<u8>),
    /// The session dropped to `Disconnected`. Sent once per session.
    Disconnected(DisconnectReason),
}

/// Sink the receive task delivers into.
pub type EventSink = mpsc::UnboundedSender<ClientEvent>;

/// Result of a successful [`ChatClient::connect`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(SocketAddr),
    /// Nothing was done: a session is already live.
    AlreadyConnected(SocketAddr),
}

/// State shared with the receive task. `epoch` identifies the session a task
/// belongs to so a task from an earlier session can never touch a later one.
#[derive(Debug)]
struct Shared {
    state: ConnectionState,
    epoch: u64,
}

pub struct ChatClient {
    shared: Arc<Mutex<Shared>>,
    sink: EventSink,
    writer: Option<OwnedWriteHalf>,
    receiver: Option<JoinHandle<()>>,
    remote: Option<SocketAddr>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // The guarded data is two plain fields; a panic elsewhere cannot leave it torn.
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ChatClient {
    /// Create a disconnected client that will deliver events into `sink`.
    pub fn new(sink: EventSink) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: ConnectionState::Disconnected,
                epoch: 0,
            })),
            sink,
            writer: None,
            receiver: None,
            remote: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.shared).state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Address of the current (or most recent) session's peer.
    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    /// Open a session to `host:port` and start its receive task.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<ConnectOutcome, AppError> {
        {
            let mut shared = lock(&self.shared);
            match shared.state {
                ConnectionState::Closed => {
                    return Err(AppError::SessionClosed { action: "connect" })
                }
                ConnectionState::Connected => {
                    if let Some(addr) = self.remote {
                        tracing::info!("Already connected to {addr}");
                        return Ok(ConnectOutcome::AlreadyConnected(addr));
                    }
                }
                ConnectionState::Connecting | ConnectionState::Disconnected => {}
            }
            shared.state = ConnectionState::Connecting;
        }
        // Leftovers from a session the peer ended.
        self.writer = None;
        self.receiver = None;

        tracing::info!("Connecting to {host}:{port}");
        match open_stream(host, port).await {
            Ok(stream) => {
                let addr = stream
                    .peer_addr()
                    .map_err(|e| AppError::socket("reading peer address of", None, e));
                let addr = match addr {
                    Ok(addr) => addr,
                    Err(e) => {
                        self.set_state(ConnectionState::Disconnected);
                        return Err(e);
                    }
                };
                let (reader, writer) = stream.into_split();

                let epoch = {
                    let mut shared = lock(&self.shared);
                    shared.epoch += 1;
                    shared.state = ConnectionState::Connected;
                    shared.epoch
                };
                self.writer = Some(writer);
                self.remote = Some(addr);
                self.receiver = Some(tokio::spawn(receive_loop(
                    reader,
                    self.sink.clone(),
                    Arc::clone(&self.shared),
                    epoch,
                    addr,
                )));
                tracing::info!("Connected to {addr}");
                Ok(ConnectOutcome::Connected(addr))
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                tracing::warn!("Connection to {host}:{port} failed: {e}");
                Err(e)
            }
        }
    }

    /// Write the whole payload to the peer.
    ///
    /// Fails with `NotConnected` without touching the socket unless the
    /// session is live. An empty payload is a no-op.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), AppError> {
        if !self.is_connected() {
            // The peer ended the session; release the half-open socket now.
            if self.state() == ConnectionState::Disconnected {
                self.writer = None;
                self.receiver = None;
            }
            return Err(AppError::NotConnected { action: "sending" });
        }
        if payload.is_empty() {
            return Ok(());
        }
        let remote = self.remote;
        let writer = self
            .writer
            .as_mut()
            .ok_or(AppError::NotConnected { action: "sending" })?;

        writer
            .write_all(payload)
            .await
            .map_err(|e| AppError::socket("sending to", remote, e))?;
        writer
            .flush()
            .await
            .map_err(|e| AppError::socket("sending to", remote, e))?;
        tracing::debug!("Sent {} bytes", payload.len());
        Ok(())
    }

    /// Release the session. Calling it again is a no-op.
    pub async fn close(&mut self) {
        {
            let mut shared = lock(&self.shared);
            if shared.state == ConnectionState::Closed {
                return;
            }
            shared.state = ConnectionState::Closed;
        }

        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!("Shutdown of write half failed: {e}");
            }
        }
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
            // Cancellation is the expected way for the task to end here.
            let _ = receiver.await;
        }
        tracing::info!("Session closed");
    }

    fn set_state(&self, state: ConnectionState) {
        lock(&self.shared).state = state;
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
    }
}

/// Resolve `host:port` and connect to the first address that accepts.
async fn open_stream(host: &str, port: u16) -> Result<TcpStream, AppError> {
    let invalid = |reason: String| AppError::InvalidAddress {
        host: host.to_string(),
        port,
        reason,
    };
    if host.trim().is_empty() {
        return Err(invalid("host is empty".into()));
    }

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| invalid(e.to_string()))?
        .collect();
    if addrs.is_empty() {
        return Err(invalid("host resolved to no addresses".into()));
    }

    let mut refused = false;
    let mut last_err = None;
    for addr in &addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!("Connect to {addr} failed: {e}");
                refused |= e.kind() == std::io::ErrorKind::ConnectionRefused;
                last_err = Some((*addr, e));
            }
        }
    }

    match last_err {
        Some(_) if refused => Err(AppError::ConnectionRefused {
            host: host.to_string(),
            port,
        }),
        Some((addr, e)) => Err(AppError::socket("connecting to", Some(addr), e)),
        None => Err(invalid("host resolved to no addresses".into())),
    }
}

/// Read until the peer closes or errors, forwarding each chunk.
async fn receive_loop(
    mut reader: OwnedReadHalf,
    sink: EventSink,
    shared: Arc<Mutex<Shared>>,
    epoch: u64,
    remote: SocketAddr,
) {
    let mut buf = vec![0u8; config::RECV_BUFFER_SIZE];
    let reason = loop {
        match reader.read(&mut buf).await {
            Ok(0) => break DisconnectReason::PeerClosed,
            Ok(n) => {
                if !session_is_live(&shared, epoch) {
                    return;
                }
                tracing::debug!("Received {n} bytes from {remote}");
                if sink.send(ClientEvent::Received(buf[..n].to_vec())).is_err() {
                    tracing::warn!("Event sink for {remote} is gone; stopping receive task");
                    end_session(&shared, epoch);
                    return;
                }
            }
            Err(e) => break DisconnectReason::Io(e.to_string()),
        }
    };

    // A close() from the caller already moved the session on; stay quiet.
    if !end_session(&shared, epoch) {
        return;
    }
    match &reason {
        DisconnectReason::PeerClosed => tracing::info!("Server {remote} closed the connection"),
        DisconnectReason::Io(e) => tracing::warn!("Receiving from {remote} failed: {e}"),
    }
    let _ = sink.send(ClientEvent::Disconnected(reason));
}

fn session_is_live(shared: &Mutex<Shared>, epoch: u64) -> bool {
    let shared = lock(shared);
    shared.epoch == epoch && shared.state == ConnectionState::Connected
}

/// Move this task's session to `Disconnected`. Returns false if the session
/// was already closed or superseded.
fn end_session(shared: &Mutex<Shared>, epoch: u64) -> bool {
    let mut shared = lock(shared);
    if shared.epoch != epoch || shared.state != ConnectionState::Connected {
        return false;
    }
    shared.state = ConnectionState::Disconnected;
    true
}
