//! Web server stop/start, host shutdown, firewall port blocking, and the
//! listening socket table.
//!
//! Each operation is a single synchronous command invocation. Nothing goes
//! through a shell; arguments are passed as a vector.

use std::net::{IpAddr, SocketAddr};
use std::process::Command;

use netstat2::{AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, TcpState};

use crate::error::AppError;

/// A command line: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Human-readable rendering, for logs and dry runs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion. A spawn failure or non-zero exit is
    /// `PrivilegedOperationFailed`.
    pub fn run(&self) -> Result<(), AppError> {
        let rendered = self.display();
        tracing::info!("Running `{rendered}`");
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| AppError::PrivilegedOperationFailed {
                command: rendered.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {stderr}", output.status)
            };
            tracing::warn!("`{rendered}` failed: {detail}");
            return Err(AppError::PrivilegedOperationFailed {
                command: rendered,
                detail,
            });
        }
        Ok(())
    }
}

// ---- Firewall ----

/// Drop inbound TCP traffic to `port`, optionally only from `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirewallRule {
    pub port: u16,
    pub source: Option<IpAddr>,
}

impl FirewallRule {
    /// Parse user-entered text. A blank source means "all addresses".
    pub fn parse(port: &str, source: Option<&str>) -> Result<Self, AppError> {
        let port_text = port.trim();
        if port_text.is_empty() || !port_text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::InvalidInput(format!(
                "invalid port {port:?}: must be a number"
            )));
        }
        let port: u16 = port_text
            .parse()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| AppError::InvalidInput(format!("port {port_text} is out of range")))?;

        let source = match source.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(s.parse::<IpAddr>().map_err(|_| {
                AppError::InvalidInput(format!("invalid source address {s:?}"))
            })?),
            None => None,
        };
        Ok(Self { port, source })
    }

    /// `iptables` arguments appending the DROP rule to the INPUT chain.
    pub fn iptables_args(&self) -> Vec<String> {
        let mut args = vec![
            "-A".to_string(),
            "INPUT".to_string(),
            "-p".to_string(),
            "tcp".to_string(),
            "--dport".to_string(),
            self.port.to_string(),
        ];
        if let Some(source) = self.source {
            args.push("-s".to_string());
            args.push(source.to_string());
        }
        args.push("-j".to_string());
        args.push("DROP".to_string());
        args
    }

    /// The full privileged command, run through `sudo`.
    pub fn command(&self) -> CommandLine {
        CommandLine::new(
            "sudo",
            std::iter::once("iptables".to_string()).chain(self.iptables_args()),
        )
    }

    pub fn apply(&self) -> Result<(), AppError> {
        self.command().run()?;
        tracing::info!("{}", self.describe());
        Ok(())
    }

    pub fn describe(&self) -> String {
        match self.source {
            Some(ip) => format!("Port {} blocked for {ip}", self.port),
            None => format!("Port {} blocked", self.port),
        }
    }
}

// ---- Local web server ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
}

impl ServiceAction {
    pub fn verb(self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
        }
    }
}

/// How to drive the local web server (Apache-style `-k start|stop`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceControl {
    pub program: String,
}

impl Default for ServiceControl {
    fn default() -> Self {
        let program = if cfg!(windows) {
            r"C:\Apache24\bin\httpd.exe"
        } else {
            "apachectl"
        };
        Self {
            program: program.to_string(),
        }
    }
}

impl ServiceControl {
    pub fn command(&self, action: ServiceAction) -> CommandLine {
        CommandLine::new(self.program.clone(), ["-k", action.verb()])
    }

    pub fn run(&self, action: ServiceAction) -> Result<(), AppError> {
        self.command(action).run()
    }
}

// ---- Host shutdown ----

/// Immediate power-off for the current platform.
pub fn shutdown_command() -> CommandLine {
    if cfg!(windows) {
        CommandLine::new("shutdown", ["/s", "/t", "0"])
    } else {
        CommandLine::new("shutdown", ["-h", "now"])
    }
}

// ---- Listening sockets ----

/// Local addresses of all TCP sockets in the LISTEN state (IPv4 and IPv6),
/// sorted and deduplicated.
///
/// Sockets owned by other users may be missing when run unprivileged.
pub fn listening_sockets() -> Result<Vec<SocketAddr>, AppError> {
    let af = AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6;
    let sockets = netstat2::get_sockets_info(af, ProtocolFlags::TCP).map_err(|e| {
        AppError::PrivilegedOperationFailed {
            command: "list listening sockets".to_string(),
            detail: e.to_string(),
        }
    })?;

    let mut listening: Vec<SocketAddr> = sockets
        .into_iter()
        .filter_map(|info| match info.protocol_socket_info {
            ProtocolSocketInfo::Tcp(tcp) if matches!(tcp.state, TcpState::Listen) => {
                Some(SocketAddr::new(tcp.local_addr, tcp.local_port))
            }
            _ => None,
        })
        .collect();
    listening.sort();
    listening.dedup();
    tracing::debug!("Found {} listening sockets", listening.len());
    Ok(listening)
}
