//! Interactive chat console.
//!
//! The console loop is the only place output is written: stdin lines and
//! receive-task events are both awaited in one `select!`, so display updates
//! are serialized without any shared display state.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::cli::ChatArgs;
use crate::config::{self, ClientConfig};
use crate::core::{ChatClient, ClientEvent, ConnectOutcome};

use super::logic::{parse_console_input, render_event, ConsoleInput, CONSOLE_HELP};

/// Resolve the server endpoint from the config file and CLI overrides.
///
/// The file is only required when the flags don't name both host and port.
pub fn resolve_endpoint(args: &ChatArgs) -> Result<ClientConfig> {
    match (&args.host, args.port) {
        (Some(host), Some(port)) => Ok(ClientConfig {
            server_host: host.clone(),
            server_port: port,
        }),
        (host, port) => {
            let mut cfg = config::load_client_config(&args.config)?;
            if let Some(host) = host {
                cfg.server_host = host.clone();
            }
            if let Some(port) = port {
                cfg.server_port = port;
            }
            Ok(cfg)
        }
    }
}

async fn connect(client: &mut ChatClient, endpoint: &ClientConfig) {
    let (host, port) = (&endpoint.server_host, endpoint.server_port);
    println!("[CONNECTING] Trying {host}:{port}...");
    match client.connect(host, port).await {
        Ok(ConnectOutcome::Connected(addr)) => println!("[CONNECTED] Connected to {addr}"),
        Ok(ConnectOutcome::AlreadyConnected(addr)) => {
            println!("[INFO] Already connected to {addr}.")
        }
        Err(e) => println!("[ERROR] {e}"),
    }
}

pub async fn run_chat(args: &ChatArgs) -> Result<()> {
    let endpoint = resolve_endpoint(args)?;
    let (tx, mut events) = mpsc::unbounded_channel::<ClientEvent>();
    let mut client = ChatClient::new(tx);

    println!("{CONSOLE_HELP}");
    if args.connect {
        connect(&mut client, &endpoint).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    break;
                };
                match parse_console_input(&line) {
                    ConsoleInput::Empty => {}
                    ConsoleInput::Connect => connect(&mut client, &endpoint).await,
                    ConsoleInput::Status => match client.remote() {
                        Some(addr) => println!("[INFO] {:?} ({addr})", client.state()),
                        None => println!("[INFO] {:?}", client.state()),
                    },
                    ConsoleInput::Help => println!("{CONSOLE_HELP}"),
                    ConsoleInput::Quit => break,
                    ConsoleInput::Unknown(cmd) => println!("[INFO] Unknown command {cmd}. {CONSOLE_HELP}"),
                    ConsoleInput::Message(text) => match client.send(text.as_bytes()).await {
                        Ok(()) => println!("[YOU] {text}"),
                        Err(e) => println!("[ERROR] {e}"),
                    },
                }
            }
            Some(event) = events.recv() => {
                println!("{}", render_event(&event));
            }
        }
    }

    client.close().await;
    // Anything that arrived before the close is still shown.
    while let Ok(event) = events.try_recv() {
        println!("{}", render_event(&event));
    }
    Ok(())
}
