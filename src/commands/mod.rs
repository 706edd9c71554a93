//! Console command handlers, organized by functional domain.
//!
//! - `monitor`: traffic baseline calibration and checks
//! - `chat`: interactive chat console
//! - `system`: web server control, shutdown, firewall port blocking, open ports
//! - `logic`: Pure presentation/parsing functions (unit-testable)

mod chat;
pub(crate) mod logic;
mod monitor;
pub mod system;

use anyhow::Result;

use crate::cli::{Command, ServiceActionArg};
use crate::config::{self, ClientConfig};

use system::{listening_sockets, shutdown_command, FirewallRule, ServiceAction, ServiceControl};

/// Run one CLI command to completion.
pub async fn execute(command: Command) -> Result<()> {
    match command {
        Command::Monitor(args) => {
            monitor::run_monitor(&args).await?;
        }
        Command::ResetBaseline { baseline } => monitor::reset_baseline(&baseline)?,
        Command::Chat(args) => chat::run_chat(&args).await?,
        Command::InitConfig { config: path, force } => {
            config::save_client_config(&path, &ClientConfig::default(), force)?;
            println!("Wrote default config to {}", path.display());
        }
        Command::PrintConfigPath { config: path } => {
            let resolved = std::env::current_dir()
                .map(|cwd| cwd.join(&path))
                .unwrap_or(path);
            println!("{}", resolved.display());
        }
        Command::OpenPorts => {
            println!("{}", logic::render_open_ports(&listening_sockets()?));
        }
        Command::BlockPort {
            port,
            source,
            dry_run,
        } => {
            let rule = FirewallRule::parse(&port, source.as_deref())?;
            if dry_run {
                println!("{}", rule.command().display());
            } else {
                rule.apply()?;
                println!("{}.", rule.describe());
            }
        }
        Command::Service { action, program } => {
            let ctl = program
                .map(|program| ServiceControl { program })
                .unwrap_or_default();
            let action = match action {
                ServiceActionArg::Start => ServiceAction::Start,
                ServiceActionArg::Stop => ServiceAction::Stop,
            };
            ctl.run(action)?;
            println!("Web server {} succeeded.", action.verb());
        }
        Command::Shutdown { yes } => {
            let cmd = shutdown_command();
            if !yes {
                anyhow::bail!(
                    "refusing to run `{}` without --yes",
                    cmd.display()
                );
            }
            cmd.run()?;
        }
    }
    Ok(())
}
