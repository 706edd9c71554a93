//! `monitor` and `reset-baseline` handlers.

use std::path::Path;

use crate::cli::MonitorArgs;
use crate::core::{
    BaselineStore, MonitorOutcome, MonitorSettings, SystemCounters, TrafficMonitor,
};
use crate::error::AppError;

use super::logic::render_outcome;

/// Which operation a `monitor` invocation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    Auto,
    Calibrate,
    Check,
}

impl From<&MonitorArgs> for MonitorMode {
    fn from(args: &MonitorArgs) -> Self {
        if args.calibrate {
            MonitorMode::Calibrate
        } else if args.check {
            MonitorMode::Check
        } else {
            MonitorMode::Auto
        }
    }
}

pub async fn run_monitor(args: &MonitorArgs) -> Result<MonitorOutcome, AppError> {
    let settings = MonitorSettings {
        interval_secs: args.interval,
        sample_count: args.samples,
        threshold_multiplier: args.threshold,
    };
    let mut monitor = TrafficMonitor::new(
        SystemCounters::new(),
        BaselineStore::new(&args.baseline),
        settings,
    );

    let outcome = match MonitorMode::from(args) {
        MonitorMode::Auto => {
            if !monitor.store().exists() {
                println!(
                    "[monitor] No baseline at {}; calibrating for {} x {} s...",
                    args.baseline.display(),
                    settings.sample_count,
                    settings.interval_secs
                );
            }
            monitor.run().await?
        }
        MonitorMode::Calibrate => {
            println!(
                "[monitor] Calibrating for {} x {} s...",
                settings.sample_count, settings.interval_secs
            );
            MonitorOutcome::Calibrated(
                monitor
                    .calibrate(settings.sample_count, settings.interval_secs)
                    .await?,
            )
        }
        MonitorMode::Check => MonitorOutcome::Checked(
            monitor
                .check(settings.interval_secs, settings.threshold_multiplier)
                .await?,
        ),
    };

    if args.json {
        match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!("Failed to serialize monitor outcome: {e}"),
        }
    } else {
        println!("{}", render_outcome(&outcome, &args.baseline));
    }
    Ok(outcome)
}

pub fn reset_baseline(path: &Path) -> Result<(), AppError> {
    if BaselineStore::new(path).remove()? {
        println!("Removed baseline {}", path.display());
    } else {
        println!("No baseline at {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::{Cli, Command};

    fn monitor_args(extra: &[&str]) -> MonitorArgs {
        let argv = ["netwatch", "monitor"].into_iter().chain(extra.iter().copied());
        match Cli::parse_from(argv).command {
            Command::Monitor(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_mode_from_flags() {
        assert_eq!(MonitorMode::from(&monitor_args(&[])), MonitorMode::Auto);
        assert_eq!(
            MonitorMode::from(&monitor_args(&["--calibrate"])),
            MonitorMode::Calibrate
        );
        assert_eq!(MonitorMode::from(&monitor_args(&["--check"])), MonitorMode::Check);
    }

    #[tokio::test]
    async fn test_check_without_baseline_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.txt");
        let path_str = path.to_str().unwrap();
        let args = monitor_args(&["--check", "--baseline", path_str]);

        let err = run_monitor(&args).await.unwrap_err();
        assert_eq!(err.kind(), "MissingBaseline");
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.txt");
        let path_str = path.to_str().unwrap();
        let args = monitor_args(&["--interval", "0", "--baseline", path_str]);

        assert_eq!(run_monitor(&args).await.unwrap_err().kind(), "InvalidInterval");
        assert!(!path.exists());
    }

    #[test]
    fn test_reset_missing_baseline_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        reset_baseline(&dir.path().join("red.txt")).unwrap();
    }
}
