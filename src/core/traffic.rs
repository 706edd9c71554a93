//! Traffic baseline calibration and anomaly checks.
//!
//! A measurement reads the cumulative counters, sleeps for one interval and
//! reads them again; rates are the deltas divided by the nominal interval.
//! Calibration averages several such rates into a [`BaselineRecord`]; a check
//! compares one fresh rate against it.

use std::time::Duration;

use serde::Serialize;

use crate::config;
use crate::core::baseline::{BaselineRecord, BaselineStore};
use crate::core::counters::{CounterReading, CounterSource};
use crate::error::AppError;

/// Byte deltas observed over one measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleWindow {
    pub interval_secs: f64,
    pub upload_delta: u64,
    pub download_delta: u64,
}

impl SampleWindow {
    /// Build a window from two readings. A counter that went backwards
    /// (reset or wrap) contributes a zero delta.
    pub fn between(before: CounterReading, after: CounterReading, interval_secs: f64) -> Self {
        Self {
            interval_secs,
            upload_delta: after.bytes_sent.saturating_sub(before.bytes_sent),
            download_delta: after.bytes_recv.saturating_sub(before.bytes_recv),
        }
    }

    pub fn rates(&self) -> Rates {
        Rates {
            upload_bytes_per_sec: self.upload_delta as f64 / self.interval_secs,
            download_bytes_per_sec: self.download_delta as f64 / self.interval_secs,
        }
    }
}

/// Upload/download rate in bytes/sec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rates {
    pub upload_bytes_per_sec: f64,
    pub download_bytes_per_sec: f64,
}

/// Outcome of comparing one measurement against the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CheckResult {
    pub current: Rates,
    pub baseline: BaselineRecord,
    pub threshold_multiplier: f64,
    pub anomaly: bool,
}

/// What a calibrate-or-check run ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MonitorOutcome {
    Calibrated(BaselineRecord),
    Checked(CheckResult),
}

/// Tunables for [`TrafficMonitor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    pub interval_secs: f64,
    pub sample_count: u32,
    pub threshold_multiplier: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: config::DEFAULT_INTERVAL_SECS,
            sample_count: config::DEFAULT_SAMPLE_COUNT,
            threshold_multiplier: config::DEFAULT_THRESHOLD_MULTIPLIER,
        }
    }
}

/// Strict comparison: a rate of exactly `baseline * multiplier` is normal.
pub fn is_anomalous(current: &Rates, baseline: &BaselineRecord, threshold_multiplier: f64) -> bool {
    current.upload_bytes_per_sec > baseline.upload_bytes_per_sec * threshold_multiplier
        || current.download_bytes_per_sec > baseline.download_bytes_per_sec * threshold_multiplier
}

/// Arithmetic mean of per-sample rates. Each window counts equally,
/// regardless of how many bytes it saw. `samples` must not be empty.
pub fn average_rates(samples: &[Rates]) -> BaselineRecord {
    let n = samples.len() as f64;
    let (up, down) = samples.iter().fold((0.0, 0.0), |(up, down), r| {
        (up + r.upload_bytes_per_sec, down + r.download_bytes_per_sec)
    });
    BaselineRecord {
        upload_bytes_per_sec: up / n,
        download_bytes_per_sec: down / n,
    }
}

fn validate_interval(interval_secs: f64) -> Result<Duration, AppError> {
    if !interval_secs.is_finite() || interval_secs <= 0.0 {
        return Err(AppError::InvalidInterval(interval_secs));
    }
    Duration::try_from_secs_f64(interval_secs).map_err(|_| AppError::InvalidInterval(interval_secs))
}

fn validate_multiplier(threshold_multiplier: f64) -> Result<(), AppError> {
    if !threshold_multiplier.is_finite() || threshold_multiplier <= 0.0 {
        return Err(AppError::InvalidInput(format!(
            "threshold multiplier {threshold_multiplier} must be a positive number"
        )));
    }
    Ok(())
}

/// Calibrates and checks network throughput against a persisted baseline.
pub struct TrafficMonitor<C> {
    counters: C,
    store: BaselineStore,
    settings: MonitorSettings,
}

impl<C: CounterSource> TrafficMonitor<C> {
    pub fn new(counters: C, store: BaselineStore, settings: MonitorSettings) -> Self {
        Self {
            counters,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &BaselineStore {
        &self.store
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Take one measurement window `interval_secs` wide.
    pub async fn measure(&mut self, interval_secs: f64) -> Result<SampleWindow, AppError> {
        let interval = validate_interval(interval_secs)?;
        let before = self.counters.read();
        tokio::time::sleep(interval).await;
        let after = self.counters.read();

        if after.bytes_sent < before.bytes_sent || after.bytes_recv < before.bytes_recv {
            tracing::warn!("Network counters went backwards during a measurement; clamping delta to 0");
        }
        Ok(SampleWindow::between(before, after, interval_secs))
    }

    /// Establish the baseline from `sample_count` consecutive windows and
    /// persist it. Never overwrites an existing baseline.
    pub async fn calibrate(
        &mut self,
        sample_count: u32,
        interval_secs: f64,
    ) -> Result<BaselineRecord, AppError> {
        validate_interval(interval_secs)?;
        if sample_count == 0 {
            return Err(AppError::InvalidInput(
                "calibration needs at least one sample".into(),
            ));
        }
        if self.store.exists() {
            return Err(AppError::BaselineExists {
                path: self.store.path().to_path_buf(),
            });
        }

        tracing::info!(
            "Calibrating baseline: {sample_count} samples x {interval_secs} s"
        );
        let mut samples = Vec::with_capacity(sample_count as usize);
        for i in 0..sample_count {
            let rates = self.measure(interval_secs).await?.rates();
            tracing::debug!(
                "Calibration sample {}/{}: up={:.2} B/s down={:.2} B/s",
                i + 1,
                sample_count,
                rates.upload_bytes_per_sec,
                rates.download_bytes_per_sec
            );
            samples.push(rates);
        }

        let record = average_rates(&samples);
        self.store.save(&record)?;
        tracing::info!(
            "Baseline established: up={:.2} B/s down={:.2} B/s",
            record.upload_bytes_per_sec,
            record.download_bytes_per_sec
        );
        Ok(record)
    }

    /// Compare one fresh measurement against the persisted baseline.
    pub async fn check(
        &mut self,
        interval_secs: f64,
        threshold_multiplier: f64,
    ) -> Result<CheckResult, AppError> {
        validate_interval(interval_secs)?;
        validate_multiplier(threshold_multiplier)?;
        let baseline = self.store.load()?;

        let current = self.measure(interval_secs).await?.rates();
        let anomaly = is_anomalous(&current, &baseline, threshold_multiplier);
        if anomaly {
            tracing::warn!(
                "Traffic anomaly: up={:.2} B/s (baseline {:.2}), down={:.2} B/s (baseline {:.2}), threshold x{}",
                current.upload_bytes_per_sec,
                baseline.upload_bytes_per_sec,
                current.download_bytes_per_sec,
                baseline.download_bytes_per_sec,
                threshold_multiplier
            );
        } else {
            tracing::info!(
                "Traffic normal: up={:.2} B/s down={:.2} B/s",
                current.upload_bytes_per_sec,
                current.download_bytes_per_sec
            );
        }

        Ok(CheckResult {
            current,
            baseline,
            threshold_multiplier,
            anomaly,
        })
    }

    /// Calibrate when no baseline exists yet, otherwise check against it.
    pub async fn run(&mut self) -> Result<MonitorOutcome, AppError> {
        let MonitorSettings {
            interval_secs,
            sample_count,
            threshold_multiplier,
        } = self.settings;

        if self.store.exists() {
            self.check(interval_secs, threshold_multiplier)
                .await
                .map(MonitorOutcome::Checked)
        } else {
            self.calibrate(sample_count, interval_secs)
                .await
                .map(MonitorOutcome::Calibrated)
        }
    }

    /// Forget the baseline so the next run recalibrates.
    pub fn reset(&self) -> Result<bool, AppError> {
        self.store.remove()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Replays scripted readings; counts how often it was read.
    #[derive(Clone)]
    struct ScriptedCounters {
        readings: Arc<Mutex<VecDeque<CounterReading>>>,
        reads: Arc<Mutex<usize>>,
    }

    impl ScriptedCounters {
        fn new(readings: &[(u64, u64)]) -> Self {
            let script = readings
                .iter()
                .map(|&(bytes_sent, bytes_recv)| CounterReading {
                    bytes_sent,
                    bytes_recv,
                })
                .collect();
            Self {
                readings: Arc::new(Mutex::new(script)),
                reads: Arc::new(Mutex::new(0)),
            }
        }

        fn reads(&self) -> usize {
            *self.reads.lock().unwrap()
        }
    }

    impl CounterSource for ScriptedCounters {
        fn read(&mut self) -> CounterReading {
            *self.reads.lock().unwrap() += 1;
            self.readings
                .lock()
                .unwrap()
                .pop_front()
                .expect("counter script exhausted")
        }
    }

    /// 1/16 s keeps every rate an exact binary fraction.
    const TICK: f64 = 0.0625;

    fn monitor(counters: ScriptedCounters, dir: &tempfile::TempDir) -> TrafficMonitor<ScriptedCounters> {
        TrafficMonitor::new(
            counters,
            BaselineStore::new(dir.path().join("red.txt")),
            MonitorSettings {
                interval_secs: TICK,
                sample_count: 3,
                threshold_multiplier: 15.0,
            },
        )
    }

    fn baseline(up: f64, down: f64) -> BaselineRecord {
        BaselineRecord {
            upload_bytes_per_sec: up,
            download_bytes_per_sec: down,
        }
    }

    fn rates(up: f64, down: f64) -> Rates {
        Rates {
            upload_bytes_per_sec: up,
            download_bytes_per_sec: down,
        }
    }

    #[test]
    fn test_sample_window_rates_use_nominal_interval() {
        let before = CounterReading { bytes_sent: 100, bytes_recv: 1_000 };
        let after = CounterReading { bytes_sent: 300, bytes_recv: 2_000 };
        let w = SampleWindow::between(before, after, 2.0);
        assert_eq!(w.upload_delta, 200);
        assert_eq!(w.download_delta, 1_000);
        assert_eq!(w.rates(), rates(100.0, 500.0));
    }

    #[test]
    fn test_counter_reset_clamps_to_zero() {
        let before = CounterReading { bytes_sent: 5_000, bytes_recv: 10 };
        let after = CounterReading { bytes_sent: 20, bytes_recv: 50 };
        let w = SampleWindow::between(before, after, 1.0);
        assert_eq!(w.upload_delta, 0);
        assert_eq!(w.download_delta, 40);
    }

    #[test]
    fn test_exactly_threshold_is_not_anomalous() {
        let b = baseline(1000.0, 2000.0);
        assert!(!is_anomalous(&rates(15_000.0, 30_000.0), &b, 15.0));
        assert!(is_anomalous(&rates(15_000.1, 0.0), &b, 15.0));
        assert!(is_anomalous(&rates(0.0, 30_000.1), &b, 15.0));
    }

    #[test]
    fn test_zero_baseline_flags_any_traffic() {
        let b = baseline(0.0, 0.0);
        assert!(!is_anomalous(&rates(0.0, 0.0), &b, 15.0));
        assert!(is_anomalous(&rates(1.0, 0.0), &b, 15.0));
    }

    #[test]
    fn test_average_weights_each_sample_equally() {
        let avg = average_rates(&[rates(10.0, 0.0), rates(20.0, 5.0), rates(60.0, 10.0)]);
        assert_eq!(avg, baseline(30.0, 5.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_flags_upload_spike() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("red.txt"), "1000.0,2000.0").unwrap();
        let counters = ScriptedCounters::new(&[(0, 0), (20_000, 1_000)]);
        let mut m = monitor(counters, &dir);

        // Deltas over one nominal second: upload 20000 > 15000, download 1000 < 30000.
        let result = m.check(1.0, 15.0).await.unwrap();
        assert_eq!(result.current, rates(20_000.0, 1_000.0));
        assert_eq!(result.baseline, baseline(1000.0, 2000.0));
        assert!(result.anomaly);
    }

    #[tokio::test]
    async fn test_check_within_threshold_is_normal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("red.txt"), "16,32").unwrap();
        let counters = ScriptedCounters::new(&[(0, 0), (15, 30)]);
        let mut m = monitor(counters, &dir);

        // 15 and 30 bytes over 1/16 s are exactly 15x the baseline.
        let result = m.check(TICK, 15.0).await.unwrap();
        assert_eq!(result.current, rates(240.0, 480.0));
        assert!(!result.anomaly);
    }

    #[tokio::test]
    async fn test_check_rejects_bad_interval_without_measuring() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("red.txt"), "1,1").unwrap();
        let counters = ScriptedCounters::new(&[]);
        let mut m = monitor(counters.clone(), &dir);

        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert_eq!(m.check(bad, 15.0).await.unwrap_err().kind(), "InvalidInterval");
        }
        assert_eq!(counters.reads(), 0);
    }

    #[tokio::test]
    async fn test_check_missing_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let counters = ScriptedCounters::new(&[]);
        let mut m = monitor(counters.clone(), &dir);

        assert_eq!(m.check(TICK, 15.0).await.unwrap_err().kind(), "MissingBaseline");
        assert_eq!(counters.reads(), 0);
    }

    #[tokio::test]
    async fn test_check_corrupt_baseline_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.txt");
        fs::write(&path, "1000.0;2000.0").unwrap();
        let counters = ScriptedCounters::new(&[]);
        let mut m = monitor(counters.clone(), &dir);

        assert_eq!(m.check(TICK, 15.0).await.unwrap_err().kind(), "CorruptBaseline");
        assert_eq!(counters.reads(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "1000.0;2000.0");
    }

    #[tokio::test]
    async fn test_calibrate_averages_per_sample_rates() {
        let dir = tempfile::tempdir().unwrap();
        // Three windows: deltas (1,2), (3,0), (5,4) bytes.
        let counters = ScriptedCounters::new(&[
            (0, 0),
            (1, 2),
            (10, 10),
            (13, 10),
            (20, 20),
            (25, 24),
        ]);
        let mut m = monitor(counters.clone(), &dir);

        let record = m.calibrate(3, TICK).await.unwrap();
        // Per-sample rates (16,32), (48,0), (80,64).
        assert_eq!(record, baseline(48.0, 32.0));
        assert_eq!(counters.reads(), 6);
        assert_eq!(m.store().load().unwrap(), record);
    }

    #[tokio::test]
    async fn test_calibrate_ten_samples_is_mean_not_wide_window() {
        let dir = tempfile::tempdir().unwrap();
        // Gaps between windows carry traffic that a single wide window would count.
        let mut script = Vec::new();
        for i in 0..10u64 {
            let base = i * 1_000_000;
            script.push((base, base));
            script.push((base + (i + 1) * 10, base + 10));
        }
        let mut m = monitor(ScriptedCounters::new(&script), &dir);

        let record = m.calibrate(10, TICK).await.unwrap();
        // Upload deltas 10, 20, ..., 100 bytes -> mean 55 bytes per window; download always 10.
        assert_eq!(record, baseline(55.0 / TICK, 10.0 / TICK));
    }

    #[tokio::test]
    async fn test_calibrate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("red.txt"), "1,2").unwrap();
        let counters = ScriptedCounters::new(&[]);
        let mut m = monitor(counters.clone(), &dir);

        assert_eq!(m.calibrate(3, TICK).await.unwrap_err().kind(), "BaselineExists");
        assert_eq!(counters.reads(), 0);
    }

    #[tokio::test]
    async fn test_calibrate_zero_samples_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = monitor(ScriptedCounters::new(&[]), &dir);
        assert_eq!(m.calibrate(0, TICK).await.unwrap_err().kind(), "InvalidInput");
        assert!(!m.store().exists());
    }

    #[tokio::test]
    async fn test_run_calibrates_then_checks() {
        let dir = tempfile::tempdir().unwrap();
        let counters = ScriptedCounters::new(&[
            (0, 0),
            (1, 1),
            (1, 1),
            (2, 2),
            (2, 2),
            (3, 3),
            // check window
            (3, 3),
            (100, 4),
        ]);
        let mut m = monitor(counters, &dir);

        match m.run().await.unwrap() {
            MonitorOutcome::Calibrated(record) => {
                assert_eq!(record, baseline(16.0, 16.0))
            }
            other => panic!("expected calibration, got {other:?}"),
        }
        match m.run().await.unwrap() {
            MonitorOutcome::Checked(result) => assert!(result.anomaly),
            other => panic!("expected check, got {other:?}"),
        }

        assert!(m.reset().unwrap());
        assert!(!m.store().exists());
    }

    #[test]
    fn test_outcome_serializes_with_mode_tag() {
        let json = serde_json::to_value(MonitorOutcome::Calibrated(baseline(1.0, 2.0))).unwrap();
        assert_eq!(json["mode"], "calibrated");
        assert_eq!(json["upload_bytes_per_sec"], 1.0);
    }
}
