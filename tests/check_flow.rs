use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;
use varnish_health::collectors::{Collector, RawStats};
use varnish_health::storage::{MetricIdentity, Sample, SampleStore, SqliteSampleStore};
use varnish_health::{Check, CheckConfig, CheckError, Result, Status};

struct FakeCollector {
    values: HashMap<String, f64>,
    calls: Rc<Cell<usize>>,
}

impl FakeCollector {
    fn new(pairs: &[(&str, f64)]) -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let collector = Self {
            values: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            calls: Rc::clone(&calls),
        };
        (collector, calls)
    }
}

impl Collector for FakeCollector {
    fn collect(&self, fields: &[&str]) -> Result<RawStats> {
        self.calls.set(self.calls.get() + 1);
        let values = fields
            .iter()
            .filter_map(|f| self.values.get(*f).map(|v| (f.to_string(), *v)))
            .collect();
        Ok(RawStats::new(values))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FailingCollector;

impl Collector for FailingCollector {
    fn collect(&self, _fields: &[&str]) -> Result<RawStats> {
        Err(CheckError::ExternalUtility(
            "/usr/bin/varnishstat exited with exit status: 1: Could not get hold of varnishd".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Has history but refuses every write.
struct ReadOnlyStore {
    previous: Sample,
}

impl SampleStore for ReadOnlyStore {
    fn load(&self, _identity: &MetricIdentity) -> Option<Sample> {
        Some(self.previous)
    }

    fn save(&self, _identity: &MetricIdentity, _sample: &Sample) -> Result<()> {
        Err(CheckError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "permission denied",
        )))
    }
}

fn config(metric: &str, tmpdir: &Path) -> CheckConfig {
    let mut config = CheckConfig::new(metric);
    config.instance_name = Some("edge01".to_string());
    config.tmpdir = tmpdir.to_path_buf();
    config
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn run(config: &CheckConfig, pairs: &[(&str, f64)], now: DateTime<Utc>) -> varnish_health::CheckResult {
    let (collector, _) = FakeCollector::new(pairs);
    let store = SqliteSampleStore::new(&config.tmpdir);
    Check::new(config.clone(), Box::new(collector), Box::new(store)).run_at(now)
}

#[test]
fn test_direct_metric_without_thresholds() {
    let dir = TempDir::new().unwrap();
    let config = config("cache_hitrate_pct", dir.path());

    let result = run(&config, &[("MAIN.cache_hitrate", 98.13)], at(1_000));

    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.value, Some(98.13));
    assert!(result.message.contains("98.13"));
    assert_eq!(
        result.to_string(),
        "VARNISH OK - Varnish \"edge01\" reports: 98.13% of requests satisfied by cache \
         | cache_hitrate_pct=98.13%"
    );
}

#[test]
fn test_rate_metric_bootstraps_then_reports() {
    let dir = TempDir::new().unwrap();
    let mut config = config("backend_connection_rate", dir.path());
    config.warning = ":200".to_string();
    config.critical = ":300".to_string();

    let first = run(&config, &[("MAIN.backend_conn", 5_000.0)], at(1_000));
    assert_eq!(first.status, Status::Unknown);
    assert_eq!(first.exit_code(), 3);
    assert!(first.perfdata.is_none());

    let store = SqliteSampleStore::new(dir.path());
    let identity = MetricIdentity::new("edge01", "backend_connection_rate");
    assert_eq!(
        store.load(&identity),
        Some(Sample {
            timestamp: at(1_000),
            raw_value: 5_000.0
        })
    );

    let second = run(
        &config,
        &[("MAIN.backend_conn", 5_180.0)],
        at(1_000) + Duration::seconds(60),
    );
    assert_eq!(second.status, Status::Ok);
    assert_eq!(second.exit_code(), 0);
    assert_eq!(second.value, Some(3.0));
    assert_eq!(
        second.to_string(),
        "VARNISH OK - Varnish \"edge01\" reports: 3 backend connections/s \
         | backend_connection_rate=3;200;300;0"
    );
}

#[test]
fn test_rate_thresholds_and_critical_priority() {
    let dir = TempDir::new().unwrap();
    let mut config = config("backend_request_rate", dir.path());
    config.warning = ":2".to_string();
    config.critical = ":5".to_string();

    run(&config, &[("MAIN.backend_req", 0.0)], at(0));

    let warning = run(&config, &[("MAIN.backend_req", 30.0)], at(10));
    assert_eq!(warning.status, Status::Warning);
    assert_eq!(warning.exit_code(), 1);

    let critical = run(&config, &[("MAIN.backend_req", 130.0)], at(20));
    assert_eq!(critical.value, Some(10.0));
    assert_eq!(critical.status, Status::Critical);
    assert_eq!(critical.exit_code(), 2);
}

#[test]
fn test_counter_reset_is_not_negative() {
    let dir = TempDir::new().unwrap();
    let config = config("threads_failed_rate", dir.path());

    run(&config, &[("MAIN.threads_failed", 500.0)], at(0));
    let result = run(&config, &[("MAIN.threads_failed", 10.0)], at(10));

    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.value, Some(1.0));
}

#[test]
fn test_same_timestamp_is_unknown() {
    let dir = TempDir::new().unwrap();
    let config = config("session_queue_rate", dir.path());

    run(&config, &[("MAIN.sess_queued", 1.0)], at(50));
    let result = run(&config, &[("MAIN.sess_queued", 2.0)], at(50));

    assert_eq!(result.status, Status::Unknown);
}

#[test]
fn test_instances_keep_separate_history() {
    let dir = TempDir::new().unwrap();
    let edge01 = config("backend_request_rate", dir.path());
    let mut edge02 = edge01.clone();
    edge02.instance_name = Some("edge02".to_string());

    run(&edge01, &[("MAIN.backend_req", 0.0)], at(0));
    let result = run(&edge02, &[("MAIN.backend_req", 100.0)], at(10));

    assert_eq!(result.status, Status::Unknown);
}

#[test]
fn test_ratio_without_activity() {
    let dir = TempDir::new().unwrap();
    let config = config("cache_hit_ratio_pct", dir.path());

    let result = run(
        &config,
        &[("MAIN.cache_hit", 0.0), ("MAIN.cache_miss", 0.0)],
        at(0),
    );

    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.value, Some(0.0));
}

#[test]
fn test_unknown_metric_skips_collection() {
    let dir = TempDir::new().unwrap();
    let (collector, calls) = FakeCollector::new(&[]);
    let check = Check::new(
        config("cache_size_bytes", dir.path()),
        Box::new(collector),
        Box::new(SqliteSampleStore::new(dir.path())),
    );

    let result = check.run_at(at(0));

    assert_eq!(result.status, Status::Unknown);
    assert_eq!(result.exit_code(), 3);
    assert!(result.message.contains("cache_size_bytes"));
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_invalid_range_skips_collection() {
    let dir = TempDir::new().unwrap();
    let mut config = config("cache_hitrate_pct", dir.path());
    config.critical = "30:10".to_string();
    let (collector, calls) = FakeCollector::new(&[("MAIN.cache_hitrate", 50.0)]);
    let check = Check::new(
        config,
        Box::new(collector),
        Box::new(SqliteSampleStore::new(dir.path())),
    );

    let result = check.run_at(at(0));

    assert_eq!(result.status, Status::Unknown);
    assert!(result.message.starts_with("Invalid range format"));
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_collector_failure_is_unknown_with_cause() {
    let dir = TempDir::new().unwrap();
    let check = Check::new(
        config("backend_connection_rate", dir.path()),
        Box::new(FailingCollector),
        Box::new(SqliteSampleStore::new(dir.path())),
    );

    let result = check.run_at(at(0));

    assert_eq!(result.status, Status::Unknown);
    assert!(result.message.contains("Could not get hold of varnishd"));
    assert!(result.to_string().starts_with("VARNISH UNKNOWN - varnishstat failed:"));
}

#[test]
fn test_unwritable_store_keeps_verdict() {
    let mut config = config("backend_request_rate", Path::new("/nonexistent"));
    config.warning = ":1".to_string();
    let (collector, _) = FakeCollector::new(&[("MAIN.backend_req", 120.0)]);
    let store = ReadOnlyStore {
        previous: Sample {
            timestamp: at(0),
            raw_value: 0.0,
        },
    };

    let result = Check::new(config, Box::new(collector), Box::new(store)).run_at(at(60));

    assert_eq!(result.status, Status::Warning);
    assert_eq!(result.value, Some(2.0));
    assert!(result.message.contains("warning: sample not persisted"));
    assert!(result.perfdata.is_some());
}

#[test]
fn test_corrupt_history_recovers_on_next_run() {
    let dir = TempDir::new().unwrap();
    let config = config("backend_request_rate", dir.path());
    std::fs::write(dir.path().join("samples.db"), b"definitely not sqlite, just some bytes").unwrap();

    let first = run(&config, &[("MAIN.backend_req", 10.0)], at(0));
    assert_eq!(first.status, Status::Unknown);
    assert!(first.message.contains("no rate for backend_request_rate yet"));
    assert!(!first.message.contains("sample not persisted"));

    let second = run(&config, &[("MAIN.backend_req", 70.0)], at(60));
    assert_eq!(second.status, Status::Ok);
    assert_eq!(second.value, Some(1.0));

    let third = run(&config, &[("MAIN.backend_req", 190.0)], at(120));
    assert_eq!(third.value, Some(2.0));
}
