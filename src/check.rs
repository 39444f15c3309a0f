//! Runs one check: fetch statistics, resolve the metric, turn counters into
//! rates, compare against thresholds and build the status line.

use crate::collectors::Collector;
use crate::config::CheckConfig;
use crate::error::Result;
use crate::metrics::{Metric, Reading};
use crate::range::RangeSpec;
use crate::rate::rate;
use crate::storage::{MetricIdentity, Sample, SampleStore};
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, info, warn};

pub const OUTPUT_PREFIX: &str = "VARNISH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Thresholds {
    pub warning: Option<RangeSpec>,
    pub critical: Option<RangeSpec>,
}

impl Thresholds {
    pub fn parse(warning: &str, critical: &str) -> Result<Self> {
        Ok(Self {
            warning: RangeSpec::parse(warning)?,
            critical: RangeSpec::parse(critical)?,
        })
    }

    /// Critical wins when both ranges are violated.
    pub fn status_for(&self, value: f64) -> Status {
        if crate::range::evaluate(self.critical.as_ref(), value) {
            Status::Critical
        } else if crate::range::evaluate(self.warning.as_ref(), value) {
            Status::Warning
        } else {
            Status::Ok
        }
    }
}

/// One `label=value[unit];warn;crit;min;max` token.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfData {
    pub label: String,
    pub value: f64,
    pub unit: String,
    pub warning: Option<RangeSpec>,
    pub critical: Option<RangeSpec>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl fmt::Display for PerfData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field<T: ToString>(v: &Option<T>) -> String {
            v.as_ref().map(ToString::to_string).unwrap_or_default()
        }

        let token = format!(
            "{}={}{};{};{};{};{}",
            self.label,
            self.value,
            self.unit,
            field(&self.warning),
            field(&self.critical),
            field(&self.min),
            field(&self.max),
        );
        f.write_str(token.trim_end_matches(';'))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub status: Status,
    pub value: Option<f64>,
    pub message: String,
    pub perfdata: Option<PerfData>,
}

impl CheckResult {
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            status: Status::Unknown,
            value: None,
            message: message.into(),
            perfdata: None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} - {}", OUTPUT_PREFIX, self.status, self.message)?;
        if let Some(perfdata) = &self.perfdata {
            write!(f, " | {}", perfdata)?;
        }
        Ok(())
    }
}

pub struct Check {
    config: CheckConfig,
    instance: String,
    collector: Box<dyn Collector>,
    store: Box<dyn SampleStore>,
}

impl Check {
    pub fn new(
        config: CheckConfig,
        collector: Box<dyn Collector>,
        store: Box<dyn SampleStore>,
    ) -> Self {
        let instance = config.effective_instance();
        Self {
            config,
            instance,
            collector,
            store,
        }
    }

    pub fn run(&self) -> CheckResult {
        self.run_at(Utc::now())
    }

    /// Runs the check as if the clock read `now`. Failures become UNKNOWN.
    pub fn run_at(&self, now: DateTime<Utc>) -> CheckResult {
        match self.evaluate(now) {
            Ok(result) => result,
            Err(e) => {
                warn!("Check failed: {}", e);
                CheckResult::unknown(e.to_string())
            }
        }
    }

    fn evaluate(&self, now: DateTime<Utc>) -> Result<CheckResult> {
        let thresholds = Thresholds::parse(&self.config.warning, &self.config.critical)?;
        let metric: Metric = self.config.metric.parse()?;
        debug!(stage = "init", metric = %metric, instance = %self.instance);

        let fields = metric.source_fields();
        let stats = self.collector.collect(&fields)?;
        debug!(stage = "stats_fetched", collector = self.collector.name(), fields = fields.len());

        let mut persist_failure = None;
        let value = match metric.resolve(&stats)? {
            Reading::Value(value) => Some(value),
            Reading::Counter(raw) => {
                let identity = MetricIdentity::new(&self.instance, metric.name());
                let previous = self.store.load(&identity);
                let value = rate(raw, previous.as_ref(), now);

                let sample = Sample {
                    timestamp: now,
                    raw_value: raw,
                };
                if let Err(e) = self.store.save(&identity, &sample) {
                    warn!("Could not persist sample for {}: {}", metric, e);
                    persist_failure = Some(e.to_string());
                }
                value
            }
        };
        debug!(stage = "value_resolved", value = ?value);

        let annotation = persist_failure
            .map(|cause| format!(" (warning: sample not persisted: {cause})"))
            .unwrap_or_default();

        let Some(value) = value else {
            info!("No usable previous sample for {}, rate starts next run", metric);
            return Ok(CheckResult::unknown(format!(
                "Varnish \"{}\" reports: no rate for {} yet, waiting for a second sample{}",
                self.instance, metric, annotation
            )));
        };

        let status = thresholds.status_for(value);
        debug!(stage = "evaluated", status = %status);

        let min = self
            .config
            .min
            .or_else(|| metric.is_rate().then_some(0.0));
        let perfdata = PerfData {
            label: metric.name().to_string(),
            value,
            unit: metric.unit().to_string(),
            warning: thresholds.warning,
            critical: thresholds.critical,
            min,
            max: self.config.max,
        };

        Ok(CheckResult {
            status,
            value: Some(value),
            message: format!(
                "Varnish \"{}\" reports: {}{}",
                self.instance,
                metric.describe(value),
                annotation
            ),
            perfdata: Some(perfdata),
        })
    }
}
