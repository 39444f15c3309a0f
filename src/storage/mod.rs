use crate::error::Result;
use chrono::{DateTime, Utc};

pub mod sqlite;

pub use sqlite::SqliteSampleStore;

/// Addresses one persisted sample: the Varnish instance and the metric name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricIdentity {
    pub instance_name: String,
    pub metric_name: String,
}

impl MetricIdentity {
    pub fn new(instance_name: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            metric_name: metric_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub raw_value: f64,
}

pub trait SampleStore {
    /// Last sample saved for `identity`. Missing or unreadable history is `None`.
    fn load(&self, identity: &MetricIdentity) -> Option<Sample>;

    /// Replaces the stored sample for `identity`.
    fn save(&self, identity: &MetricIdentity, sample: &Sample) -> Result<()>;
}
