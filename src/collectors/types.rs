use crate::error::{CheckError, Result};
use std::collections::HashMap;

/// Counter and gauge values reported by one run of the statistics utility.
#[derive(Debug, Clone)]
pub struct RawStats {
    pub values: HashMap<String, f64>,
}

impl RawStats {
    pub fn new(values: HashMap<String, f64>) -> Self {
        Self { values }
    }

    pub fn get(&self, field: &str) -> Result<f64> {
        self.values.get(field).copied().ok_or_else(|| {
            CheckError::ExternalUtility(format!("field {field} missing from statistics output"))
        })
    }

    /// Sum of several fields, all of which must be present.
    pub fn sum(&self, fields: &[&str]) -> Result<f64> {
        fields.iter().try_fold(0.0, |acc, field| Ok(acc + self.get(field)?))
    }
}

pub trait Collector {
    fn collect(&self, fields: &[&str]) -> Result<RawStats>;
    fn name(&self) -> &str;
}
