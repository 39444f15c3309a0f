use super::types::{Collector, RawStats};
use crate::error::{CheckError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CounterEntry {
    value: f64,
}

// Varnish 6.5 moved the counters under a "counters" key.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatsDocument {
    Versioned {
        counters: HashMap<String, CounterEntry>,
    },
    Legacy(HashMap<String, serde_json::Value>),
}

pub struct VarnishStatCollector {
    utility_path: PathBuf,
    instance_name: Option<String>,
}

impl VarnishStatCollector {
    pub fn new(utility_path: PathBuf, instance_name: Option<String>) -> Self {
        Self {
            utility_path,
            instance_name,
        }
    }

    fn command_args(&self, fields: &[&str]) -> Vec<String> {
        let mut args = vec!["-j".to_string(), "-1".to_string()];
        for field in fields {
            args.push("-f".to_string());
            args.push(field.to_string());
        }
        if let Some(instance) = &self.instance_name {
            args.push("-n".to_string());
            args.push(instance.clone());
        }
        args
    }
}

/// Extracts the requested fields from varnishstat JSON output.
pub fn parse_output(output: &str, fields: &[&str]) -> Result<HashMap<String, f64>> {
    let document: StatsDocument = serde_json::from_str(output).map_err(|e| {
        CheckError::ExternalUtility(format!("failed to decode JSON output: {e}"))
    })?;

    let mut values = HashMap::new();
    match document {
        StatsDocument::Versioned { counters } => {
            for field in fields {
                if let Some(entry) = counters.get(*field) {
                    values.insert(field.to_string(), entry.value);
                }
            }
        }
        StatsDocument::Legacy(entries) => {
            for field in fields {
                let Some(raw) = entries.get(*field) else {
                    continue;
                };
                let entry: CounterEntry = serde_json::from_value(raw.clone()).map_err(|e| {
                    CheckError::ExternalUtility(format!("unexpected entry for {field}: {e}"))
                })?;
                values.insert(field.to_string(), entry.value);
            }
        }
    }

    if let Some(missing) = fields.iter().find(|f| !values.contains_key(**f)) {
        return Err(CheckError::ExternalUtility(format!(
            "field {missing} missing from statistics output"
        )));
    }

    Ok(values)
}

fn decode_stdout(stdout: &[u8], fields: &[&str]) -> Result<HashMap<String, f64>> {
    let text = std::str::from_utf8(stdout).map_err(|e| {
        CheckError::ExternalUtility(format!("output is not valid UTF-8: {e}"))
    })?;
    parse_output(text, fields)
}

impl Collector for VarnishStatCollector {
    fn collect(&self, fields: &[&str]) -> Result<RawStats> {
        let args = self.command_args(fields);
        debug!(
            "Starting varnishstat ({}) with args {}",
            self.utility_path.display(),
            args.join(", ")
        );

        let output = Command::new(&self.utility_path)
            .args(&args)
            .output()
            .map_err(|e| {
                CheckError::ExternalUtility(format!(
                    "could not run {}: {e}",
                    self.utility_path.display()
                ))
            })?;

        if !output.status.success() {
            return Err(CheckError::ExternalUtility(format!(
                "{} exited with {}: {}",
                self.utility_path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(RawStats::new(decode_stdout(&output.stdout, fields)?))
    }

    fn name(&self) -> &str {
        "varnishstat"
    }
}
