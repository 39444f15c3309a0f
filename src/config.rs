use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_UTILITY_PATH: &str = "/usr/bin/varnishstat";
pub const DEFAULT_TMPDIR: &str = "/tmp/check_varnish_health";

/// Everything one check invocation needs, resolved up front.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub metric: String,
    /// Warning range, empty for none.
    pub warning: String,
    /// Critical range, empty for none.
    pub critical: String,
    pub utility_path: PathBuf,
    /// Explicit Varnish instance; also forwarded to varnishstat as `-n`.
    pub instance_name: Option<String>,
    pub tmpdir: PathBuf,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl CheckConfig {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            warning: String::new(),
            critical: String::new(),
            utility_path: PathBuf::from(DEFAULT_UTILITY_PATH),
            instance_name: None,
            tmpdir: PathBuf::from(DEFAULT_TMPDIR),
            min: None,
            max: None,
        }
    }

    /// Instance used to key stored samples, falling back to the local hostname.
    pub fn effective_instance(&self) -> String {
        match &self.instance_name {
            Some(name) => name.clone(),
            None => local_hostname(),
        }
    }
}

fn local_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().to_string(),
        Err(e) => {
            warn!("Could not determine hostname: {}", e);
            "localhost".to_string()
        }
    }
}
