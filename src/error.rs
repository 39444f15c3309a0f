use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Invalid range format: {0}")]
    InvalidRangeFormat(String),

    #[error("Metric \"{0}\" not found. Use --help to check for metrics available.")]
    UnknownMetric(String),

    #[error("varnishstat failed: {0}")]
    ExternalUtility(String),

    #[error("Sample store error: {0}")]
    SampleStore(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CheckError>;
