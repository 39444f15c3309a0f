pub mod check;
pub mod collectors;
pub mod config;
pub mod error;
pub mod metrics;
pub mod range;
pub mod rate;
pub mod storage;

pub use check::{Check, CheckResult, Status};
pub use config::CheckConfig;
pub use error::{CheckError, Result};
