//! Nagios threshold ranges.
//!
//! A range is written `[@]start:end`. A bare `N` means `0:N`, an empty start
//! means 0, an empty end means +inf and `~` stands for infinity on either
//! side. A value alerts when it falls outside `[start, end]`, or inside it
//! when the range is prefixed with `@`.

use crate::error::{CheckError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSpec {
    pub lower: f64,
    pub upper: f64,
    pub invert: bool,
}

impl RangeSpec {
    /// Parses a threshold. An empty string yields `None`, which never alerts.
    pub fn parse(spec: &str) -> Result<Option<Self>> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let (invert, body) = match trimmed.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        if body.is_empty() {
            return Err(CheckError::InvalidRangeFormat(format!("'{spec}': missing bounds")));
        }

        let (start, end) = match body.split_once(':') {
            Some((start, end)) => (start, end),
            None => ("", body),
        };

        let lower = parse_bound(spec, start, 0.0, f64::NEG_INFINITY)?;
        let upper = parse_bound(spec, end, f64::INFINITY, f64::INFINITY)?;

        if lower > upper {
            return Err(CheckError::InvalidRangeFormat(format!(
                "'{spec}': start {lower} is greater than end {upper}"
            )));
        }

        Ok(Some(Self { lower, upper, invert }))
    }

    /// Returns true when `value` meets the alert condition.
    pub fn violated_by(&self, value: f64) -> bool {
        let outside = value < self.lower || value > self.upper;
        outside != self.invert
    }
}

fn parse_bound(spec: &str, atom: &str, empty: f64, tilde: f64) -> Result<f64> {
    match atom {
        "" => Ok(empty),
        "~" => Ok(tilde),
        _ => atom
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                CheckError::InvalidRangeFormat(format!("'{spec}': '{atom}' is not a number"))
            }),
    }
}

/// Evaluates an optional threshold; a missing threshold never alerts.
pub fn evaluate(spec: Option<&RangeSpec>, value: f64) -> bool {
    spec.map_or(false, |range| range.violated_by(value))
}

impl FromStr for RangeSpec {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)?
            .ok_or_else(|| CheckError::InvalidRangeFormat("empty range".to_string()))
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invert {
            write!(f, "@")?;
        }
        if self.lower == f64::NEG_INFINITY {
            write!(f, "~:")?;
        } else if self.lower != 0.0 {
            write!(f, "{}:", self.lower)?;
        }
        if self.upper.is_finite() {
            write!(f, "{}", self.upper)?;
        } else if self.lower == 0.0 {
            // `0:` has no shorter form
            write!(f, "0:")?;
        }
        Ok(())
    }
}
