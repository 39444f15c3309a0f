//! The fixed catalog of checkable metrics and how each is derived from raw
//! varnishstat counters.

use crate::collectors::RawStats;
use crate::error::{CheckError, Result};
use crate::rate::round2;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    ClientGoodRequestRate,
    ClientBadRequestRate,
    CacheHitratePct,
    CacheHitRatioPct,
    BackendReusePct,
    CacheHitforpassRate,
    CachedObjectsExpiredRate,
    CachedObjectsNukedRate,
    ThreadsFailedRate,
    ThreadsFailedAtLimitRate,
    SessionQueueRate,
    BackendRequestRate,
    BackendConnectionRate,
    BackendConnectionSaturationRate,
    BackendUnattemptedConnectionsRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// One field reported as-is.
    Direct { field: &'static str },
    /// `100 * sum(numerator) / sum(denominator)`, 0 when the denominator is 0.
    Ratio {
        numerator: &'static [&'static str],
        denominator: &'static [&'static str],
    },
    /// Per-second change of the summed counters.
    Rate { counters: &'static [&'static str] },
}

/// What a metric yields from a single statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Final value, ready for threshold evaluation.
    Value(f64),
    /// Raw counter total that still has to go through the rate calculator.
    Counter(f64),
}

impl Metric {
    pub const ALL: [Metric; 15] = [
        Metric::ClientGoodRequestRate,
        Metric::ClientBadRequestRate,
        Metric::CacheHitratePct,
        Metric::CacheHitRatioPct,
        Metric::BackendReusePct,
        Metric::CacheHitforpassRate,
        Metric::CachedObjectsExpiredRate,
        Metric::CachedObjectsNukedRate,
        Metric::ThreadsFailedRate,
        Metric::ThreadsFailedAtLimitRate,
        Metric::SessionQueueRate,
        Metric::BackendRequestRate,
        Metric::BackendConnectionRate,
        Metric::BackendConnectionSaturationRate,
        Metric::BackendUnattemptedConnectionsRate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::ClientGoodRequestRate => "client_good_request_rate",
            Metric::ClientBadRequestRate => "client_bad_request_rate",
            Metric::CacheHitratePct => "cache_hitrate_pct",
            Metric::CacheHitRatioPct => "cache_hit_ratio_pct",
            Metric::BackendReusePct => "backend_reuse_pct",
            Metric::CacheHitforpassRate => "cache_hitforpass_rate",
            Metric::CachedObjectsExpiredRate => "cached_objects_expired_rate",
            Metric::CachedObjectsNukedRate => "cached_objects_nuked_rate",
            Metric::ThreadsFailedRate => "threads_failed_rate",
            Metric::ThreadsFailedAtLimitRate => "threads_failed_at_limit_rate",
            Metric::SessionQueueRate => "session_queue_rate",
            Metric::BackendRequestRate => "backend_request_rate",
            Metric::BackendConnectionRate => "backend_connection_rate",
            Metric::BackendConnectionSaturationRate => "backend_connection_saturation_rate",
            Metric::BackendUnattemptedConnectionsRate => "backend_unattempted_connections_rate",
        }
    }

    pub fn kind(self) -> MetricKind {
        use MetricKind::*;

        match self {
            Metric::ClientGoodRequestRate => Rate {
                counters: &["MAIN.client_req"],
            },
            Metric::ClientBadRequestRate => Rate {
                counters: &["MAIN.client_req_400", "MAIN.client_req_417"],
            },
            Metric::CacheHitratePct => Direct {
                field: "MAIN.cache_hitrate",
            },
            Metric::CacheHitRatioPct => Ratio {
                numerator: &["MAIN.cache_hit"],
                denominator: &["MAIN.cache_hit", "MAIN.cache_miss"],
            },
            Metric::BackendReusePct => Ratio {
                numerator: &["MAIN.backend_reuse"],
                denominator: &["MAIN.backend_conn", "MAIN.backend_reuse"],
            },
            Metric::CacheHitforpassRate => Rate {
                counters: &["MAIN.cache_hitpass"],
            },
            Metric::CachedObjectsExpiredRate => Rate {
                counters: &["MAIN.n_expired"],
            },
            Metric::CachedObjectsNukedRate => Rate {
                counters: &["MAIN.n_lru_nuked"],
            },
            Metric::ThreadsFailedRate => Rate {
                counters: &["MAIN.threads_failed"],
            },
            Metric::ThreadsFailedAtLimitRate => Rate {
                counters: &["MAIN.threads_limited"],
            },
            Metric::SessionQueueRate => Rate {
                counters: &["MAIN.sess_queued"],
            },
            Metric::BackendRequestRate => Rate {
                counters: &["MAIN.backend_req"],
            },
            Metric::BackendConnectionRate => Rate {
                counters: &["MAIN.backend_conn"],
            },
            Metric::BackendConnectionSaturationRate => Rate {
                counters: &["MAIN.backend_busy"],
            },
            Metric::BackendUnattemptedConnectionsRate => Rate {
                counters: &["MAIN.backend_unhealthy"],
            },
        }
    }

    pub fn is_rate(self) -> bool {
        matches!(self.kind(), MetricKind::Rate { .. })
    }

    /// Unit of measure used in performance data.
    pub fn unit(self) -> &'static str {
        match self.kind() {
            MetricKind::Direct { .. } | MetricKind::Ratio { .. } => "%",
            MetricKind::Rate { .. } => "",
        }
    }

    /// Distinct varnishstat fields needed to resolve this metric.
    pub fn source_fields(self) -> Vec<&'static str> {
        let mut fields: Vec<&'static str> = match self.kind() {
            MetricKind::Direct { field } => vec![field],
            MetricKind::Ratio {
                numerator,
                denominator,
            } => numerator.iter().chain(denominator).copied().collect(),
            MetricKind::Rate { counters } => counters.to_vec(),
        };
        fields.sort_unstable();
        fields.dedup();
        fields
    }

    pub fn resolve(self, stats: &RawStats) -> Result<Reading> {
        match self.kind() {
            MetricKind::Direct { field } => Ok(Reading::Value(stats.get(field)?)),
            MetricKind::Ratio {
                numerator,
                denominator,
            } => Ok(Reading::Value(percentage(
                stats.sum(numerator)?,
                stats.sum(denominator)?,
            ))),
            MetricKind::Rate { counters } => Ok(Reading::Counter(stats.sum(counters)?)),
        }
    }

    /// Human readable summary for a resolved value.
    pub fn describe(self, value: f64) -> String {
        match self {
            Metric::ClientGoodRequestRate => {
                format!("{value} client requests/s, not subject to 4XX response")
            }
            Metric::ClientBadRequestRate => {
                format!("{value} client requests/s subject to 4XX response")
            }
            Metric::CacheHitratePct => format!("{value}% of requests satisfied by cache"),
            Metric::CacheHitRatioPct => format!("{value}% of lookups were cache hits"),
            Metric::BackendReusePct => format!("{value}% of backend connections reused"),
            Metric::CacheHitforpassRate => format!("{value} requests/s marked hit for pass"),
            Metric::CachedObjectsExpiredRate => format!("{value} objects/s expired due to ttl"),
            Metric::CachedObjectsNukedRate => {
                format!("{value} objects/s nuked from cache due to saturation")
            }
            Metric::ThreadsFailedRate => format!("failed to create {value} threads/s"),
            Metric::ThreadsFailedAtLimitRate => {
                format!("failed to create {value} threads/s because of configured limit")
            }
            Metric::SessionQueueRate => {
                format!("{value} sessions/s queued waiting for a worker thread")
            }
            Metric::BackendRequestRate => format!("{value} backend requests/s sent"),
            Metric::BackendConnectionRate => format!("{value} backend connections/s"),
            Metric::BackendConnectionSaturationRate => {
                format!("max backend connections reached {value} times/s")
            }
            Metric::BackendUnattemptedConnectionsRate => {
                format!("{value} backend connections/s not attempted due to unhealthy status")
            }
        }
    }

    /// Comma separated catalog, for help output.
    pub fn catalog() -> String {
        Self::ALL
            .iter()
            .map(|m| m.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `100 * part / total` rounded to two decimals; no activity yields 0.
pub fn percentage(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        round2(100.0 * part / total)
    } else {
        0.0
    }
}

impl FromStr for Metric {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| CheckError::UnknownMetric(s.to_string()))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
