//! Reachability observations and their wire representation.
//!
//! A [`ProbeResult`] is what the fan-out prober produces for one IP in one cycle.
//! Results travel between the pinger and the backend as a [`ReachabilityBatch`],
//! the JSON document `{"containers": [...]}` shared by the message channel and
//! the HTTP ingress.
use chrono::{NaiveDateTime, SubsecRound, Utc};

use crate::container::NetworkID;

mod batch;
mod error;

pub use batch::{PingReport, ReachabilityBatch, RejectedReport, ValidatedBatch};
pub use error::ValidationError;

/// Wire format of `last_ping`, e.g. `2024-01-01 00:00:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One address selected for probing during a discovery cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub network_id: NetworkID,
    pub ip: String,
    pub container_name: String,
}

/// Outcome of probing a single IP.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub ip: String,
    pub is_reachable: bool,
    /// UTC time of the observation, truncated to whole seconds.
    pub observed_at: NaiveDateTime,
    /// Fraction of lost packets in `[0, 1]`.
    pub packet_loss: f64,
}

impl ProbeResult {
    pub fn new(
        ip: impl Into<String>,
        is_reachable: bool,
        observed_at: NaiveDateTime,
        packet_loss: f64,
    ) -> Self {
        Self {
            ip: ip.into(),
            is_reachable,
            observed_at,
            packet_loss,
        }
    }

    /// An unreachable observation taken now with no packets accounted for.
    pub fn unreachable(ip: impl Into<String>) -> Self {
        Self::new(ip, false, now(), 0.0)
    }
}

/// Current UTC time with the precision the wire format can carry.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

/// Parses a `last_ping` value in [`TIMESTAMP_FORMAT`].
///
/// # Errors
///
/// Returns [`ValidationError::EmptyTimestamp`] for an empty string and
/// [`ValidationError::InvalidTimestamp`] if the value does not match the format.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyTimestamp);
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|source| {
        ValidationError::InvalidTimestamp {
            value: value.to_owned(),
            source,
        }
    })
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}
