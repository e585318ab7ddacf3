use chrono::NaiveDateTime;

use crate::reachability::{PingReport, ProbeResult, format_timestamp};

/// A row of the `containers` table: the latest known reachability of one IP.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ReachabilityRecord {
    pub ip_address: String,
    pub is_reachable: bool,
    pub last_ping: NaiveDateTime,
    pub packet_lost: f64,
}

impl ReachabilityRecord {
    /// Whether this record should replace `stored` under last-write-wins.
    pub fn supersedes(&self, stored: &ReachabilityRecord) -> bool {
        self.last_ping > stored.last_ping
    }
}

impl From<ProbeResult> for ReachabilityRecord {
    fn from(value: ProbeResult) -> Self {
        Self {
            ip_address: value.ip,
            is_reachable: value.is_reachable,
            last_ping: value.observed_at,
            packet_lost: value.packet_loss,
        }
    }
}

impl From<&ReachabilityRecord> for PingReport {
    fn from(value: &ReachabilityRecord) -> Self {
        Self {
            ip_address: value.ip_address.clone(),
            is_reachable: value.is_reachable,
            last_ping: format_timestamp(&value.last_ping),
            packet_loss: value.packet_lost,
        }
    }
}
