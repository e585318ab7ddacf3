use std::net::IpAddr;

use super::{ProbeResult, ValidationError, format_timestamp, parse_timestamp};

/// A single reachability report as it appears on the wire.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PingReport {
    pub ip_address: String,
    pub is_reachable: bool,
    pub last_ping: String,
    #[serde(rename = "packer_lost", default)]
    pub packet_loss: f64,
}

impl From<&ProbeResult> for PingReport {
    fn from(value: &ProbeResult) -> Self {
        Self {
            ip_address: value.ip.clone(),
            is_reachable: value.is_reachable,
            last_ping: format_timestamp(&value.observed_at),
            packet_loss: value.packet_loss,
        }
    }
}

impl TryFrom<&PingReport> for ProbeResult {
    type Error = ValidationError;

    fn try_from(value: &PingReport) -> Result<Self, Self::Error> {
        if value.ip_address.is_empty() {
            return Err(ValidationError::EmptyIP);
        }
        if value.ip_address.parse::<IpAddr>().is_err() {
            return Err(ValidationError::InvalidIP(value.ip_address.clone()));
        }
        let observed_at = parse_timestamp(&value.last_ping)?;
        if !(0.0..=1.0).contains(&value.packet_loss) {
            return Err(ValidationError::InvalidPacketLoss(value.packet_loss));
        }

        Ok(ProbeResult::new(
            value.ip_address.as_str(),
            value.is_reachable,
            observed_at,
            value.packet_loss,
        ))
    }
}

/// The unit of transfer between the pinger and the backend.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReachabilityBatch {
    pub containers: Vec<PingReport>,
}

/// A report that failed validation, with its position in the batch.
#[derive(Debug)]
pub struct RejectedReport {
    pub index: usize,
    pub error: ValidationError,
}

/// The valid part of a [`ReachabilityBatch`], in batch order.
#[derive(Debug)]
pub struct ValidatedBatch {
    pub results: Vec<ProbeResult>,
    pub rejected: Vec<RejectedReport>,
}

impl ReachabilityBatch {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ProbeResult>) -> Self {
        Self {
            containers: results.into_iter().map(PingReport::from).collect(),
        }
    }

    /// Decodes a batch from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Malformed`] if the payload is not a batch document.
    pub fn from_slice(payload: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(payload).map_err(ValidationError::Malformed)
    }

    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Splits the batch into valid results and rejected reports.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoValidReports`] if not a single report is valid,
    /// which includes the empty batch.
    pub fn validate(&self) -> Result<ValidatedBatch, ValidationError> {
        let mut results = Vec::with_capacity(self.containers.len());
        let mut rejected = Vec::new();
        for (index, report) in self.containers.iter().enumerate() {
            match ProbeResult::try_from(report) {
                Ok(result) => results.push(result),
                Err(error) => rejected.push(RejectedReport { index, error }),
            }
        }

        if results.is_empty() {
            return Err(ValidationError::NoValidReports {
                total: self.containers.len(),
            });
        }

        Ok(ValidatedBatch { results, rejected })
    }
}
