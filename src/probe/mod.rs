//! Reachability probing.
//!
//! - [`Prober`]: the ICMP echo primitive, implemented by [`IcmpProber`].
//! - [`NetworkAttacher`]: joins the monitor's own container to networks it has
//!   to probe, at most once per network.
//! - [`FanOutProber`]: probes every target of a cycle concurrently, bounded by a
//!   concurrency cap, and aggregates one [`ProbeResult`](crate::reachability::ProbeResult)
//!   per IP.
use std::future::Future;
use std::time::Duration;

mod attach;
mod error;
#[cfg(test)]
pub(crate) mod fake;
mod fanout;
mod icmp;

pub use attach::NetworkAttacher;
pub use error::{AttachError, ProbeError};
pub use fanout::FanOutProber;
pub use icmp::IcmpProber;

/// How many echo requests to send and how long a probe may take in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub packet_count: u16,
    pub timeout: Duration,
}

/// Packet counters of one finished probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeStats {
    pub packets_sent: u32,
    pub packets_received: u32,
}

impl ProbeStats {
    pub fn new(packets_sent: u32, packets_received: u32) -> Self {
        Self {
            packets_sent,
            packets_received,
        }
    }

    /// A target is reachable if it answered at least one echo request.
    pub fn is_reachable(&self) -> bool {
        self.packets_received > 0
    }

    /// Fraction of sent packets that were not answered, in `[0, 1]`.
    pub fn packet_loss(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        let received = self.packets_received.min(self.packets_sent);
        1.0 - f64::from(received) / f64::from(self.packets_sent)
    }
}

/// Sends ICMP echo requests to a single address.
pub trait Prober: Send + Sync {
    fn probe(
        &self,
        ip: &str,
        settings: ProbeSettings,
    ) -> impl Future<Output = Result<ProbeStats, ProbeError>> + Send;
}
