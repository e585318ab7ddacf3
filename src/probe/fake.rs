//! Scripted [`Prober`] for tests.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{ProbeError, ProbeSettings, ProbeStats, Prober};

/// Answers with the stats registered for an IP and fails for unknown IPs.
#[derive(Debug, Default)]
pub(crate) struct FakeProber {
    outcomes: HashMap<String, ProbeStats>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeProber {
    pub(crate) fn answering(mut self, ip: &str, sent: u32, received: u32) -> Self {
        self.outcomes
            .insert(ip.to_owned(), ProbeStats::new(sent, received));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Prober for FakeProber {
    async fn probe(&self, ip: &str, _settings: ProbeSettings) -> Result<ProbeStats, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.outcomes
            .get(ip)
            .copied()
            .ok_or_else(|| ProbeError::InvalidAddress(ip.to_owned()))
    }
}
