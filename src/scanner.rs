//! The pinger's periodic cycle: discover, probe, emit.
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::broker::Publisher;
use crate::discovery::{ContainerRuntime, Discoverer};
use crate::emitter::Emitter;
use crate::error::ResultOkLogExt;
use crate::probe::{FanOutProber, Prober};

/// What happened during one cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub targets: usize,
    pub results: usize,
    pub reachable: usize,
    pub emitted: usize,
}

pub struct Scanner<R, P, B> {
    discoverer: Discoverer<R>,
    prober: FanOutProber<R, P>,
    emitter: Emitter<B>,
}

impl<R, P, B> Scanner<R, P, B>
where
    R: ContainerRuntime + 'static,
    P: Prober + 'static,
    B: Publisher,
{
    pub fn new(discoverer: Discoverer<R>, prober: FanOutProber<R, P>, emitter: Emitter<B>) -> Self {
        Self {
            discoverer,
            prober,
            emitter,
        }
    }

    /// Runs one full cycle. Every probe has finished and the batch has been
    /// handed off before this returns.
    pub async fn run_cycle(&self) -> CycleSummary {
        let targets = self.discoverer.discover().await;
        let mut summary = CycleSummary {
            targets: targets.values().map(|ips| ips.len()).sum(),
            ..CycleSummary::default()
        };
        if targets.is_empty() {
            log::debug!("No targets this cycle");
            return summary;
        }

        let results = self.prober.probe_cycle(&targets).await;
        summary.results = results.len();
        summary.reachable = results.values().filter(|r| r.is_reachable).count();
        if results.is_empty() {
            return summary;
        }

        summary.emitted = self
            .emitter
            .emit(results.values())
            .await
            .ok_log_context("dropping batch")
            .unwrap_or(0);

        summary
    }

    /// Runs a cycle every `interval` until the surrounding task is cancelled.
    ///
    /// A cycle that overruns delays the next tick instead of bunching up ticks.
    pub async fn run(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let summary = self.run_cycle().await;
            log::info!(
                "Cycle finished: targets={}, reachable={}/{}, emitted={}",
                summary.targets,
                summary.reachable,
                summary.results,
                summary.emitted
            );
        }
    }
}
