use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::container::NetworkID;
use crate::discovery::{ContainerRuntime, Targets};
use crate::reachability::{self, ProbeResult};

use super::{NetworkAttacher, ProbeSettings, Prober};

/// Probes all targets of a cycle concurrently.
pub struct FanOutProber<R, P> {
    attacher: Arc<NetworkAttacher<R>>,
    prober: Arc<P>,
    settings: ProbeSettings,
    permits: Arc<Semaphore>,
}

impl<R, P> FanOutProber<R, P>
where
    R: ContainerRuntime + 'static,
    P: Prober + 'static,
{
    /// Creates a prober running at most `concurrency` probes at a time.
    pub fn new(
        attacher: Arc<NetworkAttacher<R>>,
        prober: Arc<P>,
        settings: ProbeSettings,
        concurrency: usize,
    ) -> Self {
        Self {
            attacher,
            prober,
            settings,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Probes every `(network, ip)` pair and returns one result per IP.
    ///
    /// Returns only after every spawned probe has finished. An IP listed under
    /// several networks keeps its most recent observation.
    pub async fn probe_cycle(&self, targets: &Targets) -> HashMap<String, ProbeResult> {
        let mut tasks = JoinSet::new();
        for (network, ips) in targets {
            for ip in ips {
                let attacher = Arc::clone(&self.attacher);
                let prober = Arc::clone(&self.prober);
                let permits = Arc::clone(&self.permits);
                let network = network.clone();
                let ip = ip.clone();
                let settings = self.settings;
                tasks.spawn(async move {
                    let _permit = permits.acquire_owned().await;
                    probe_target(&attacher, prober.as_ref(), &network, ip, settings).await
                });
            }
        }
        log::debug!("Started {} probes", tasks.len());

        let mut results = HashMap::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => merge_result(&mut results, result),
                Err(err) => log::error!("probe task failed: {}", err),
            }
        }

        results
    }
}

async fn probe_target<R: ContainerRuntime, P: Prober>(
    attacher: &NetworkAttacher<R>,
    prober: &P,
    network: &NetworkID,
    ip: String,
    settings: ProbeSettings,
) -> ProbeResult {
    if let Err(err) = attacher.ensure_attached(network).await {
        log::error!("failed to reach network of `{}`: {}", ip, err);
        return ProbeResult::unreachable(ip);
    }

    match prober.probe(&ip, settings).await {
        Ok(stats) => {
            log::debug!(
                "Pinged `{}` in `{}`: sent={}, received={}",
                ip,
                network,
                stats.packets_sent,
                stats.packets_received
            );
            ProbeResult::new(
                ip,
                stats.is_reachable(),
                reachability::now(),
                stats.packet_loss(),
            )
        }
        Err(err) => {
            log::error!("failed to ping `{}`: {}", ip, err);
            ProbeResult::unreachable(ip)
        }
    }
}

/// Keeps the newer of two observations of one IP; on a tie a reachable
/// observation replaces an unreachable one.
fn merge_result(results: &mut HashMap<String, ProbeResult>, result: ProbeResult) {
    match results.entry(result.ip.clone()) {
        Entry::Vacant(entry) => {
            entry.insert(result);
        }
        Entry::Occupied(mut entry) => {
            let current = entry.get();
            let newer = result.observed_at > current.observed_at;
            let tie_breaks = result.observed_at == current.observed_at
                && result.is_reachable
                && !current.is_reachable;
            if newer || tie_breaks {
                entry.insert(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerID;
    use crate::discovery::fake::FakeRuntime;
    use crate::probe::fake::FakeProber;
    use std::collections::BTreeSet;
    use std::time::Duration;

    const SETTINGS: ProbeSettings = ProbeSettings {
        packet_count: 4,
        timeout: Duration::from_secs(1),
    };

    fn network(name: &str) -> NetworkID {
        NetworkID::new(name).unwrap()
    }

    fn targets(entries: &[(&str, &[&str])]) -> Targets {
        entries
            .iter()
            .map(|(net, ips)| {
                (
                    network(net),
                    ips.iter().map(|ip| (*ip).to_owned()).collect::<BTreeSet<_>>(),
                )
            })
            .collect()
    }

    fn fan_out(
        runtime: FakeRuntime,
        prober: FakeProber,
        concurrency: usize,
    ) -> (FanOutProber<FakeRuntime, FakeProber>, Arc<FakeProber>) {
        let attacher = Arc::new(NetworkAttacher::new(
            Arc::new(runtime),
            Some(ContainerID::new("self").unwrap()),
            [network("app")],
        ));
        let prober = Arc::new(prober);
        (
            FanOutProber::new(attacher, Arc::clone(&prober), SETTINGS, concurrency),
            prober,
        )
    }

    #[tokio::test]
    async fn test_probe_cycle_classifies_results() {
        let prober = FakeProber::default()
            .answering("10.0.0.1", 4, 3)
            .answering("10.0.0.2", 4, 0);
        let (fan_out, _) = fan_out(FakeRuntime::default(), prober, 8);

        let results = fan_out
            .probe_cycle(&targets(&[("app", &["10.0.0.1", "10.0.0.2", "bogus"])]))
            .await;

        assert_eq!(results.len(), 3);
        let up = &results["10.0.0.1"];
        assert!(up.is_reachable);
        assert_eq!(up.packet_loss, 0.25);
        let down = &results["10.0.0.2"];
        assert!(!down.is_reachable);
        assert_eq!(down.packet_loss, 1.0);
        let failed = &results["bogus"];
        assert!(!failed.is_reachable);
        assert_eq!(failed.packet_loss, 0.0);
    }

    #[tokio::test]
    async fn test_attach_failure_marks_targets_unreachable() {
        let runtime = FakeRuntime::default().failing_attach("isolated");
        let prober = FakeProber::default()
            .answering("10.0.0.1", 4, 4)
            .answering("10.1.0.1", 4, 4);
        let (fan_out, prober) = fan_out(runtime, prober, 8);

        let results = fan_out
            .probe_cycle(&targets(&[
                ("app", &["10.0.0.1"]),
                ("isolated", &["10.1.0.1"]),
            ]))
            .await;

        assert!(results["10.0.0.1"].is_reachable);
        assert!(!results["10.1.0.1"].is_reachable);
        assert_eq!(prober.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let ips: Vec<String> = (1..=12).map(|i| format!("10.0.0.{i}")).collect();
        let mut prober = FakeProber::default().with_delay(Duration::from_millis(20));
        for ip in &ips {
            prober = prober.answering(ip, 1, 1);
        }
        let (fan_out, prober) = fan_out(FakeRuntime::default(), prober, 3);

        let ip_refs: Vec<&str> = ips.iter().map(String::as_str).collect();
        let results = fan_out.probe_cycle(&targets(&[("app", &ip_refs)])).await;

        assert_eq!(results.len(), 12);
        assert_eq!(prober.calls(), 12);
        assert!(prober.max_in_flight() <= 3);
    }

    #[tokio::test]
    async fn test_duplicate_ip_across_networks_yields_one_result() {
        let prober = FakeProber::default().answering("10.0.0.1", 2, 2);
        let (fan_out, prober) = fan_out(FakeRuntime::default(), prober, 8);

        let results = fan_out
            .probe_cycle(&targets(&[
                ("app", &["10.0.0.1"]),
                ("storage", &["10.0.0.1"]),
            ]))
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(prober.calls(), 2);
        assert!(results["10.0.0.1"].is_reachable);
    }

    #[tokio::test]
    async fn test_empty_targets() {
        let (fan_out, prober) = fan_out(FakeRuntime::default(), FakeProber::default(), 1);
        assert!(fan_out.probe_cycle(&Targets::new()).await.is_empty());
        assert_eq!(prober.calls(), 0);
    }

    #[test]
    fn test_merge_result_prefers_newer_then_reachable() {
        let at = |s: &str| reachability::parse_timestamp(s).unwrap();
        let mut results = HashMap::new();
        merge_result(
            &mut results,
            ProbeResult::new("ip", true, at("2024-01-01 00:00:01"), 0.0),
        );
        merge_result(
            &mut results,
            ProbeResult::new("ip", false, at("2024-01-01 00:00:00"), 1.0),
        );
        assert!(results["ip"].is_reachable);

        merge_result(
            &mut results,
            ProbeResult::new("ip", false, at("2024-01-01 00:00:02"), 1.0),
        );
        assert!(!results["ip"].is_reachable);

        merge_result(
            &mut results,
            ProbeResult::new("ip", true, at("2024-01-01 00:00:02"), 0.5),
        );
        assert!(results["ip"].is_reachable);
        assert_eq!(results["ip"].packet_loss, 0.5);
    }
}
