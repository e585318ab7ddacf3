//! Container discovery and target selection.
//!
//! A [`Discoverer`] asks the [`ContainerRuntime`] for all running containers,
//! resolves the addresses they hold in the networks the monitor cares about and
//! runs every address through the configured [`AccessList`].
//!
//! The networks of interest are the networks of the monitor's own container,
//! located once at startup by name, plus any networks named in configuration.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use crate::container::{ContainerID, ContainerSummary, NetworkID};
use crate::reachability::ProbeTarget;

mod docker;
mod error;
#[cfg(test)]
pub(crate) mod fake;
mod filter;

pub use docker::DockerRuntime;
pub use error::{AccessListError, Error, Result, RuntimeError};
pub use filter::{AccessList, FilterMode};

/// Addresses to probe in one cycle, grouped by network.
pub type Targets = BTreeMap<NetworkID, BTreeSet<String>>;

/// The container runtime operations the monitor depends on.
pub trait ContainerRuntime: Send + Sync {
    fn list_containers(
        &self,
    ) -> impl Future<Output = std::result::Result<Vec<ContainerSummary>, RuntimeError>> + Send;

    /// Returns the address the container holds in each network it is connected to.
    fn inspect(
        &self,
        id: &ContainerID,
    ) -> impl Future<Output = std::result::Result<HashMap<NetworkID, String>, RuntimeError>> + Send;

    /// Connects `container` to `network`.
    fn attach(
        &self,
        network: &NetworkID,
        container: &ContainerID,
    ) -> impl Future<Output = std::result::Result<(), RuntimeError>> + Send;
}

pub struct Discoverer<R> {
    runtime: Arc<R>,
    own_container: Option<ContainerID>,
    own_networks: BTreeSet<NetworkID>,
    networks: BTreeSet<NetworkID>,
    access_list: AccessList,
}

impl<R: ContainerRuntime> Discoverer<R> {
    pub fn new(
        runtime: Arc<R>,
        own_container: Option<ContainerID>,
        own_networks: BTreeSet<NetworkID>,
        extra_networks: impl IntoIterator<Item = NetworkID>,
        access_list: AccessList,
    ) -> Self {
        let networks = own_networks
            .iter()
            .cloned()
            .chain(extra_networks)
            .collect();
        Self {
            runtime,
            own_container,
            own_networks,
            networks,
            access_list,
        }
    }

    /// Locates the monitor's own container by `own_name` and builds a discoverer
    /// for its networks plus `extra_networks`.
    ///
    /// A failed lookup is logged; the discoverer then only covers
    /// `extra_networks` and cannot attach to them.
    pub async fn init(
        runtime: Arc<R>,
        own_name: &str,
        extra_networks: impl IntoIterator<Item = NetworkID>,
        access_list: AccessList,
    ) -> Self {
        let (own_container, own_networks) = match locate_self(runtime.as_ref(), own_name).await {
            Ok((id, networks)) => {
                log::info!(
                    "Monitoring from container `{}` ({}) in networks {:?}",
                    own_name,
                    id,
                    networks
                );
                (Some(id), networks)
            }
            Err(err) => {
                log::error!("failed to locate own container: {}", err);
                (None, BTreeSet::new())
            }
        };

        Self::new(
            runtime,
            own_container,
            own_networks,
            extra_networks,
            access_list,
        )
    }

    pub fn own_container(&self) -> Option<&ContainerID> {
        self.own_container.as_ref()
    }

    /// Networks the monitor's own container was connected to at startup.
    pub fn own_networks(&self) -> &BTreeSet<NetworkID> {
        &self.own_networks
    }

    /// All networks whose addresses are probed.
    pub fn networks(&self) -> &BTreeSet<NetworkID> {
        &self.networks
    }

    /// Runs one discovery pass.
    ///
    /// Errors are logged and yield an empty target set, so a failing runtime
    /// never stops the scan loop.
    pub async fn discover(&self) -> Targets {
        match self.try_discover().await {
            Ok(targets) => group_targets(targets),
            Err(err) => {
                log::error!("failed to discover containers: {}", err);
                Targets::new()
            }
        }
    }

    /// Runs one discovery pass and returns every admitted target.
    ///
    /// # Errors
    ///
    /// - [`Error::Runtime`] if the containers cannot be listed.
    /// - [`Error::NoContainers`] if the runtime reports no containers at all.
    pub async fn try_discover(&self) -> Result<Vec<ProbeTarget>> {
        let containers = self.runtime.list_containers().await?;
        if containers.is_empty() {
            return Err(Error::NoContainers);
        }

        let mut targets = Vec::new();
        for container in &containers {
            let Some(name) = container.primary_name() else {
                log::warn!("Skipping unnamed container `{}`", container.id);
                continue;
            };
            let addresses = match self.runtime.inspect(&container.id).await {
                Ok(addresses) => addresses,
                Err(err) => {
                    log::error!("{}", err);
                    continue;
                }
            };
            for (network_id, ip) in addresses {
                if !self.networks.contains(&network_id) {
                    continue;
                }
                if !self.access_list.admits(&ip, name) {
                    log::trace!("Access list excludes `{}` ({})", ip, name);
                    continue;
                }
                targets.push(ProbeTarget {
                    network_id,
                    ip,
                    container_name: name.to_owned(),
                });
            }
        }
        log::debug!(
            "Discovered {} targets in {} containers",
            targets.len(),
            containers.len()
        );

        Ok(targets)
    }
}

/// Finds the container named `own_name` and the networks it is connected to.
///
/// # Errors
///
/// - [`Error::Runtime`] if listing or inspecting fails.
/// - [`Error::OwnContainerNotFound`] if no container carries that name.
pub async fn locate_self<R: ContainerRuntime>(
    runtime: &R,
    own_name: &str,
) -> Result<(ContainerID, BTreeSet<NetworkID>)> {
    let containers = runtime.list_containers().await?;
    let own = containers
        .into_iter()
        .find(|container| container.primary_name() == Some(own_name))
        .ok_or_else(|| Error::OwnContainerNotFound(own_name.to_owned()))?;
    let networks = runtime.inspect(&own.id).await?.into_keys().collect();

    Ok((own.id, networks))
}

pub fn group_targets(targets: impl IntoIterator<Item = ProbeTarget>) -> Targets {
    let mut out = Targets::new();
    for target in targets {
        out.entry(target.network_id).or_default().insert(target.ip);
    }
    out
}
