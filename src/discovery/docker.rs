use std::collections::HashMap;

use bollard::Docker;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::models::EndpointSettings;
use bollard::network::ConnectNetworkOptions;

use crate::container::{ContainerID, ContainerSummary, NetworkID};

use super::{ContainerRuntime, RuntimeError};

/// [`ContainerRuntime`] backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects using `DOCKER_HOST` or the platform's default socket.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Connect`] if the client cannot be configured.
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_defaults().map_err(RuntimeError::Connect)?;
        log::debug!("Configured docker client");
        Ok(Self { docker })
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String>::default()))
            .await
            .map_err(RuntimeError::List)?;

        let mut out = Vec::with_capacity(containers.len());
        for container in containers {
            let Some(id) = container.id else {
                log::warn!("Skipping container without id: {:?}", container.names);
                continue;
            };
            match ContainerID::new(&id) {
                Ok(id) => out.push(ContainerSummary::new(id, container.names.unwrap_or_default())),
                Err(err) => log::warn!("Skipping container: {}", err),
            }
        }

        Ok(out)
    }

    async fn inspect(&self, id: &ContainerID) -> Result<HashMap<NetworkID, String>, RuntimeError> {
        let response = self
            .docker
            .inspect_container(id.as_ref(), None::<InspectContainerOptions>)
            .await
            .map_err(|source| RuntimeError::Inspect {
                id: id.clone(),
                source,
            })?;

        let networks = response
            .network_settings
            .and_then(|settings| settings.networks)
            .unwrap_or_default();

        let mut out = HashMap::with_capacity(networks.len());
        for (name, endpoint) in networks {
            let ip = endpoint.ip_address.unwrap_or_default();
            if ip.is_empty() {
                log::trace!("Container `{}` has no address in network `{}`", id, name);
                continue;
            }
            out.insert(NetworkID::new(name)?, ip);
        }

        Ok(out)
    }

    async fn attach(&self, network: &NetworkID, container: &ContainerID) -> Result<(), RuntimeError> {
        let options = ConnectNetworkOptions {
            container: container.as_ref(),
            endpoint_config: EndpointSettings::default(),
        };
        match self.docker.connect_network(network.as_ref(), options).await {
            Ok(()) => Ok(()),
            // Docker answers 403 when the endpoint is already part of the network.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 403,
                message,
            }) if message.contains("already exists") => {
                log::debug!(
                    "Container `{}` is already connected to network `{}`",
                    container,
                    network
                );
                Ok(())
            }
            Err(source) => Err(RuntimeError::Attach {
                network: network.clone(),
                container: container.clone(),
                source,
            }),
        }
    }
}
