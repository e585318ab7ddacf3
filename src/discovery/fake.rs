//! In-memory [`ContainerRuntime`] for tests.
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::container::{ContainerID, ContainerSummary, NetworkID};

use super::{ContainerRuntime, RuntimeError};

fn server_error(status_code: u16, message: &str) -> bollard::errors::Error {
    bollard::errors::Error::DockerResponseServerError {
        status_code,
        message: message.to_owned(),
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeRuntime {
    containers: Vec<(ContainerSummary, HashMap<NetworkID, String>)>,
    fail_list: bool,
    fail_attach: HashSet<NetworkID>,
    attach_delay: Option<Duration>,
    attach_calls: Mutex<Vec<NetworkID>>,
}

impl FakeRuntime {
    pub(crate) fn with_container(
        mut self,
        id: &str,
        names: &[&str],
        networks: &[(&str, &str)],
    ) -> Self {
        let summary = ContainerSummary::new(
            ContainerID::new(id).unwrap(),
            names.iter().map(|n| (*n).to_owned()).collect(),
        );
        let networks = networks
            .iter()
            .map(|(net, ip)| (NetworkID::new(net).unwrap(), (*ip).to_owned()))
            .collect();
        self.containers.push((summary, networks));
        self
    }

    pub(crate) fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub(crate) fn failing_attach(mut self, network: &str) -> Self {
        self.fail_attach.insert(NetworkID::new(network).unwrap());
        self
    }

    pub(crate) fn with_attach_delay(mut self, delay: Duration) -> Self {
        self.attach_delay = Some(delay);
        self
    }

    pub(crate) fn attach_calls(&self) -> Vec<NetworkID> {
        self.attach_calls.lock().unwrap().clone()
    }
}

impl ContainerRuntime for FakeRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        if self.fail_list {
            return Err(RuntimeError::List(server_error(500, "daemon unavailable")));
        }
        Ok(self.containers.iter().map(|(c, _)| c.clone()).collect())
    }

    async fn inspect(&self, id: &ContainerID) -> Result<HashMap<NetworkID, String>, RuntimeError> {
        self.containers
            .iter()
            .find(|(c, _)| &c.id == id)
            .map(|(_, networks)| networks.clone())
            .ok_or_else(|| RuntimeError::Inspect {
                id: id.clone(),
                source: server_error(404, "no such container"),
            })
    }

    async fn attach(&self, network: &NetworkID, container: &ContainerID) -> Result<(), RuntimeError> {
        self.attach_calls.lock().unwrap().push(network.clone());
        if let Some(delay) = self.attach_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_attach.contains(network) {
            return Err(RuntimeError::Attach {
                network: network.clone(),
                container: container.clone(),
                source: server_error(404, "network not found"),
            });
        }
        Ok(())
    }
}
