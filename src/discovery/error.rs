use std::path::PathBuf;

use crate::container::{self, ContainerID, NetworkID};

/// Failures reported by a [`ContainerRuntime`](super::ContainerRuntime).
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to connect to container runtime: {0}")]
    Connect(#[source] bollard::errors::Error),
    #[error("failed to list containers: {0}")]
    List(#[source] bollard::errors::Error),
    #[error("failed to inspect container `{id}`: {source}")]
    Inspect {
        id: ContainerID,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("failed to connect container `{container}` to network `{network}`: {source}")]
    Attach {
        network: NetworkID,
        container: ContainerID,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("container runtime returned an invalid identifier: {0}")]
    InvalidID(#[from] container::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("container runtime reported 0 containers")]
    NoContainers,
    #[error("no container named `{0}` found")]
    OwnContainerNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum AccessListError {
    #[error("failed to read access list `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown access list mode `{0}` (expected `allow` or `deny`)")]
    UnknownMode(String),
}
