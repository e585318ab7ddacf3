use crate::container::NetworkID;
use crate::discovery::RuntimeError;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid ip address `{0}`")]
    InvalidAddress(String),
    #[error("probing `{0}` is not supported, only IPv4 targets can be probed")]
    Unsupported(String),
    #[error("failed to open ICMP socket: {0}")]
    Socket(#[source] std::io::Error),
    #[error("failed to send echo request to `{ip}`: {source}")]
    Send {
        ip: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to receive echo reply: {0}")]
    Receive(#[source] std::io::Error),
    #[error("echo request could not be built")]
    Packet,
    #[error("probe task failed: {0}")]
    Task(#[source] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    #[error("cannot attach to network `{0}`: own container is unknown")]
    UnknownSelf(NetworkID),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
