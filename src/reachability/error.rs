#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed reachability batch: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("report without ip address")]
    EmptyIP,
    #[error("`{0}` is not an ip address")]
    InvalidIP(String),
    #[error("report without last_ping timestamp")]
    EmptyTimestamp,
    #[error("invalid last_ping timestamp `{value}`: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("packet loss {0} outside of [0, 1]")]
    InvalidPacketLoss(f64),
    #[error("none of the {total} reports in the batch is valid")]
    NoValidReports { total: usize },
}
