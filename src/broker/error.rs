#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to connect to message broker: {0}")]
    Connect(#[source] lapin::Error),
    #[error("failed to publish to queue `{queue}`: {source}")]
    Amqp {
        queue: String,
        #[source]
        source: lapin::Error,
    },
    #[error("broker did not confirm delivery to queue `{0}`")]
    Nacked(String),
    #[error("failed to send batch over http: {0}")]
    Http(#[source] reqwest::Error),
    #[error("ingress rejected batch with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("message channel is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error("failed to connect to message broker: {0}")]
    Connect(#[source] lapin::Error),
    #[error("failed to subscribe to queue `{queue}`: {source}")]
    Subscribe {
        queue: String,
        #[source]
        source: lapin::Error,
    },
    #[error("failed to receive delivery: {0}")]
    Delivery(#[source] lapin::Error),
}
