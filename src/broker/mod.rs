//! Transport of serialized batches between the pinger and the backend.
use std::future::Future;

mod amqp;
mod error;
mod http;
pub mod memory;

pub use amqp::{AmqpConsumer, AmqpPublisher};
pub use error::{ConsumeError, PublishError};
pub use http::HttpPublisher;

/// Hands a serialized batch to a transport.
pub trait Publisher: Send + Sync {
    fn publish(&self, payload: Vec<u8>)
    -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// Yields serialized batches one at a time.
pub trait Consumer: Send {
    /// Waits for the next payload. `Ok(None)` means the channel is closed for
    /// good.
    fn next_payload(
        &mut self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, ConsumeError>> + Send;
}
