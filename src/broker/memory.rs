//! In-process message channel, used when pinger and consumer share a process
//! and in tests.
use tokio::sync::mpsc;

use super::{ConsumeError, Consumer, PublishError, Publisher};

/// Creates a bounded channel holding up to `capacity` payloads.
pub fn channel(capacity: usize) -> (MemoryPublisher, MemoryConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MemoryPublisher { tx }, MemoryConsumer { rx })
}

#[derive(Debug, Clone)]
pub struct MemoryPublisher {
    tx: mpsc::Sender<Vec<u8>>,
}

impl Publisher for MemoryPublisher {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), PublishError> {
        self.tx.send(payload).await.map_err(|_| PublishError::Closed)
    }
}

/// Receiving end; yields `None` once every publisher is dropped.
#[derive(Debug)]
pub struct MemoryConsumer {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl Consumer for MemoryConsumer {
    async fn next_payload(&mut self) -> Result<Option<Vec<u8>>, ConsumeError> {
        Ok(self.rx.recv().await)
    }
}
