use crate::broker::{PublishError, Publisher};
use crate::reachability::{ProbeResult, ReachabilityBatch, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("refusing to emit batch: {0}")]
    Invalid(#[from] ValidationError),
    #[error("failed to serialize batch: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Turns the results of a cycle into one batch and hands it to a [`Publisher`].
pub struct Emitter<P> {
    publisher: P,
}

impl<P: Publisher> Emitter<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }

    /// Publishes the valid `results` as a single batch and returns how many
    /// reports it carried.
    ///
    /// Reports that would be rejected downstream are dropped here and logged.
    ///
    /// # Errors
    ///
    /// - [`EmitError::Invalid`] if no result is valid, including an empty cycle.
    ///   Nothing is published.
    /// - [`EmitError::Publish`] if the transport fails.
    pub async fn emit<'a>(
        &self,
        results: impl IntoIterator<Item = &'a ProbeResult>,
    ) -> Result<usize, EmitError> {
        let batch = ReachabilityBatch::from_results(results);
        let validated = batch.validate()?;
        for rejected in &validated.rejected {
            log::warn!(
                "Dropping report #{} from batch: {}",
                rejected.index,
                rejected.error
            );
        }

        let batch = ReachabilityBatch::from_results(&validated.results);
        let payload = batch.to_vec().map_err(EmitError::Serialize)?;
        self.publisher.publish(payload).await?;
        log::debug!("Emitted batch of {} reports", batch.len());

        Ok(batch.len())
    }
}
