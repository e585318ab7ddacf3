//! Backend side of the message channel: decode, validate, upsert.
use crate::broker::Consumer;
use crate::error::ResultOkLogExt;
use crate::persistence::{ReachabilityRecord, ReachabilityStore};
use crate::reachability::ReachabilityBatch;

/// Outcome of applying one payload to the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub stored: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Validates `payload` and upserts its valid reports in batch order.
///
/// Invalid reports are logged and skipped. A storage error aborts only the
/// affected record.
pub async fn apply_payload<S: ReachabilityStore>(store: &S, payload: &[u8]) -> BatchOutcome {
    let batch = match ReachabilityBatch::from_slice(payload).and_then(|batch| batch.validate()) {
        Ok(batch) => batch,
        Err(err) => {
            log::error!("rejecting batch: {}", err);
            return BatchOutcome::default();
        }
    };

    let mut outcome = BatchOutcome {
        skipped: batch.rejected.len(),
        ..BatchOutcome::default()
    };
    for rejected in &batch.rejected {
        log::warn!("skipping report #{}: {}", rejected.index, rejected.error);
    }
    for result in batch.results {
        let record = ReachabilityRecord::from(result);
        match store.upsert(&record).await.ok_log() {
            Some(ip) => {
                log::debug!("Stored reachability of `{}`", ip);
                outcome.stored += 1;
            }
            None => outcome.failed += 1,
        }
    }

    outcome
}

/// Applies every payload `consumer` yields until the channel closes.
///
/// Payloads are processed strictly one after another.
pub async fn run_consumer<C: Consumer, S: ReachabilityStore>(mut consumer: C, store: &S) {
    loop {
        match consumer.next_payload().await {
            Ok(Some(payload)) => {
                let outcome = apply_payload(store, &payload).await;
                log::info!(
                    "Applied batch: stored={}, skipped={}, failed={}",
                    outcome.stored,
                    outcome.skipped,
                    outcome.failed
                );
            }
            Ok(None) => {
                log::info!("Message channel closed, stopping consumer");
                return;
            }
            Err(err) => log::error!("failed to receive batch: {}", err),
        }
    }
}
