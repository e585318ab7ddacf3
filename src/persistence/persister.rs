use super::{ReachabilityRecord, Result};

pub trait ReachabilityStore: Send + Sync {
    /// Stores `record` unless a record for the same IP with an equal or newer
    /// `last_ping` already exists. Returns the IP either way.
    fn upsert(
        &self,
        record: &ReachabilityRecord,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Returns every stored record ordered by IP.
    fn get_all(&self) -> impl std::future::Future<Output = Result<Vec<ReachabilityRecord>>> + Send;
}
