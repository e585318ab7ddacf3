use std::time::Duration;

use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

use super::{Error, ReachabilityRecord, ReachabilityStore, Result};

#[derive(Debug, Clone)]
pub struct MySqlReachabilityStore {
    db: MySqlPool,
}

impl MySqlReachabilityStore {
    pub fn new(db: MySqlPool) -> Self {
        Self { db }
    }

    /// Opens a connection pool to `database_url` and applies the embedded
    /// migrations.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionError`] if the database is unreachable.
    /// - [`Error::MigrationError`] if a migration fails.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = MySqlPoolOptions::new()
            .acquire_timeout(Duration::from_secs(10))
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(Error::ConnectionError)?;
        sqlx::migrate!().run(&db).await.map_err(Error::MigrationError)?;
        log::debug!("Connected to database and applied migrations");

        Ok(Self::new(db))
    }
}

impl ReachabilityStore for MySqlReachabilityStore {
    /// Inserts `record` or overwrites the stored row if `record` is newer.
    ///
    /// The comparison happens inside the single statement, so concurrent writers
    /// for the same IP cannot interleave between read and write. MySQL applies
    /// the assignments left to right, therefore `last_ping` is assigned last.
    async fn upsert(&self, record: &ReachabilityRecord) -> Result<String> {
        const UPSERT_QUERY: &str = r#"
INSERT INTO containers (
    ip_address, is_reachable, last_ping, packet_lost
) VALUES (
    ?, ?, ?, ?
)
ON DUPLICATE KEY UPDATE
    is_reachable = IF(VALUES(last_ping) > last_ping, VALUES(is_reachable), is_reachable),
    packet_lost = IF(VALUES(last_ping) > last_ping, VALUES(packet_lost), packet_lost),
    last_ping = IF(VALUES(last_ping) > last_ping, VALUES(last_ping), last_ping)
"#;
        sqlx::query(UPSERT_QUERY)
            .bind(&record.ip_address)
            .bind(record.is_reachable)
            .bind(record.last_ping)
            .bind(record.packet_lost)
            .execute(&self.db)
            .await
            .map_err(|source| Error::UpsertError {
                ip: record.ip_address.clone(),
                source,
            })?;

        Ok(record.ip_address.clone())
    }

    async fn get_all(&self) -> Result<Vec<ReachabilityRecord>> {
        sqlx::query_as::<_, ReachabilityRecord>(
            r#"
SELECT ip_address, is_reachable, last_ping, packet_lost
FROM containers
ORDER BY ip_address
"#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(Error::ReadError)
    }
}
