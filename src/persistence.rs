mod error;
mod memory;
mod models;
mod mysql;
mod persister;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use models::ReachabilityRecord;
pub use mysql::MySqlReachabilityStore;
pub use persister::ReachabilityStore;
