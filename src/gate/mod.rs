//! Admission control for the HTTP ingress: API key check, then rate limit.
mod auth;
mod error;
mod rate_limit;

pub use auth::ApiKeys;
pub use error::{GateError, Result};
pub use rate_limit::RateLimiter;

#[derive(Debug)]
pub struct Gate {
    keys: ApiKeys,
    limiter: RateLimiter,
}

impl Gate {
    pub fn new(keys: ApiKeys, limiter: RateLimiter) -> Self {
        Self { keys, limiter }
    }

    /// Decides whether a request of `client` presenting `api_key` may proceed.
    ///
    /// Unauthenticated requests are rejected before they count against the
    /// client's rate limit.
    ///
    /// # Errors
    ///
    /// - [`GateError::Unauthorized`] if the key is missing or unknown.
    /// - [`GateError::TooManyRequests`] if `client` exceeded its window.
    pub fn admit(&self, client: &str, api_key: Option<&str>) -> Result<()> {
        if !self.keys.verify(api_key) {
            log::debug!("Rejected request of `{}`: bad api key", client);
            return Err(GateError::Unauthorized);
        }
        if !self.limiter.check(client) {
            log::debug!("Rejected request of `{}`: rate limited", client);
            return Err(GateError::TooManyRequests);
        }
        Ok(())
    }
}
