#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("missing or unknown api key")]
    Unauthorized,
    #[error("rate limit exceeded")]
    TooManyRequests,
}

pub type Result<T> = std::result::Result<T, GateError>;
