use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Error taxonomy per §7: external unavailability and malformed-input are
/// always recoverable at the call site (logged, degraded result returned);
/// `Internal`/`Fatal` propagate and abort the run.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("event bus unavailable: {0}")]
    EventBusUnavailable(String),

    /// A fetch that had already started delivering events failed partway
    /// through. Unlike `EventBusUnavailable` (raised before any event is
    /// seen, which callers degrade on), this must abort the current run.
    #[error("event stream interrupted after {events_seen} events: {source}")]
    EventStreamInterrupted { events_seen: u64, source: String },

    #[error("classifier request failed: {0}")]
    ClassifierUnavailable(String),

    #[error("validator request failed: {0}")]
    ValidatorUnavailable(String),

    #[error("policy evaluation fault: {0}")]
    PolicyFault(String),

    #[error("vault entry unresolvable: {0}")]
    VaultUnresolvable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("fatal: persistence failed after retries: {0}")]
    Fatal(String),
}

impl AppError {
    /// Whether this error should cause the current run to abort (§7 Fatal)
    /// rather than degrade and continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Fatal(_) | AppError::EventStreamInterrupted { .. })
    }
}
