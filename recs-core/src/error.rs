use crate::types::Audience;

/// Result type alias for recommendation engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the self-learning recommendation engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed request. Reported to the caller, never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Referenced entity absent. An unknown user on the recommendation
    /// path is handled as cold start, not surfaced as this error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A kid/family/teens response would have contained excluded content.
    /// The request fails closed with an empty list.
    #[error("Safety violation for audience {audience}: {content_ids:?}")]
    SafetyViolation {
        audience: Audience,
        content_ids: Vec<String>,
    },

    /// Embedding model failure. The recommendation path degrades to
    /// lexical/popularity fallbacks instead of surfacing this.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Transient store failure (timeout, deadlock). Retried with backoff.
    #[error("Transient store error: {0}")]
    StoreTransient(String),

    /// Permanent store failure (schema, constraint). Fails the request.
    #[error("Permanent store error: {0}")]
    StorePermanent(String),

    /// Surfaced from an optimization cycle step. The cycle aborts the
    /// step and re-schedules; committed earlier steps remain.
    #[error("Optimization error: {0}")]
    Optimization(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is recoverable (can retry with backoff)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::StoreTransient(_) => true,
            Error::Io(_) => true,
            Error::InvalidInput(_)
            | Error::NotFound(_)
            | Error::SafetyViolation { .. }
            | Error::Embedding(_)
            | Error::StorePermanent(_)
            | Error::Optimization(_)
            | Error::Serialization(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_recoverable() {
        assert!(Error::StoreTransient("deadlock".into()).is_recoverable());
        assert!(!Error::StorePermanent("bad schema".into()).is_recoverable());
        assert!(!Error::InvalidInput("negative limit".into()).is_recoverable());
    }

    #[test]
    fn safety_violation_is_never_retried() {
        let err = Error::SafetyViolation {
            audience: Audience::Kids,
            content_ids: vec!["tt123".into()],
        };
        assert!(!err.is_recoverable());
    }
}
