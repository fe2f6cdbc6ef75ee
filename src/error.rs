use crate::model::ProviderKind;
use thiserror::Error;

/// Failure of a single upstream call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} provider unreachable: {message}")]
    Network {
        provider: ProviderKind,
        message: String,
    },
    #[error("{provider} provider returned HTTP {status}")]
    UpstreamStatus { provider: ProviderKind, status: u16 },
    #[error("{provider} provider sent an invalid response: {message}")]
    InvalidResponse {
        provider: ProviderKind,
        message: String,
    },
}

/// Failure after the fallback hop has been spent.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("both providers failed (primary: {primary}; fallback: {fallback})")]
    BothFailed {
        primary: ProviderError,
        fallback: ProviderError,
    },
    #[error("forced fallback failed: {0}")]
    Fallback(ProviderError),
}

impl RouterError {
    /// Underlying provider failure messages, primary first.
    pub fn messages(&self) -> Vec<String> {
        match self {
            RouterError::BothFailed { primary, fallback } => {
                vec![primary.to_string(), fallback.to_string()]
            }
            RouterError::Fallback(err) => vec![err.to_string()],
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generated module does not start with `export` ({provider} provider)")]
    MalformedOutput { provider: ProviderKind },
    #[error(transparent)]
    Provider(#[from] RouterError),
}

/// Persistence failure. Never leaves the cache layer.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cache store is closed")]
    Closed,
    #[error("cache task failed: {0}")]
    Task(String),
}
