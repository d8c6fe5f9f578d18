use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatsError>;

#[derive(Debug, Error)]
pub enum StatsError {
    /// Non-2xx response (or a GraphQL error payload) from an upstream API.
    #[error("{status} while fetching {context}")]
    Upstream { context: String, status: String },

    #[error("network error while fetching {context}: {source}")]
    Network {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP 429 carrying a usable `Retry-After`. Only ever seen by the retry path;
    /// a second 429 is reported as `Upstream`.
    #[error("rate limited while fetching {context} (retry after {}s)", retry_after.as_secs())]
    RateLimited {
        context: String,
        retry_after: Duration,
    },

    #[error("download ledger at {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid payload from {context}: {reason}")]
    InvalidPayload { context: String, reason: String },

    #[error("series mismatch: {0}")]
    SeriesMismatch(String),
}

impl StatsError {
    pub(crate) fn upstream(context: impl Into<String>, status: impl ToString) -> Self {
        Self::Upstream {
            context: context.into(),
            status: status.to_string(),
        }
    }

    pub(crate) fn network(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn invalid_payload(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
