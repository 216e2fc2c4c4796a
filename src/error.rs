use std::sync::Arc;

use thiserror::Error;

use crate::domain::error::ValidationError;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("fetch for {key} failed after {attempts} attempt(s): {source}")]
    Fetch {
        key: String,
        attempts: u32,
        #[source]
        source: Arc<Error>,
    },

    /// An error also held elsewhere, e.g. by a cache entry or a coalesced
    /// fetch.
    #[error(transparent)]
    Shared(Arc<Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Whether a retry may succeed where this attempt failed.
    ///
    /// Connection resets, timeouts and server-side (5xx, 408, 429) responses
    /// are transient. Validation, not-found and other rejections are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err.is_request()
                    || err.status().is_some_and(|s| is_transient_status(s.as_u16()))
            }
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => is_transient_status(*status),
            Self::Fetch { source, .. } | Self::Shared(source) => source.is_transient(),
            _ => false,
        }
    }

    /// Whether the error refers to a resource that no longer exists.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Fetch { source, .. } | Self::Shared(source) => source.is_not_found(),
            _ => false,
        }
    }

    /// Take ownership of a shared error, wrapping it when other holders
    /// remain.
    #[must_use]
    pub fn from_shared(err: Arc<Error>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(Self::Shared)
    }

    pub(crate) fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }
}

pub(crate) fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_transient() {
        assert!(Error::Transport("reset".into()).is_transient());
        assert!(Error::Rejected {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        assert!(!Error::not_found("comparison 7").is_transient());
        assert!(!Error::Rejected {
            status: 400,
            message: "bad".into()
        }
        .is_transient());
        assert!(!Error::Validation(ValidationError::EmptyName).is_transient());
    }

    #[test]
    fn fetch_error_delegates_to_source() {
        let err = Error::Fetch {
            key: "set_detail:7".into(),
            attempts: 1,
            source: Arc::new(Error::not_found("comparison 7")),
        };
        assert!(err.is_not_found());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("set_detail:7"));
    }
}
