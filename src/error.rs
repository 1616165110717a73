use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Failure of a remote call or of a whole paginated fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("throttled by the API{}", retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    Throttled { retry_after: Option<Duration> },

    #[error("API key rejected (status {status})")]
    Unauthorized { status: u16 },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("GraphQL errors: {}", messages.join(", "))]
    GraphQl { messages: Vec<String> },

    #[error("Empty response from API")]
    EmptyResponse,

    #[error("unexpected response shape: {0}")]
    Decode(String),

    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether the backoff loop may try the request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Throttled { .. } | FetchError::Transient(_) => true,
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Server-provided pause, if this is a throttling response that carried one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Why a single raw record could not be turned into a domain value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingErrorKind {
    #[error("payload is not an object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not an ISO-8601 date: {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error("completed on {completed} before it was started on {started}")]
    CompletedBeforeStarted {
        started: chrono::NaiveDate,
        completed: chrono::NaiveDate,
    },

    #[error("{0}")]
    Decode(String),
}

/// A per-record mapping failure. Recovered by skipping the record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} (record {})", record_id.as_deref().unwrap_or("<unknown>"))]
pub struct MappingError {
    pub record_type: &'static str,
    pub record_id: Option<String>,
    pub kind: MappingErrorKind,
}

#[derive(Error, Debug)]
pub enum LinearError {
    #[error("refresh failed: {0}")]
    Refresh(#[source] Arc<FetchError>),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error(
        "No API key found. Set LINEAR_API_KEY env var or add api_key to the linear-timeline config.toml"
    )]
    MissingApiKey,

    #[error("Project not found: {0}")]
    ProjectNotFound(String),
}

pub type Result<T> = std::result::Result<T, LinearError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(FetchError::Throttled { retry_after: None }.is_retryable());
        assert!(FetchError::Transient("502".into()).is_retryable());
        assert!(!FetchError::Unauthorized { status: 401 }.is_retryable());
        assert!(!FetchError::GraphQl { messages: vec!["bad".into()] }.is_retryable());
        assert!(!FetchError::EmptyResponse.is_retryable());
    }

    #[test]
    fn throttled_message_includes_retry_after() {
        let err = FetchError::Throttled {
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(err.to_string(), "throttled by the API (retry after 60s)");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn mapping_error_names_the_record() {
        let err = MappingError {
            record_type: "project",
            record_id: None,
            kind: MappingErrorKind::MissingField("id"),
        };
        assert_eq!(err.to_string(), "missing required field `id` (record <unknown>)");
    }
}
