use thiserror::Error;

/// Failure modes of a single adapter call for a single object.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("object not found at source")]
    NotFound,

    /// The page or response did not have the expected shape. Raised instead
    /// of silently mis-parsing when the external layout changed.
    #[error("unexpected response structure: {0}")]
    StructureMismatch(String),

    #[error("http status {0}")]
    HttpStatus(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("browser session error: {0}")]
    Session(String),
}

impl FetchError {
    /// Transient failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::HttpStatus(429 | 500 | 502 | 503))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Failure modes of normalizing one raw record into the canonical schema.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("field {field}: cannot parse {value:?} as a number")]
    BadNumber { field: &'static str, value: String },

    #[error("malformed packed coordinate pair {0:?}")]
    BadCoordPair(String),
}

/// Fatal configuration problems, surfaced before any per-object work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown field name {0:?}")]
    UnknownField(String),

    #[error("unknown source kind {0:?}")]
    UnknownSource(String),

    #[error("priority list is empty")]
    EmptyPriority,

    #[error("bad route spec {0:?} (expected field=source)")]
    BadRoute(String),
}

/// Per-object failure at the batch-collector boundary.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
