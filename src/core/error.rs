use thiserror::Error;

/// Failures of a call to the agent backend.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network unreachable, connection reset or timeout.
    #[error("Could not reach agent backend: {0}")]
    Connectivity(#[source] reqwest::Error),

    /// Non-2xx HTTP status. `body` is the raw response text.
    #[error("Agent error {status}: {body}")]
    Backend { status: u16, body: String },

    /// The response body was not valid JSON.
    #[error("Malformed response from agent backend: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Connectivity(e) if e.is_timeout())
    }

    /// HTTP status carried by a backend error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cache name: {0:?}")]
    InvalidName(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum ProfileError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("Unknown {field}: {value:?}")]
    UnknownChoice { field: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;
