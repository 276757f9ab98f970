use std::fmt;

/// Result type for obscore-types operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while constructing or (de)serializing core types.
#[derive(Debug)]
pub enum Error {
    /// An invariant required by the data model was violated (e.g. empty event type).
    InvalidArgument(String),
    /// JSON (de)serialization failed.
    Serialization(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::Serialization(err) => write!(f, "serialization error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidArgument(_) => None,
            Error::Serialization(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err)
    }
}
