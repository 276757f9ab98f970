use std::fmt;

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Facade error aggregating every internal engine's error type behind one
/// enum, each variant convertible with `?` via `From`.
#[derive(Debug)]
pub enum Error {
    /// Resource not found (session, blob reference, etc.).
    NotFound(String),
    /// Invalid input parameters or configuration.
    InvalidInput(String),
    Store(obscore_store::Error),
    Blob(obscore_blob::Error),
    Timeline(obscore_timeline::Error),
    Types(obscore_types::Error),
    Io(std::io::Error),
    Config(toml::de::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "not found: {msg}"),
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::Store(e) => write!(f, "{e}"),
            Error::Blob(e) => write!(f, "{e}"),
            Error::Timeline(e) => write!(f, "{e}"),
            Error::Types(e) => write!(f, "{e}"),
            Error::Io(e) => write!(f, "{e}"),
            Error::Config(e) => write!(f, "invalid obscore.toml: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NotFound(_) | Error::InvalidInput(_) => None,
            Error::Store(e) => Some(e),
            Error::Blob(e) => Some(e),
            Error::Timeline(e) => Some(e),
            Error::Types(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Config(e) => Some(e),
        }
    }
}

impl From<obscore_store::Error> for Error {
    fn from(err: obscore_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<obscore_blob::Error> for Error {
    fn from(err: obscore_blob::Error) -> Self {
        Error::Blob(err)
    }
}

impl From<obscore_timeline::Error> for Error {
    fn from(err: obscore_timeline::Error) -> Self {
        Error::Timeline(err)
    }
}

impl From<obscore_types::Error> for Error {
    fn from(err: obscore_types::Error) -> Self {
        Error::Types(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err)
    }
}
