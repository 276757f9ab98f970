use std::fmt;

#[derive(Debug)]
pub enum Error {
    InvalidArgument(String),
    NotFound(String),
    Io(std::io::Error),
    Blob(obscore_blob::Error),
    Store(obscore_store::Error),
    Types(obscore_types::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::NotFound(msg) => write!(f, "not found: {msg}"),
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::Blob(e) => write!(f, "blob store error: {e}"),
            Error::Store(e) => write!(f, "event store error: {e}"),
            Error::Types(e) => write!(f, "event decoding error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Blob(e) => Some(e),
            Error::Store(e) => Some(e),
            Error::Types(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<obscore_blob::Error> for Error {
    fn from(e: obscore_blob::Error) -> Self {
        Error::Blob(e)
    }
}

impl From<obscore_store::Error> for Error {
    fn from(e: obscore_store::Error) -> Self {
        Error::Store(e)
    }
}

impl From<obscore_types::Error> for Error {
    fn from(e: obscore_types::Error) -> Self {
        Error::Types(e)
    }
}
