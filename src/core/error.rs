use thiserror::Error as ThisError;

/// The crate-wide error type. Every fallible operation in the index store,
/// the synchroniser, and the query interpreter returns one of these variants
/// rather than panicking or swallowing the failure.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("invalid query: {0}")]
    InvalidQueryError(String),

    #[error("index i/o error: {0}")]
    IndexIoError(String),

    #[error("triple store error: {0}")]
    StoreError(String),

    #[error("corrupt on-disk state: {0}")]
    CorruptStateError(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IndexIoError(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::CorruptStateError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
