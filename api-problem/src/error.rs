//! Error types for the problem pipeline
//!
//! These are the failures of the pipeline itself (configuration, encoding,
//! header construction). Failures raised by application handlers are carried
//! as [`Failure`](crate::failure::Failure) or [`Problem`](crate::problem::Problem)
//! and never surface through this type.

use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the pipeline
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Normalizing a value into its serializable form failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No encoder is registered for the requested media type
    #[error("No encoder registered for media type: {0}")]
    UnsupportedMediaType(String),

    /// A header name or value could not be represented on the wire
    #[error("Invalid header {name}: {value:?}")]
    InvalidHeader {
        /// Header name as supplied
        name: String,
        /// Header value as supplied
        value: String,
    },

    /// HTTP response construction error
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),
}

impl Error {
    pub(crate) fn invalid_header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Error::InvalidHeader {
            name: name.into(),
            value: value.into(),
        }
    }
}

// Manual From implementation for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
