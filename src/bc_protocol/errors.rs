use crate::bc::model::Bc;
use err_derive::Error;

/// This is the primary error type of the library
#[derive(Debug, Error, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum Error {
    /// Underlying IO errors
    #[error(display = "IO Error: {:?}", _0)]
    Io(#[error(source)] std::sync::Arc<std::io::Error>),

    /// Raised when a message cannot be decoded from the wire. The session
    /// is unrecoverable
    #[error(display = "Deserialization error")]
    Deserialization(#[error(source)] crate::bc::de::Error),

    /// Raised during serialisation of an outgoing message
    #[error(display = "Cookie GenError")]
    GenError(#[error(source)] std::sync::Arc<cookie_factory::GenError>),

    /// Raised when a Bc reply was not understood
    #[error(display = "Communication error")]
    UnintelligibleReply {
        /// The Bc packet that was not understood
        reply: std::sync::Arc<Box<Bc>>,
        /// The message attached to the error
        why: &'static str,
    },

    /// Raised when the camera rejects the login
    #[error(display = "Credential error")]
    AuthFailed,

    /// Raised when the given camera address could not be resolved
    #[error(display = "Failed to translate camera address")]
    AddrResolutionError,

    /// Raised when no resolved address accepts a connection
    #[error(display = "Camera not reachable")]
    ConnectionUnavailable,

    /// Raised when the source url cannot be parsed at all
    #[error(display = "Could not parse source url")]
    UrlParseError(#[error(source)] url::ParseError),

    /// Raised when the source url is missing a required component
    #[error(display = "Source url is missing its {}", _0)]
    MissingUrlPart(&'static str),
}

impl From<std::io::Error> for Error {
    fn from(k: std::io::Error) -> Self {
        Error::Io(std::sync::Arc::new(k))
    }
}

impl From<cookie_factory::GenError> for Error {
    fn from(k: cookie_factory::GenError) -> Self {
        Error::GenError(std::sync::Arc::new(k))
    }
}
