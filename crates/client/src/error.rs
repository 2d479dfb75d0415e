use core::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter};
use torii_proto::error::ProtoError;
use torii_proto::SubscriptionKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parsing error: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(u64),
    #[error("Subscription kind mismatch: expected {expected:?}, got {found:?}")]
    SubscriptionKindMismatch {
        expected: SubscriptionKind,
        found: SubscriptionKind,
    },
    #[error("Panic: {0}")]
    Panic(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    FeltFromStr(#[from] starknet::core::types::FromStrError),
}

/// Failures reported by a [`WorldTransport`](crate::transport::WorldTransport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Controller error: {0}")]
    Controller(String),
    #[error("Subscription error: {0}")]
    Subscription(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Stream closed")]
    Closed,
}

#[repr(C)]
#[derive(Debug, AsRefStr, EnumIter, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ErrorType {
    ClientError,
    ParseError,
    EntityError,
    QueryError,
    SubscriptionError,
    TransactionError,
    AccountError,
    SigningError,
    ProviderError,
    StorageError,
    ControllerError,
    InvalidInput,
    RuntimeError,
}

/// The error handed to callers outside of the crate: a category and a message.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct DojoError {
    error_type: ErrorType,
    message: String,
}

impl DojoError {
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
        }
    }

    /// Builds an error from a foreign, possibly malformed, message buffer.
    pub fn from_utf8(error_type: ErrorType, message: &[u8]) -> Result<Self, DojoError> {
        match std::str::from_utf8(message) {
            Ok(message) => Ok(Self::new(error_type, message)),
            Err(e) => Err(Self::new(
                ErrorType::InvalidInput,
                format!("Error message is not valid UTF-8: {e}"),
            )),
        }
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DojoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type.as_ref(), self.message)
    }
}

impl std::error::Error for DojoError {}

impl From<&TransportError> for ErrorType {
    fn from(value: &TransportError) -> Self {
        match value {
            TransportError::Connection(_) | TransportError::Closed => ErrorType::ClientError,
            TransportError::InvalidQuery(_) => ErrorType::QueryError,
            TransportError::Storage(_) => ErrorType::StorageError,
            TransportError::Controller(_) => ErrorType::ControllerError,
            TransportError::Subscription(_) => ErrorType::SubscriptionError,
            TransportError::Decode(_) => ErrorType::ParseError,
        }
    }
}

impl From<&Error> for ErrorType {
    fn from(value: &Error) -> Self {
        match value {
            Error::Parse(_) => ErrorType::ParseError,
            Error::Transport(e) => e.into(),
            Error::Proto(_) | Error::SubscriptionKindMismatch { .. } => ErrorType::InvalidInput,
            Error::SubscriptionNotFound(_) => ErrorType::SubscriptionError,
            Error::Panic(_) => ErrorType::RuntimeError,
        }
    }
}

impl From<Error> for DojoError {
    fn from(value: Error) -> Self {
        DojoError::new(ErrorType::from(&value), value.to_string())
    }
}

impl From<TransportError> for DojoError {
    fn from(value: TransportError) -> Self {
        DojoError::new(ErrorType::from(&value), value.to_string())
    }
}

impl From<ProtoError> for DojoError {
    fn from(value: ProtoError) -> Self {
        Error::from(value).into()
    }
}
