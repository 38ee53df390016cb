//! Error types for the goalcrest client.
//!
//! Internally we use `anyhow` (`Res<T>`) and attach context as errors bubble up. At the public
//! boundary errors are converted into `Error`, which carries an `ErrorType` describing what kind
//! of failure occurred and, when the server sent one, the raw error payload so that it can be
//! shown to the user verbatim.

use reqwest::StatusCode;
use serde_json::Value;
use std::fmt::{Debug, Display, Formatter};

/// The internal result type.
pub(crate) type Res<T> = anyhow::Result<T>;

/// The public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of errors as surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The server rejected our credentials, or we had none.
    Auth,
    /// The server rejected the request body (HTTP 400).
    Validation,
    /// The requested record does not exist (HTTP 404).
    NotFound,
    /// Any other failure while talking to the server, including network errors.
    Request,
    /// The local configuration or home directory is missing or invalid.
    Config,
    /// Everything else.
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);

impl ErrorType {
    fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorType::Auth,
            StatusCode::BAD_REQUEST => ErrorType::Validation,
            StatusCode::NOT_FOUND => ErrorType::NotFound,
            _ => ErrorType::Request,
        }
    }
}

/// A non-success response from the server. The body is kept exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    status: StatusCode,
    payload: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, payload: Value) -> Self {
        Self { status, payload }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn is_auth(&self) -> bool {
        ErrorType::from_status(self.status) == ErrorType::Auth
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "server responded with {}: {}", self.status, self.payload)
    }
}

impl std::error::Error for ApiError {}

/// The public error type.
pub struct Error {
    error_type: ErrorType,
    payload: Option<Value>,
    inner: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, inner: anyhow::Error) -> Self {
        let payload = find_api_error(&inner).map(|e| e.payload().clone());
        Self {
            error_type,
            payload,
            inner,
        }
    }

    /// What kind of error this is.
    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// The raw error payload sent by the server, if the error originated from a server response.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.error_type, self.inner)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:#}", self.error_type, self.inner)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

/// Classifies an `anyhow::Error`. Errors that wrap an `ApiError` are classified by HTTP status.
impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        let error_type = find_api_error(&e)
            .map(|api| ErrorType::from_status(api.status()))
            .unwrap_or(ErrorType::Internal);
        Error::new(error_type, e)
    }
}

fn find_api_error(e: &anyhow::Error) -> Option<&ApiError> {
    e.chain().find_map(|cause| cause.downcast_ref::<ApiError>())
}

/// Converts internal results into public results.
pub(crate) trait IntoResult<T> {
    /// Converts to the public `Result`. Errors that carry an `ApiError` keep the classification
    /// derived from the HTTP status; everything else is given `error_type`.
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T> IntoResult<T> for Res<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| match find_api_error(&e) {
            Some(api) => {
                let classified = ErrorType::from_status(api.status());
                Error::new(classified, e)
            }
            None => Error::new(error_type, e),
        })
    }
}
