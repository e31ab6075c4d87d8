//! Remote-error taxonomy shared by all client operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One field-level failure inside a structured API error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub property: String,
    pub message: String,
}

/// Structured error body the control plane returns on 4xx responses.
///
/// When the body cannot be decoded the transport layer is expected to fill
/// in `error_message` from the status code and leave `errors` empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{error_message}")]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

/// Outcome of a single remote call, as seen by the convergence engine.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The control plane rejected the request with a structured error body.
    #[error("api error: {0}")]
    Api(#[from] ApiErrorResponse),

    /// The addressed resource does not exist remotely.
    #[error("resource not found")]
    NotFound,

    /// The request never produced a decodable response.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl RemoteError {
    /// True when retrying the exact same request cannot succeed.
    pub fn is_rejection(&self) -> bool {
        matches!(self, RemoteError::Api(_))
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
