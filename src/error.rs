//! Errors surfaced by registration and lookup.

use hyper::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Wire code for malformed or incomplete registrations.
pub const INVALID_REQUEST_CODE: &str = "invalid_request";
/// Wire code for live requests that matched no mock.
pub const MOCK_NOT_FOUND_CODE: &str = "mock_not_found";
/// Wire code for transport failures outside the matching engine.
pub const INTERNAL_ERROR_CODE: &str = "internal_error";

/// Error returned by the mock service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockError {
    /// The registration was malformed or incomplete.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No registered mock accepted the live request.
    #[error("mapping not found for request {method} {path}")]
    MockNotFound {
        /// Method of the unmatched request
        method: String,
        /// Path of the unmatched request
        path: String,
    },
}

impl MockError {
    pub(crate) fn invalid(cause: impl Into<String>) -> Self {
        MockError::InvalidRequest(cause.into())
    }

    /// Wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            MockError::InvalidRequest(_) => INVALID_REQUEST_CODE,
            MockError::MockNotFound { .. } => MOCK_NOT_FOUND_CODE,
        }
    }

    /// HTTP status the server answers with.
    pub fn status(&self) -> StatusCode {
        status_for_code(self.code())
    }

    /// Human readable description, without the code prefix.
    pub fn description(&self) -> String {
        match self {
            MockError::InvalidRequest(cause) => cause.clone(),
            MockError::MockNotFound { .. } => format!("{}.", self),
        }
    }

    /// Serializable `{code, description}` body.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            description: self.description(),
        }
    }
}

/// JSON error payload written by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub description: String,
}

impl ErrorBody {
    /// Error body for failures outside the matching engine.
    pub fn internal(description: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR_CODE.to_string(),
            description: description.into(),
        }
    }

    /// HTTP status for this body's code.
    pub fn status(&self) -> StatusCode {
        status_for_code(&self.code)
    }
}

/// Map a wire code to its HTTP status. Unknown codes are server errors.
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        INVALID_REQUEST_CODE => StatusCode::BAD_REQUEST,
        MOCK_NOT_FOUND_CODE => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
