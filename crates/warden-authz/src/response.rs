//! Response envelope returned across the boundary.

use crate::error::{AuthzError, ErrorCode};
use serde::{Deserialize, Serialize};

/// `{success: true, data}` or `{success: false, error}`.
///
/// The error code is kept for in-process callers and tests but is not part
/// of the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    code: Option<ErrorCode>,
}

impl<T> GuardResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    /// A deny response carrying only the caller-facing message.
    pub fn deny(error: &AuthzError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            code: Some(error.code()),
        }
    }

    /// Code of a deny response. `None` for successes and for responses
    /// decoded from the wire.
    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Convert into a `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(self.error.unwrap_or_default()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> GuardResponse<U> {
        GuardResponse {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            code: self.code,
        }
    }
}
