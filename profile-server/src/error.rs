//! Errors returned by the profile service and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(String),

    /// The external profile cannot identify a user.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
}

impl ProfileError {
    fn status(&self) -> StatusCode {
        match self {
            ProfileError::NotFound(_) => StatusCode::NOT_FOUND,
            ProfileError::InvalidProfile(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ProfileError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(error = %self, %status, "request rejected");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
