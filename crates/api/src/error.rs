use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ratings_core::profile::ProfileError;
use serde_json::json;

/// Error returned by handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Logs and reports `err`; the client only sees `message`.
    pub fn internal(err: anyhow::Error, message: &str) -> Self {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "{message}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        let status = match &err {
            ProfileError::MissingTicker | ProfileError::NotConfigured => StatusCode::BAD_REQUEST,
            ProfileError::Upstream { status } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProfileError::Transport(_) | ProfileError::Decode(_) | ProfileError::Url(_) => {
                tracing::error!(error = %err, "profile lookup failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
