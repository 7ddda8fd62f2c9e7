use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::blob::BlobError;

/// Every failure a handler or a ledger operation can surface. Client-facing
/// variants carry the message rendered in the `error` field of the body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Already a member, already left, nothing left to add.
    #[error("{0}")]
    Conflict(String),

    /// An active direct conversation between the two users already exists.
    #[error("The conversation with the user already exists")]
    DirectExists { conversation_id: String },

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::DirectExists { .. } => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Store(_) | Self::Blob(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Never echo store or IO detail back to the client
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            return (
                status,
                Json(serde_json::json!({"error": "Internal server error"})),
            )
                .into_response();
        }

        let body = match &self {
            Self::DirectExists { conversation_id } => serde_json::json!({
                "error": self.to_string(),
                "conversationId": conversation_id,
            }),
            _ => serde_json::json!({"error": self.to_string()}),
        };

        (status, Json(body)).into_response()
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}
