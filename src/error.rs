use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Username already exists")]
    UsernameTaken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("User not found")]
    UserNotFound,

    #[error("Todo not found")]
    TodoNotFound,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] std::io::Error),

    #[error("Corrupt data: {0}")]
    CorruptData(#[from] serde_json::Error),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Invalid request body: {}", .0.body_text())]
    BadRequest(#[from] JsonRejection),

    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UsernameTaken => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound | AppError::TodoNotFound => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Multipart(e) => e.status(),
            AppError::StorageUnavailable(_)
            | AppError::CorruptData(_)
            | AppError::Session(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::StorageUnavailable(e) => {
                error!("record store unavailable: {}", e);
                "Storage unavailable".to_string()
            }
            AppError::CorruptData(e) => {
                error!("record store holds corrupt data: {}", e);
                "Stored data is corrupt".to_string()
            }
            AppError::Session(e) => {
                error!("session error: {}", e);
                "Session error".to_string()
            }
            AppError::Config(_) | AppError::Internal(_) => {
                error!("{}", self);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
        });

        (status, body).into_response()
    }
}
