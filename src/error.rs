use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Steam or the item feed failed, timed out or sent something unreadable.
    #[error("Steam API error: {0}")]
    SteamApi(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::SteamApi(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show the caller. Server-side failures stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(msg) | Self::Forbidden(msg) | Self::NotFound(msg) => msg.clone(),
            Self::SteamApi(_) => "Steam is unavailable, please try again later".to_string(),
            Self::Database(_) => "Database error".to_string(),
            Self::Config(_) => "Configuration error".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::SteamApi(msg) => tracing::warn!(error = %msg, "Upstream request failed"),
            e if status.is_server_error() => tracing::error!(error = ?e, "Request failed"),
            _ => {}
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
