use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

use crate::emotion::Emotion;

pub type RecResult<T> = std::result::Result<T, RecError>;

/// Client-facing failures. Provider details never leave the process: they are
/// logged where they happen and collapse into one of these.
#[derive(Debug, Error)]
pub enum RecError {
    #[error("Invalid emotion '{value}'. Valid options: {}", Emotion::valid_options())]
    InvalidEmotion { value: String },

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Spotify API request failed")]
    ProviderRequest,

    #[error("Failed to create playlist")]
    PlaylistCreation,

    #[error("Timed out waiting for emotion result")]
    CallbackTimeout,

    #[error("A wait for session '{0}' is already in progress")]
    WaitInProgress(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl RecError {
    pub fn status(&self) -> StatusCode {
        match self {
            RecError::InvalidEmotion { .. } | RecError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RecError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            RecError::ProviderRequest | RecError::PlaylistCreation => StatusCode::BAD_GATEWAY,
            RecError::CallbackTimeout => StatusCode::GATEWAY_TIMEOUT,
            RecError::WaitInProgress(_) => StatusCode::CONFLICT,
            RecError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RecError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

impl IntoResponse for RecError {
    fn into_response(self) -> Response {
        if let RecError::Internal(e) = &self {
            error!("Internal error: {e:#}");
        }
        (self.status(), Json(self.body())).into_response()
    }
}
