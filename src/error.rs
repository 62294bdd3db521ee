// Error types for talking to the remote API and for answering the browser

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;
use url::form_urlencoded;

/// Failures reaching or using the remote rental API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Non-success status. `message` is the server's `error` field when it sent one.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request never completed (offline, refused, timed out).
    #[error("Network error: {0}")]
    Transport(String),

    /// A success status whose body could not be decoded.
    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Not logged in")]
    NotAuthenticated,
}

impl ApiError {
    /// Message to show the user, falling back to `network_message` for failures
    /// that never produced a server answer.
    pub fn user_message(&self, network_message: &str) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            ApiError::Transport(_) | ApiError::Decode(_) => network_message.to_string(),
            ApiError::NotAuthenticated => "You need to log in first.".to_string(),
        }
    }

    /// Status to answer the browser with. Remote rejections keep theirs.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Rejected { status, .. } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            ApiError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Transport(_) | ApiError::Decode(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Errors returned from axum handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Browser pages that need a session redirect to the login form,
    /// carrying the page to come back to.
    #[error("Login required for {0}")]
    LoginRequired(String),

    #[error(transparent)]
    Upstream(#[from] ApiError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                // Log the detailed error here
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::LoginRequired(path) => {
                return Redirect::to(&login_target(&path)).into_response();
            }
            AppError::Upstream(e) => {
                tracing::warn!("Remote API error: {}", e);
                (e.status(), e.to_string())
            }
        };

        (status, error_message).into_response()
    }
}

/// Login form URL that returns to `path` afterwards. The path is form-encoded
/// so `+`, `&` and `#` survive the trip through the query string.
pub fn login_target(path: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect", path)
        .finish();
    format!("/login?{}", query)
}

// Define a custom Result type using our AppError
pub type AppResult<T> = Result<T, AppError>;
