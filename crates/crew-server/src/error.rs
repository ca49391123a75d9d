//! Server errors and their HTTP mapping.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use crew_core::{AccessError, TreeError};
use crew_render::{RenderError, StoreError};
use thiserror::Error;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A request body that could not be decoded.
    #[error("Invalid request body: {0}")]
    BadRequest(String),

    /// A script answered with a status HTTP cannot carry.
    #[error("Script returned invalid HTTP status {0}")]
    InvalidStatus(u16),

    /// A blocking task panicked or was cancelled.
    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Tree(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Access(AccessError::Tree(e)) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Access(e) if e.is_unauthorized() => StatusCode::UNAUTHORIZED,
            Self::Render(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Render(RenderError::MethodNotAllowed { .. }) => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        let body = match status {
            StatusCode::NOT_FOUND => "404 page not found".to_string(),
            _ => self.to_string(),
        };
        let mut response = (status, body).into_response();

        if let Self::Access(e) = &self {
            if let Some(challenge) = e.challenge() {
                if let Ok(value) = HeaderValue::from_str(&challenge) {
                    response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
                }
            }
        }
        response
    }
}
