//! Error types for the relay core.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Relay error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Signaling payload was rejected before any peer state was created
    #[error("invalid offer: {0}")]
    InvalidOffer(String),

    /// Offer/answer exchange or ICE establishment failed
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// A peer id was registered twice
    #[error("peer '{0}' is already registered")]
    DuplicatePeer(String),

    /// Peer transport operation failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid relay configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Relay result alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidOffer(_) => StatusCode::BAD_REQUEST,
            Error::Negotiation(_) => StatusCode::BAD_GATEWAY,
            Error::DuplicatePeer(_) | Error::Transport(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
