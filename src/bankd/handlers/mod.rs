//! Route handlers and the error envelope shared by them.
//!
//! Handlers return `Result<_, ApiError>`; this is the only place a typed
//! [`Error`] turns into a status code, and only a short message reaches the
//! client.

pub mod accounts;
pub mod health;
pub mod login;
pub mod transfer;

pub use self::health::health;

use crate::error::Error;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    /// Login failed; never says whether the account exists.
    NotAuthenticated,
    Core(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Core(Error::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not authenticated".to_string()),
            Self::Core(Error::Validation(message)) => (StatusCode::BAD_REQUEST, message),
            Self::Core(Error::InvalidToken(_)) => {
                (StatusCode::FORBIDDEN, "permission denied".to_string())
            }
            Self::Core(Error::NotFound(_)) => (StatusCode::NOT_FOUND, "not found".to_string()),
            Self::Core(err) => {
                error!("Request failed: {err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody::new(message))).into_response()
    }
}

/// Run a CPU-heavy closure (password hashing) off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Core(Error::Hashing(e.to_string())))
}
