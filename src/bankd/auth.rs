//! Token gate for protected routes.
//!
//! Flow Overview:
//! 1) Read the token from the configured header.
//! 2) Validate it with the token service.
//! 3) Resolve the account named by the `:id` path segment.
//! 4) Require the account number to match the token's `accountNumber` claim.
//!
//! Any failed step yields the same `403`, so callers cannot tell which ids exist.

use super::{handlers::ErrorBody, AppState};
use crate::{account::Account, token::Claims};
use axum::{
    extract::{Extension, Path, Request},
    http::{HeaderMap, HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::debug;

/// Why a request was refused. Only logged, never sent to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denied {
    MissingToken,
    InvalidToken,
    UnknownSubject,
    NumberMismatch,
}

impl IntoResponse for Denied {
    fn into_response(self) -> Response {
        debug!(reason = ?self, "permission denied");
        (
            StatusCode::FORBIDDEN,
            Json(ErrorBody::new("permission denied")),
        )
            .into_response()
    }
}

/// Read the token from the configured header; a `Bearer ` prefix is accepted.
pub fn extract_token<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    let value = headers.get(name)?.to_str().ok()?.trim();

    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Steps 1 and 2: a present, valid token.
///
/// # Errors
/// Returns `Denied::MissingToken` or `Denied::InvalidToken`.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Claims, Denied> {
    let token = extract_token(headers, state.token_header()).ok_or(Denied::MissingToken)?;

    state
        .tokens()
        .validate_token(token)
        .map_err(|_| Denied::InvalidToken)
}

/// Steps 1 to 4: a valid token whose account number owns account `raw_id`.
///
/// # Errors
/// Returns the first `Denied` reason hit.
pub async fn authorize_owner(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: Option<&str>,
) -> Result<Account, Denied> {
    let claims = authenticate(state, headers)?;

    let id = raw_id
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .ok_or(Denied::UnknownSubject)?;

    let account = state
        .store()
        .get_account_by_id(id)
        .await
        .map_err(|err| {
            debug!("subject lookup failed: {err}");
            Denied::UnknownSubject
        })?;

    if account.number != claims.account_number {
        return Err(Denied::NumberMismatch);
    }

    Ok(account)
}

/// Middleware for `/accounts/:id` routes.
///
/// The resolved [`Account`] is handed to the handler as a request extension,
/// so the handler never parses `:id` again.
pub async fn require_account_owner(
    Extension(state): Extension<Arc<AppState>>,
    path: Option<Path<String>>,
    mut request: Request,
    next: Next,
) -> Response {
    let raw_id = path.as_ref().map(|Path(id)| id.as_str());
    // The request body is not `Sync`, so it must not be borrowed across the lookup.
    let headers = request.headers().clone();

    match authorize_owner(&state, &headers, raw_id).await {
        Ok(account) => {
            debug!(id = account.id, "account owner authorized");
            request.extensions_mut().insert(account);
            next.run(request).await
        }
        Err(denied) => denied.into_response(),
    }
}

/// Middleware for routes that only need an authenticated caller.
pub async fn require_token(
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()) {
        Ok(claims) => {
            debug!(number = claims.account_number, "token accepted");
            next.run(request).await
        }
        Err(denied) => denied.into_response(),
    }
}
