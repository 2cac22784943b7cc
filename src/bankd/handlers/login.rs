use super::{blocking, ApiError, ErrorBody};
use crate::{bankd::AppState, error::Error};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginRequest {
    pub number: i64,
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub number: i64,
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Malformed request", body = ErrorBody),
        (status = 401, description = "Unknown account number or wrong password", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(state, payload))]
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload?;

    let password = request.password;

    let account = match state.store().get_account_by_number(request.number).await {
        Ok(account) => account,
        Err(Error::NotFound(_)) => {
            // Same hashing cost as a wrong password.
            let policy = state.account_policy().clone();
            blocking(move || policy.verify_unknown_account(password.expose_secret())).await?;

            debug!(number = request.number, "login for unknown account number");
            return Err(ApiError::NotAuthenticated);
        }
        Err(err) => return Err(err.into()),
    };

    let (account, valid) = blocking(move || {
        let valid = account.valid_password(password.expose_secret());
        (account, valid)
    })
    .await?;

    if !valid {
        debug!(number = account.number, "login with wrong password");
        return Err(ApiError::NotAuthenticated);
    }

    let token = state.tokens().issue_token(&account)?;

    info!(number = account.number, "login succeeded");

    Ok(Json(LoginResponse {
        token,
        number: account.number,
    }))
}
