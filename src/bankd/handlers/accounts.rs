use super::{blocking, ApiError, ErrorBody};
use crate::{account::Account, bankd::AppState};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    Json,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub first_name: String,
    pub last_name: String,
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct DeletedResponse {
    pub deleted: i64,
}

#[utoipa::path(
    get,
    path = "/accounts",
    responses(
        (status = 200, description = "All accounts", body = [Account]),
        (status = 500, description = "Storage failure", body = ErrorBody),
    ),
    tag = "accounts"
)]
#[instrument(skip(state))]
pub async fn list_accounts(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Account>>, ApiError> {
    Ok(Json(state.store().get_accounts().await?))
}

#[utoipa::path(
    post,
    path = "/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = Account),
        (status = 400, description = "Invalid names or weak password", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody),
    ),
    tag = "accounts"
)]
#[instrument(skip(state, payload))]
pub async fn create_account(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let Json(request) = payload?;

    let policy = state.account_policy().clone();
    let account = blocking(move || {
        Account::new(
            &request.first_name,
            &request.last_name,
            &request.password,
            &policy,
        )
    })
    .await??;

    let account = state.store().create_account(&account).await?;

    info!(id = account.id, number = account.number, "account created");

    Ok((StatusCode::CREATED, Json(account)))
}

#[utoipa::path(
    get,
    path = "/accounts/{id}",
    params(("id" = i64, Path, description = "Internal account id")),
    responses(
        (status = 200, description = "The caller's account", body = Account),
        (status = 403, description = "Missing, invalid or foreign token", body = ErrorBody),
    ),
    security(("token" = [])),
    tag = "accounts"
)]
#[instrument(skip(account), fields(id = account.id))]
pub async fn get_account(Extension(account): Extension<Account>) -> Json<Account> {
    Json(account)
}

#[utoipa::path(
    delete,
    path = "/accounts/{id}",
    params(("id" = i64, Path, description = "Internal account id")),
    responses(
        (status = 200, description = "Account deleted", body = DeletedResponse),
        (status = 403, description = "Missing, invalid or foreign token", body = ErrorBody),
    ),
    security(("token" = [])),
    tag = "accounts"
)]
#[instrument(skip(state, account), fields(id = account.id))]
pub async fn delete_account(
    Extension(state): Extension<Arc<AppState>>,
    Extension(account): Extension<Account>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = account.id;
    state.store().delete_account(id).await?;

    info!(id, "account deleted");

    Ok(Json(DeletedResponse { deleted: id }))
}
