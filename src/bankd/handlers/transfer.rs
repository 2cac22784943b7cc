use super::{ApiError, ErrorBody};
use crate::error::Error;
use axum::{extract::rejection::JsonRejection, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Transfer request; `amount` is in minor currency units.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub to_account: i64,
    pub amount: i64,
}

impl TransferRequest {
    fn validate(&self) -> Result<(), Error> {
        if self.to_account <= 0 {
            return Err(Error::Validation("toAccount must be positive".to_string()));
        }
        if self.amount <= 0 {
            return Err(Error::Validation("amount must be positive".to_string()));
        }
        Ok(())
    }
}

#[utoipa::path(
    post,
    path = "/transfer",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer accepted (echoed, no funds move)", body = TransferRequest),
        (status = 400, description = "Invalid transfer", body = ErrorBody),
        (status = 403, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("token" = [])),
    tag = "transfer"
)]
/// Validates the transfer and echoes it back. Balances are not touched.
#[instrument(skip(payload))]
pub async fn transfer(
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferRequest>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    info!(
        to_account = request.to_account,
        amount = request.amount,
        "transfer accepted"
    );

    Ok(Json(request))
}
