// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::debug;

use crate::{
    error::ApiError,
    lifecycle::AdmitError,
    models::{VerifyWalletRequest, VerifyWalletResponse},
    state::AppState,
};

pub const INSUFFICIENT_BALANCE_MESSAGE: &str = "Verification failed. Bags are too light.";
pub const SIGNATURE_MISMATCH_MESSAGE: &str = "Signature verification failed. Not the wallet owner.";
pub const MALFORMED_REQUEST_MESSAGE: &str =
    "Request body must be JSON with userId, walletAddress and signature.";

#[utoipa::path(
    post,
    path = "/verify-wallet",
    request_body = VerifyWalletRequest,
    tag = "Verification",
    responses(
        (status = 200, description = "Invite issued, or balance below the requirement", body = VerifyWalletResponse),
        (status = 400, description = "Malformed body or empty field in the request", body = VerifyWalletResponse),
        (status = 401, description = "Signature does not belong to the wallet", body = VerifyWalletResponse),
        (status = 500, description = "Invite or member record could not be created", body = VerifyWalletResponse)
    )
)]
pub async fn verify_wallet(
    State(state): State<AppState>,
    payload: Result<Json<VerifyWalletRequest>, JsonRejection>,
) -> Result<Json<VerifyWalletResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "Rejected verify-wallet body");
        ApiError::bad_request(MALFORMED_REQUEST_MESSAGE)
    })?;

    if request.user_id.is_empty()
        || request.wallet_address.trim().is_empty()
        || request.signature.trim().is_empty()
    {
        return Err(ApiError::bad_request(
            "userId, walletAddress and signature are required.",
        ));
    }

    let outcome = state
        .gate
        .admit(
            &request.user_id,
            request.wallet_address.trim(),
            request.signature.trim(),
        )
        .await;

    match outcome {
        Ok(grant) => Ok(Json(VerifyWalletResponse::invited(grant.invite_link))),
        Err(AdmitError::InsufficientBalance) => Ok(Json(VerifyWalletResponse::failure(
            INSUFFICIENT_BALANCE_MESSAGE,
        ))),
        Err(AdmitError::SignatureMismatch) => {
            Err(ApiError::unauthorized(SIGNATURE_MISMATCH_MESSAGE))
        }
        // Logged with detail by the lifecycle.
        Err(AdmitError::InviteIssuance(_) | AdmitError::Persistence(_)) => {
            Err(ApiError::internal())
        }
    }
}
