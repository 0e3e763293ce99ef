//! Superpass issue/verify handlers.
//!
//! # Purpose and responsibility
//! Issues short-lived one-time codes that gate destructive category
//! operations and redeems them exactly once.
//!
//! # Key invariants and assumptions
//! - The code never appears in an HTTP response; it is only mailed.
//! - Mail delivery never blocks or fails the issuing request.
//! - Redemption is a single conditional store update, so concurrent verifies
//!   of one code produce exactly one success.
//!
//! # Security considerations
//! - Both endpoints require a bearer token with the admin role.
use crate::api::error::{
    ApiError, api_expired, api_internal, api_invalid_code, api_validation_error,
};
use crate::api::types::{
    ActionResponse, SuperpassIssueRequest, SuperpassVerifyRequest, SuperpassVerifyResponse,
};
use crate::app::AppState;
use crate::auth::principal::require_admin;
use crate::mail::{self, MailMessage};
use crate::model::{SuperpassToken, normalize_code};
use crate::store::StoreError;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use chrono::Utc;

#[utoipa::path(
    post,
    path = "/superpass/issue",
    tag = "superpass",
    request_body = SuperpassIssueRequest,
    responses(
        (status = 200, description = "Code issued and mailed", body = ActionResponse),
        (status = 400, description = "Invalid input", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn issue_superpass(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SuperpassIssueRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    let principal = require_admin(&state, &headers)?;
    let Json(body) = payload?;
    if body.category_ids.is_empty() {
        return Err(api_validation_error("categoryIds must not be empty"));
    }
    if body.category_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(api_validation_error("categoryIds must not contain blank ids"));
    }

    let token = SuperpassToken::issue(
        body.action,
        body.category_ids,
        &state.superpass_recipient,
        Utc::now(),
        state.superpass_ttl,
    );
    let message = MailMessage::superpass(
        &token.admin_email,
        &token.code,
        token.action.as_str(),
        state.superpass_ttl.num_seconds().max(0) as u64,
    );
    let token_id = token.id;
    let action = token.action;
    state
        .store
        .insert_superpass(token)
        .await
        .map_err(|err| api_internal("failed to issue superpass", &err))?;

    metrics::counter!("marketplace_superpass_issued_total").increment(1);
    tracing::info!(
        %token_id,
        action = action.as_str(),
        issued_by = %principal.user_id,
        "superpass issued"
    );
    mail::dispatch(state.mailer.clone(), message);
    Ok(Json(ActionResponse::ok("superpass sent")))
}

#[utoipa::path(
    post,
    path = "/superpass/verify",
    tag = "superpass",
    request_body = SuperpassVerifyRequest,
    responses(
        (status = 200, description = "Code redeemed", body = SuperpassVerifyResponse),
        (status = 400, description = "Invalid or already used code", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::api::types::ErrorResponse),
        (status = 410, description = "Code expired", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn verify_superpass(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SuperpassVerifyRequest>, JsonRejection>,
) -> Result<Json<SuperpassVerifyResponse>, ApiError> {
    let principal = require_admin(&state, &headers)?;
    let Json(body) = payload?;
    let code = normalize_code(&body.code);
    if code.is_empty() {
        return Err(api_validation_error("code is required"));
    }

    let outcome = state.store.redeem_superpass(&code, Utc::now()).await;
    let label = match &outcome {
        Ok(_) => "accepted",
        Err(StoreError::NotFound(_)) => "invalid",
        Err(StoreError::Expired(_)) => "expired",
        Err(_) => "error",
    };
    metrics::counter!("marketplace_superpass_verifications_total", "outcome" => label)
        .increment(1);

    match outcome {
        Ok(token) => {
            tracing::info!(
                token_id = %token.id,
                action = token.action.as_str(),
                verified_by = %principal.user_id,
                "superpass redeemed"
            );
            Ok(Json(SuperpassVerifyResponse {
                success: true,
                action: token.action,
                category_ids: token.category_ids,
            }))
        }
        Err(StoreError::NotFound(_)) => Err(api_invalid_code("invalid superpass code")),
        Err(StoreError::Expired(_)) => Err(api_expired("superpass code expired")),
        Err(err) => Err(api_internal("failed to verify superpass", &err)),
    }
}
