//! Branch permission API handlers.
//!
//! # Purpose and responsibility
//! Lets a sub-branch ask a main branch for cross-account access and lets the
//! owning main branch approve or reject each request individually.
//!
//! # Key invariants and assumptions
//! - Input is validated before any store call, so a rejected request leaves
//!   the branch record untouched.
//! - Approve/reject only ever touch the targeted request.
//!
//! # Security considerations
//! - Requesting access and reading a record are open; deciding a request or
//!   registering a branch requires a bearer token for that branch.
use crate::api::error::{
    ApiError, api_conflict, api_internal, api_not_found, api_validation_error,
};
use crate::api::types::{
    ActionResponse, BranchCreateRequest, BranchPermissionAction, BranchPermissionCommand,
    BranchQuery, BranchRecordResponse,
};
use crate::app::AppState;
use crate::auth::principal::require_branch_owner;
use crate::model::{PermissionRequest, RequestDecision};
use crate::store::StoreError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(api_validation_error(&format!("{field} is required"))),
    }
}

#[utoipa::path(
    post,
    path = "/branches",
    tag = "branches",
    request_body = BranchCreateRequest,
    responses(
        (status = 201, description = "Branch registered", body = BranchRecordResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Token is for another branch", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Branch already exists", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_branch(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<BranchCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload?;
    let branch_code = required(Some(body.branch_code.as_str()), "branchCode")?;
    require_branch_owner(&state, &headers, branch_code)?;
    match state.store.create_branch(branch_code).await {
        Ok(record) => {
            tracing::info!(branch_code, "branch registered");
            Ok((
                StatusCode::CREATED,
                Json(BranchRecordResponse {
                    success: true,
                    data: record,
                }),
            ))
        }
        Err(StoreError::Conflict(_)) => {
            Err(api_conflict("already_exists", "branch already exists"))
        }
        Err(err) => Err(api_internal("failed to register branch", &err)),
    }
}

#[utoipa::path(
    get,
    path = "/branch-permissions",
    tag = "branches",
    params(
        ("branchCode" = String, Query, description = "Main branch reference code")
    ),
    responses(
        (status = 200, description = "Branch permission record", body = BranchRecordResponse),
        (status = 400, description = "Missing branchCode", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Branch not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_branch_permissions(
    State(state): State<AppState>,
    Query(query): Query<BranchQuery>,
) -> Result<Json<BranchRecordResponse>, ApiError> {
    let branch_code = required(query.branch_code.as_deref(), "branchCode")?;
    match state.store.get_branch(branch_code).await {
        Ok(record) => Ok(Json(BranchRecordResponse {
            success: true,
            data: record,
        })),
        Err(StoreError::NotFound(_)) => Err(api_not_found("branch not found")),
        Err(err) => Err(api_internal("failed to load branch", &err)),
    }
}

#[utoipa::path(
    post,
    path = "/branch-permissions",
    tag = "branches",
    request_body = BranchPermissionCommand,
    responses(
        (status = 200, description = "Command applied", body = ActionResponse),
        (status = 400, description = "Invalid input", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Token is for another branch", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Branch or request not found", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Request already decided", body = crate::api::types::ErrorResponse)
    )
)]
/// Dispatch a branch permission command on its `action` field.
pub(crate) async fn branch_permissions_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<BranchPermissionCommand>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    let Json(command) = payload?;
    match command.action {
        BranchPermissionAction::RequestAccess => request_access(&state, &command).await,
        BranchPermissionAction::ApproveAccess => {
            decide_access(&state, &headers, &command, RequestDecision::Approve).await
        }
        BranchPermissionAction::RejectAccess => {
            decide_access(&state, &headers, &command, RequestDecision::Reject).await
        }
    }
}

async fn request_access(
    state: &AppState,
    command: &BranchPermissionCommand,
) -> Result<Json<ActionResponse>, ApiError> {
    let main_branch_code = required(Some(command.main_branch_code.as_str()), "mainBranchCode")?;
    let email = required(command.sub_branch_email.as_deref(), "subBranchEmail")?;
    let name = required(command.sub_branch_name.as_deref(), "subBranchName")?;

    let request = PermissionRequest::pending(main_branch_code, email, name, Utc::now());
    match state
        .store
        .append_permission_request(main_branch_code, request)
        .await
    {
        Ok(request) => {
            metrics::counter!("marketplace_branch_requests_total", "action" => "request")
                .increment(1);
            tracing::info!(
                main_branch_code,
                request_id = %request.id,
                "branch access requested"
            );
            Ok(Json(ActionResponse {
                success: true,
                message: "access request submitted".to_string(),
                request_id: Some(request.id),
            }))
        }
        Err(StoreError::NotFound(_)) => Err(api_not_found("branch not found")),
        Err(err) => Err(api_internal("failed to submit access request", &err)),
    }
}

async fn decide_access(
    state: &AppState,
    headers: &HeaderMap,
    command: &BranchPermissionCommand,
    decision: RequestDecision,
) -> Result<Json<ActionResponse>, ApiError> {
    let main_branch_code = required(Some(command.main_branch_code.as_str()), "mainBranchCode")?;
    require_branch_owner(state, headers, main_branch_code)?;
    let request_id = required(command.request_id.as_deref(), "requestId")?;

    match state
        .store
        .resolve_permission_request(main_branch_code, request_id, decision, Utc::now())
        .await
    {
        Ok(request) => {
            metrics::counter!("marketplace_branch_requests_total", "action" => decision.label())
                .increment(1);
            tracing::info!(
                main_branch_code,
                request_id,
                status = request.status.as_str(),
                "branch access decided"
            );
            let message = match decision {
                RequestDecision::Approve => "access approved",
                RequestDecision::Reject => "access rejected",
            };
            Ok(Json(ActionResponse::ok(message)))
        }
        Err(StoreError::NotFound(what)) => Err(api_not_found(&format!("{what} not found"))),
        Err(StoreError::Conflict(_)) => Err(api_conflict(
            "already_resolved",
            "request has already been decided",
        )),
        Err(err) => Err(api_internal("failed to decide access request", &err)),
    }
}
