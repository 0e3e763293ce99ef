//! HTTP API request/response types.
//!
//! # Purpose
//! Defines the JSON payload shapes for the marketplace REST API and OpenAPI
//! schema generation. Field names are camelCase on the wire.
use crate::model::{BranchPermissionRecord, Cart, SuperpassAction};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SystemInfo {
    pub service: String,
    pub api_version: String,
    pub storage_backend: String,
    pub durable_storage: bool,
    pub mailer: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BranchPermissionAction {
    RequestAccess,
    ApproveAccess,
    RejectAccess,
}

/// Body of `POST /branch-permissions`. Which optional fields are required
/// depends on `action`.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BranchPermissionCommand {
    pub action: BranchPermissionAction,
    #[serde(default)]
    pub main_branch_code: String,
    #[serde(default)]
    pub sub_branch_email: Option<String>,
    #[serde(default)]
    pub sub_branch_name: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ActionResponse {
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            request_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BranchQuery {
    pub branch_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BranchCreateRequest {
    #[serde(default)]
    pub branch_code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct BranchRecordResponse {
    pub success: bool,
    pub data: BranchPermissionRecord,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SuperpassIssueRequest {
    pub action: SuperpassAction,
    #[serde(default)]
    pub category_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SuperpassVerifyRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SuperpassVerifyResponse {
    pub success: bool,
    pub action: SuperpassAction,
    pub category_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    #[serde(default)]
    pub store_id: String,
    #[serde(default)]
    pub product_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct CartResponse {
    pub success: bool,
    pub cart: Cart,
}
