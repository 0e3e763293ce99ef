//! OpenAPI schema aggregation for the marketplace API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document for docs
//! and client generation.
use crate::api::{
    branches, cart, superpass, system,
    types::{
        ActionResponse, BranchCreateRequest, BranchPermissionAction, BranchPermissionCommand,
        BranchRecordResponse, CartItemRequest, CartResponse, ErrorResponse, HealthStatus,
        SuperpassIssueRequest, SuperpassVerifyRequest, SuperpassVerifyResponse, SystemInfo,
    },
};
use crate::model::{
    ApprovedBranch, BranchPermissionRecord, Cart, PermissionRequest, RequestStatus,
    SuperpassAction,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "marketplace",
        version = "v1",
        description = "Marketplace branch permission, superpass, and cart API"
    ),
    paths(
        system::system_info,
        system::system_health,
        branches::create_branch,
        branches::get_branch_permissions,
        branches::branch_permissions_command,
        superpass::issue_superpass,
        superpass::verify_superpass,
        cart::get_cart,
        cart::add_to_cart,
        cart::remove_from_cart,
        cart::clear_cart_store,
        cart::delete_cart_item
    ),
    components(schemas(
        SystemInfo,
        HealthStatus,
        ErrorResponse,
        ActionResponse,
        BranchCreateRequest,
        BranchPermissionAction,
        BranchPermissionCommand,
        BranchRecordResponse,
        BranchPermissionRecord,
        PermissionRequest,
        ApprovedBranch,
        RequestStatus,
        SuperpassAction,
        SuperpassIssueRequest,
        SuperpassVerifyRequest,
        SuperpassVerifyResponse,
        Cart,
        CartItemRequest,
        CartResponse
    )),
    tags(
        (name = "system", description = "System and discovery endpoints"),
        (name = "branches", description = "Cross-branch permission requests"),
        (name = "superpass", description = "One-time confirmation codes"),
        (name = "cart", description = "Per-user shopping cart")
    )
)]
pub struct ApiDoc;
