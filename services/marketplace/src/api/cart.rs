//! Cart API handlers.
//!
//! # Purpose
//! Exposes the caller's cart and the four mutations on it. The user id always
//! comes from the bearer token, never from the body.
use crate::api::error::{ApiError, api_internal, api_validation_error};
use crate::api::types::{CartItemRequest, CartResponse};
use crate::app::AppState;
use crate::auth::principal::require_principal;
use crate::model::CartOp;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;

#[derive(Debug, Clone, Copy)]
enum CartOpKind {
    Add,
    Remove,
    Clear,
    DeleteItem,
}

fn cart_op(kind: CartOpKind, body: CartItemRequest) -> Result<CartOp, ApiError> {
    let store_id = body.store_id.trim().to_string();
    if store_id.is_empty() {
        return Err(api_validation_error("storeId is required"));
    }
    let product_id = || match body.product_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(api_validation_error("productId is required")),
    };
    Ok(match kind {
        CartOpKind::Add => CartOp::Add {
            store_id,
            product_id: product_id()?,
        },
        CartOpKind::Remove => CartOp::Remove {
            store_id,
            product_id: product_id()?,
        },
        CartOpKind::Clear => CartOp::Clear { store_id },
        CartOpKind::DeleteItem => CartOp::DeleteItem {
            store_id,
            product_id: product_id()?,
        },
    })
}

async fn mutate(
    state: AppState,
    headers: HeaderMap,
    payload: Result<Json<CartItemRequest>, JsonRejection>,
    kind: CartOpKind,
) -> Result<Json<CartResponse>, ApiError> {
    let principal = require_principal(&state, &headers)?;
    let Json(body) = payload?;
    let op = cart_op(kind, body)?;
    let label = op.label();
    let cart = state
        .store
        .apply_cart_op(&principal.user_id, op)
        .await
        .map_err(|err| api_internal("failed to update cart", &err))?;
    metrics::counter!("marketplace_cart_mutations_total", "op" => label).increment(1);
    tracing::debug!(user_id = %principal.user_id, op = label, "cart updated");
    Ok(Json(CartResponse {
        success: true,
        cart,
    }))
}

#[utoipa::path(
    get,
    path = "/cart",
    tag = "cart",
    responses(
        (status = 200, description = "Caller's cart", body = CartResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>, ApiError> {
    let principal = require_principal(&state, &headers)?;
    let cart = state
        .store
        .get_cart(&principal.user_id)
        .await
        .map_err(|err| api_internal("failed to load cart", &err))?;
    Ok(Json(CartResponse {
        success: true,
        cart,
    }))
}

#[utoipa::path(
    post,
    path = "/cart/add",
    tag = "cart",
    request_body = CartItemRequest,
    responses(
        (status = 200, description = "Quantity incremented", body = CartResponse),
        (status = 400, description = "Missing identifiers", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn add_to_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CartItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    mutate(state, headers, payload, CartOpKind::Add).await
}

#[utoipa::path(
    post,
    path = "/cart/remove",
    tag = "cart",
    request_body = CartItemRequest,
    responses(
        (status = 200, description = "Quantity decremented", body = CartResponse),
        (status = 400, description = "Missing identifiers", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn remove_from_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CartItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    mutate(state, headers, payload, CartOpKind::Remove).await
}

#[utoipa::path(
    post,
    path = "/cart/clear",
    tag = "cart",
    request_body = CartItemRequest,
    responses(
        (status = 200, description = "Store emptied", body = CartResponse),
        (status = 400, description = "Missing storeId", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn clear_cart_store(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CartItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    mutate(state, headers, payload, CartOpKind::Clear).await
}

#[utoipa::path(
    post,
    path = "/cart/delete-item",
    tag = "cart",
    request_body = CartItemRequest,
    responses(
        (status = 200, description = "Line item removed", body = CartResponse),
        (status = 400, description = "Missing identifiers", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_cart_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CartItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    mutate(state, headers, payload, CartOpKind::DeleteItem).await
}
