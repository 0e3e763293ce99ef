//! Marketplace HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! This module centralizes route composition to keep `main` small and testable.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::auth::token::TokenVerifier;
use crate::mail::Mailer;
use crate::observability;
use crate::store::MarketplaceStore;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub api_version: String,
    pub store: Arc<dyn MarketplaceStore>,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub mailer: Arc<dyn Mailer>,
    pub superpass_ttl: chrono::Duration,
    /// Address every superpass code is mailed to.
    pub superpass_recipient: String,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    Router::new()
        .route("/system/info", get(api::system::system_info))
        .route("/system/health", get(api::system::system_health))
        .route("/branches", post(api::branches::create_branch))
        .route(
            "/branch-permissions",
            get(api::branches::get_branch_permissions)
                .post(api::branches::branch_permissions_command),
        )
        .route("/superpass/issue", post(api::superpass::issue_superpass))
        .route("/superpass/verify", post(api::superpass::verify_superpass))
        .route("/cart", get(api::cart::get_cart))
        .route("/cart/add", post(api::cart::add_to_cart))
        .route("/cart/remove", post(api::cart::remove_from_cart))
        .route("/cart/clear", post(api::cart::clear_cart_store))
        .route("/cart/delete-item", post(api::cart::delete_cart_item))
        .merge(utoipa_swagger_ui::SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(trace_layer)
        .with_state(state)
}
