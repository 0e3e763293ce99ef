//! Marketplace storage traits and shared error types.
//!
//! # Purpose
//! Each aggregate (branch permissions, superpass tokens, carts) sits behind a
//! repository trait that exposes only atomic operations. Callers never read a
//! document, mutate it, and write it back themselves.
//!
//! # Backends
//! - [`memory::InMemoryStore`] for development and tests.
//! - [`postgres::PostgresStore`] for durable deployments.
use crate::model::{
    BranchPermissionRecord, Cart, CartOp, PermissionRequest, RequestDecision, SuperpassToken,
    Unredeemable,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("expired: {0}")]
    Expired(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unexpected(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait BranchStore: Send + Sync {
    /// Create an empty permission record. `Conflict` if the code is taken.
    async fn create_branch(&self, branch_code: &str) -> StoreResult<BranchPermissionRecord>;

    async fn get_branch(&self, branch_code: &str) -> StoreResult<BranchPermissionRecord>;

    /// Append a request to the end of the branch's list. `NotFound` if the
    /// branch does not exist.
    async fn append_permission_request(
        &self,
        branch_code: &str,
        request: PermissionRequest,
    ) -> StoreResult<PermissionRequest>;

    /// Move one pending request to a terminal state, touching no other
    /// request. Approval also records an approved-branch entry in the same
    /// atomic step. `Conflict` if the request was already decided.
    async fn resolve_permission_request(
        &self,
        branch_code: &str,
        request_id: &str,
        decision: RequestDecision,
        at: DateTime<Utc>,
    ) -> StoreResult<PermissionRequest>;
}

#[async_trait]
pub trait SuperpassStore: Send + Sync {
    async fn insert_superpass(&self, token: SuperpassToken) -> StoreResult<()>;

    /// Redeem the single unused token matching `code`.
    ///
    /// - `NotFound` when no unused token matches, when several do, or when a
    ///   concurrent redemption won the race.
    /// - `Expired` when the only match is past its window.
    ///
    /// On success the returned token has `used == true`.
    async fn redeem_superpass(&self, code: &str, now: DateTime<Utc>)
    -> StoreResult<SuperpassToken>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Return the user's cart, empty when none has been written yet.
    async fn get_cart(&self, user_id: &str) -> StoreResult<Cart>;

    /// Apply one mutation atomically and return the resulting cart.
    async fn apply_cart_op(&self, user_id: &str, op: CartOp) -> StoreResult<Cart>;
}

/// Choose the token a redemption applies to from the unused tokens that share
/// the entered code. Both backends route through here so they agree on the
/// ambiguous-collision and expiry outcomes.
///
/// Only tokens still inside their window take part in the collision check. An
/// expired token is reported as `Expired` only when no live token matches.
pub(crate) fn pick_redeemable<'a>(
    candidates: &'a [SuperpassToken],
    now: DateTime<Utc>,
) -> StoreResult<&'a SuperpassToken> {
    let (live, stale): (Vec<&SuperpassToken>, Vec<&SuperpassToken>) = candidates
        .iter()
        .filter(|token| token.check_redeemable(now) != Err(Unredeemable::Used))
        .partition(|token| token.check_redeemable(now).is_ok());
    match live.as_slice() {
        [token] => Ok(*token),
        [] if stale.is_empty() => Err(StoreError::NotFound("superpass code".into())),
        [] => Err(StoreError::Expired("superpass code".into())),
        _ => {
            tracing::warn!(
                matches = live.len(),
                "superpass code collision; refusing ambiguous redemption"
            );
            Err(StoreError::NotFound("superpass code".into()))
        }
    }
}

#[async_trait]
pub trait MarketplaceStore: BranchStore + SuperpassStore + CartStore {
    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
