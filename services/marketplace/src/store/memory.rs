//! In-memory implementation of the marketplace store.
//!
//! # Purpose
//! This store implements the repository traits entirely in memory using `HashMap`s guarded by
//! `tokio::sync::RwLock`. It exists for:
//! - local development and tests (no external dependencies)
//! - deployments where durability is not required
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: every mutation runs inside one write-lock critical section,
//!   so an append, a decision, a redemption, or a cart update is atomic with respect to any other
//!   call against the same collection.
//! - **No multi-node coordination**: multiple instances each have independent state.
//!
//! # Metrics
//! Gauges mirror the durable backend so dashboards look the same in development.
use super::{
    BranchStore, CartStore, MarketplaceStore, StoreError, StoreResult, SuperpassStore,
    pick_redeemable,
};
use crate::model::{
    ApprovedBranch, BranchPermissionRecord, Cart, CartOp, PermissionRequest, RequestDecision,
    SuperpassToken,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory marketplace store.
///
/// All maps are wrapped in `Arc<RwLock<...>>` so the store can be shared across async request
/// handlers, reads proceed concurrently, and writes are serialized per collection.
#[derive(Default)]
pub struct InMemoryStore {
    /// Branch permission records keyed by branch code.
    branches: Arc<RwLock<HashMap<String, BranchPermissionRecord>>>,
    /// Every superpass ever issued, including used and expired ones.
    superpasses: Arc<RwLock<Vec<SuperpassToken>>>,
    /// Carts keyed by user id.
    carts: Arc<RwLock<HashMap<String, Cart>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BranchStore for InMemoryStore {
    async fn create_branch(&self, branch_code: &str) -> StoreResult<BranchPermissionRecord> {
        let mut branches = self.branches.write().await;
        if branches.contains_key(branch_code) {
            return Err(StoreError::Conflict("branch exists".into()));
        }
        let record = BranchPermissionRecord::new(branch_code);
        branches.insert(branch_code.to_string(), record.clone());
        metrics::gauge!("marketplace_branches_total").set(branches.len() as f64);
        Ok(record)
    }

    async fn get_branch(&self, branch_code: &str) -> StoreResult<BranchPermissionRecord> {
        self.branches
            .read()
            .await
            .get(branch_code)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("branch".into()))
    }

    async fn append_permission_request(
        &self,
        branch_code: &str,
        request: PermissionRequest,
    ) -> StoreResult<PermissionRequest> {
        let mut branches = self.branches.write().await;
        let record = branches
            .get_mut(branch_code)
            .ok_or_else(|| StoreError::NotFound("branch".into()))?;
        if record
            .permission_requests
            .iter()
            .any(|existing| existing.id == request.id)
        {
            return Err(StoreError::Conflict("request id exists".into()));
        }
        record.permission_requests.push(request.clone());
        Ok(request)
    }

    async fn resolve_permission_request(
        &self,
        branch_code: &str,
        request_id: &str,
        decision: RequestDecision,
        at: DateTime<Utc>,
    ) -> StoreResult<PermissionRequest> {
        let mut branches = self.branches.write().await;
        let record = branches
            .get_mut(branch_code)
            .ok_or_else(|| StoreError::NotFound("branch".into()))?;
        let request = record
            .find_request_mut(request_id)
            .ok_or_else(|| StoreError::NotFound("permission request".into()))?;
        if !request.decide(decision, at) {
            return Err(StoreError::Conflict("request already resolved".into()));
        }
        let resolved = request.clone();
        if decision == RequestDecision::Approve {
            record
                .approved_branches
                .push(ApprovedBranch::from_request(&resolved, at));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl SuperpassStore for InMemoryStore {
    async fn insert_superpass(&self, token: SuperpassToken) -> StoreResult<()> {
        self.superpasses.write().await.push(token);
        Ok(())
    }

    async fn redeem_superpass(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<SuperpassToken> {
        // Selection and the `used` flip happen under one write lock, so at most one concurrent
        // caller can observe the token as unused.
        let mut tokens = self.superpasses.write().await;
        let candidates: Vec<SuperpassToken> = tokens
            .iter()
            .filter(|token| !token.used && token.code == code)
            .cloned()
            .collect();
        let id = pick_redeemable(&candidates, now)?.id;
        let token = tokens
            .iter_mut()
            .find(|token| token.id == id)
            .ok_or_else(|| StoreError::NotFound("superpass code".into()))?;
        token.mark_used(now);
        Ok(token.clone())
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_cart(&self, user_id: &str) -> StoreResult<Cart> {
        Ok(self
            .carts
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn apply_cart_op(&self, user_id: &str, op: CartOp) -> StoreResult<Cart> {
        let mut carts = self.carts.write().await;
        let cart = carts.entry(user_id.to_string()).or_default();
        cart.apply(&op);
        Ok(cart.clone())
    }
}

#[async_trait]
impl MarketplaceStore for InMemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
