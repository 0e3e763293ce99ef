//! Postgres-backed implementation of the marketplace store.
//!
//! # What this module is
//! Implements the repository traits using Postgres (via `sqlx`) as a durable, shared backing
//! store for branch permission records, superpass tokens, and carts.
//!
//! # Data model
//! - `branch_permissions` holds one row per branch; its requests live in
//!   `branch_permission_requests` keyed by `(branch_code, request_id)` and ordered by a serial
//!   `position`, and approvals are appended to `approved_branches`.
//! - `superpass_tokens` holds every issued code; used and expired rows are never deleted.
//! - `carts` stores each user's nested quantity map as a JSONB document.
//!
//! # Consistency / atomicity
//! - Appending a request is a single `INSERT`; the foreign key turns a missing branch into
//!   `NotFound`.
//! - A decision is a conditional `UPDATE ... WHERE status = 'pending'` on one row, committed in
//!   the same transaction as the approved-branch insert. Concurrent decisions on other requests
//!   of the same branch cannot overwrite each other.
//! - Redemption is a conditional `UPDATE ... WHERE NOT used AND expires_at > now`; only one
//!   concurrent caller can flip `used`.
//! - Cart mutations lock the user's row (`SELECT ... FOR UPDATE`) for the read-apply-write cycle.
//!
//! # Operational notes
//! - Migrations run at startup via `sqlx::migrate!("./migrations")`.
//! - Database URLs may contain credentials; avoid logging them.
use super::{
    BranchStore, CartStore, MarketplaceStore, StoreError, StoreResult, SuperpassStore,
    pick_redeemable,
};
use crate::config::PostgresConfig;
use crate::model::{
    ApprovedBranch, BranchPermissionRecord, Cart, CartOp, PermissionRequest, RequestDecision,
    RequestStatus, SuperpassAction, SuperpassToken,
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Durable marketplace store backed by Postgres.
///
/// # Example
/// ```rust,no_run
/// use marketplace::config::PostgresConfig;
/// use marketplace::store::postgres::PostgresStore;
///
/// async fn open(pg: PostgresConfig) {
///     let _ = PostgresStore::connect(&pg).await;
/// }
/// ```
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, Clone, FromRow)]
struct DbPermissionRequest {
    branch_code: String,
    request_id: String,
    sub_branch_email: String,
    sub_branch_name: String,
    status: String,
    requested_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
struct DbApprovedBranch {
    email: String,
    name: String,
    approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbSuperpass {
    id: Uuid,
    code: String,
    action: String,
    category_ids: Json<Vec<String>>,
    admin_email: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used: bool,
    used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
struct DbCart {
    stores: Json<BTreeMap<String, BTreeMap<String, u32>>>,
}

const REQUEST_COLUMNS: &str = "branch_code, request_id, sub_branch_email, sub_branch_name, \
     status, requested_at, approved_at, rejected_at";

const SUPERPASS_COLUMNS: &str =
    "id, code, action, category_ids, admin_email, issued_at, expires_at, used, used_at";

impl PostgresStore {
    /// Connect to Postgres and apply embedded migrations before serving requests.
    ///
    /// # Errors
    /// - Connection, migration, or pool setup failures.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, true).await
    }

    /// Connect without running migrations. Intended for tests that manage the schema.
    #[cfg(any(test, feature = "pg-tests"))]
    pub async fn connect_without_migrations(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, false).await
    }

    async fn connect_internal(pg: &PostgresConfig, run_migrations: bool) -> StoreResult<Self> {
        // Bound connection and acquire waits so a dead database fails requests fast instead of
        // hanging handlers.
        let connect_options = PgConnectOptions::from_str(&pg.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options);
        let pool = tokio::time::timeout(Duration::from_millis(pg.connect_timeout_ms), pool)
            .await
            .map_err(|_| StoreError::Unexpected(anyhow!("postgres connect timed out")))??;

        if run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
        }
        tracing::info!("postgres store ready");
        Ok(Self { pool })
    }

    async fn branch_exists(&self, branch_code: &str) -> StoreResult<bool> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM branch_permissions WHERE branch_code = $1")
                .bind(branch_code)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl BranchStore for PostgresStore {
    async fn create_branch(&self, branch_code: &str) -> StoreResult<BranchPermissionRecord> {
        let insert = sqlx::query("INSERT INTO branch_permissions (branch_code) VALUES ($1)")
            .bind(branch_code)
            .execute(&self.pool)
            .await;
        if let Err(err) = insert {
            if is_unique_violation(&err) {
                return Err(StoreError::Conflict("branch exists".into()));
            }
            return Err(err.into());
        }
        Ok(BranchPermissionRecord::new(branch_code))
    }

    async fn get_branch(&self, branch_code: &str) -> StoreResult<BranchPermissionRecord> {
        // One snapshot for all three reads, so a decision committing mid-read cannot show a
        // request as pending next to its approved entry.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        let exists: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM branch_permissions WHERE branch_code = $1")
                .bind(branch_code)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Err(StoreError::NotFound("branch".into()));
        }
        let requests = sqlx::query_as::<_, DbPermissionRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM branch_permission_requests \
             WHERE branch_code = $1 ORDER BY position"
        ))
        .bind(branch_code)
        .fetch_all(&mut *tx)
        .await?;
        let approved = sqlx::query_as::<_, DbApprovedBranch>(
            "SELECT email, name, approved_at FROM approved_branches \
             WHERE branch_code = $1 ORDER BY position",
        )
        .bind(branch_code)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(BranchPermissionRecord {
            branch_code: branch_code.to_string(),
            permission_requests: requests
                .into_iter()
                .map(request_from_db)
                .collect::<StoreResult<_>>()?,
            approved_branches: approved
                .into_iter()
                .map(|row| ApprovedBranch {
                    email: row.email,
                    name: row.name,
                    approved_at: row.approved_at,
                })
                .collect(),
        })
    }

    async fn append_permission_request(
        &self,
        branch_code: &str,
        request: PermissionRequest,
    ) -> StoreResult<PermissionRequest> {
        let insert = sqlx::query(
            "INSERT INTO branch_permission_requests \
             (branch_code, request_id, sub_branch_email, sub_branch_name, status, requested_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(branch_code)
        .bind(&request.id)
        .bind(&request.sub_branch_email)
        .bind(&request.sub_branch_name)
        .bind(request.status.as_str())
        .bind(request.requested_at)
        .execute(&self.pool)
        .await;
        match insert {
            Ok(_) => Ok(request),
            Err(err) if is_foreign_key_violation(&err) => {
                Err(StoreError::NotFound("branch".into()))
            }
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::Conflict("request id exists".into()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn resolve_permission_request(
        &self,
        branch_code: &str,
        request_id: &str,
        decision: RequestDecision,
        at: DateTime<Utc>,
    ) -> StoreResult<PermissionRequest> {
        let (approved_at, rejected_at) = match decision {
            RequestDecision::Approve => (Some(at), None),
            RequestDecision::Reject => (None, Some(at)),
        };
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_as::<_, DbPermissionRequest>(&format!(
            "UPDATE branch_permission_requests \
             SET status = $3, approved_at = $4, rejected_at = $5 \
             WHERE branch_code = $1 AND request_id = $2 AND status = 'pending' \
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(branch_code)
        .bind(request_id)
        .bind(decision.status().as_str())
        .bind(approved_at)
        .bind(rejected_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            // Nothing matched: tell missing branch, missing request, and already-decided apart.
            let existing: Option<(String,)> = sqlx::query_as(
                "SELECT status FROM branch_permission_requests \
                 WHERE branch_code = $1 AND request_id = $2",
            )
            .bind(branch_code)
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await?;
            tx.rollback().await?;
            if existing.is_some() {
                return Err(StoreError::Conflict("request already resolved".into()));
            }
            if !self.branch_exists(branch_code).await? {
                return Err(StoreError::NotFound("branch".into()));
            }
            return Err(StoreError::NotFound("permission request".into()));
        };

        let resolved = request_from_db(row)?;
        if decision == RequestDecision::Approve {
            sqlx::query(
                "INSERT INTO approved_branches (branch_code, email, name, approved_at) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(branch_code)
            .bind(&resolved.sub_branch_email)
            .bind(&resolved.sub_branch_name)
            .bind(at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(resolved)
    }
}

#[async_trait]
impl SuperpassStore for PostgresStore {
    async fn insert_superpass(&self, token: SuperpassToken) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO superpass_tokens ({SUPERPASS_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(token.id)
        .bind(&token.code)
        .bind(token.action.as_str())
        .bind(Json(&token.category_ids))
        .bind(&token.admin_email)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.used)
        .bind(token.used_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn redeem_superpass(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<SuperpassToken> {
        let rows = sqlx::query_as::<_, DbSuperpass>(&format!(
            "SELECT {SUPERPASS_COLUMNS} FROM superpass_tokens WHERE code = $1 AND NOT used"
        ))
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        let candidates = rows
            .into_iter()
            .map(superpass_from_db)
            .collect::<StoreResult<Vec<_>>>()?;
        let id = pick_redeemable(&candidates, now)?.id;

        // The guard re-checks both conditions so a concurrent redemption or a window that closed
        // since the read turns into a miss instead of a second success.
        let redeemed = sqlx::query_as::<_, DbSuperpass>(&format!(
            "UPDATE superpass_tokens SET used = TRUE, used_at = $2 \
             WHERE id = $1 AND NOT used AND expires_at > $2 \
             RETURNING {SUPERPASS_COLUMNS}"
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        match redeemed {
            Some(row) => superpass_from_db(row),
            None => Err(StoreError::NotFound("superpass code".into())),
        }
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_cart(&self, user_id: &str) -> StoreResult<Cart> {
        let row = sqlx::query_as::<_, DbCart>("SELECT stores FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|row| Cart {
                stores: row.stores.0,
            })
            .unwrap_or_default())
    }

    async fn apply_cart_op(&self, user_id: &str, op: CartOp) -> StoreResult<Cart> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let row = sqlx::query_as::<_, DbCart>(
            "SELECT stores FROM carts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        let mut cart = Cart {
            stores: row.stores.0,
        };
        cart.apply(&op);
        sqlx::query("UPDATE carts SET stores = $2, updated_at = now() WHERE user_id = $1")
            .bind(user_id)
            .bind(Json(&cart.stores))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(cart)
    }
}

#[async_trait]
impl MarketplaceStore for PostgresStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    database_code(err).as_deref() == Some("23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    database_code(err).as_deref() == Some("23503")
}

fn database_code(err: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code.into_owned());
    }
    None
}

fn request_from_db(row: DbPermissionRequest) -> StoreResult<PermissionRequest> {
    let status = RequestStatus::parse(&row.status)
        .ok_or_else(|| StoreError::Unexpected(anyhow!("unknown request status {}", row.status)))?;
    Ok(PermissionRequest {
        id: row.request_id,
        sub_branch_email: row.sub_branch_email,
        sub_branch_name: row.sub_branch_name,
        status,
        requested_at: row.requested_at,
        approved_at: row.approved_at,
        rejected_at: row.rejected_at,
        main_branch_code: row.branch_code,
    })
}

fn superpass_from_db(row: DbSuperpass) -> StoreResult<SuperpassToken> {
    let action = SuperpassAction::parse(&row.action).ok_or_else(|| {
        StoreError::Unexpected(anyhow!("unknown superpass action {}", row.action))
    })?;
    Ok(SuperpassToken {
        id: row.id,
        code: row.code,
        action,
        category_ids: row.category_ids.0,
        admin_email: row.admin_email,
        issued_at: row.issued_at,
        expires_at: row.expires_at,
        used: row.used,
        used_at: row.used_at,
    })
}
