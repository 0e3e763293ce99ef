//! Superpass one-time codes.
//!
//! # Purpose
//! A superpass is a short-lived code mailed to an administrator and redeemed
//! once to confirm a destructive category operation.
//!
//! # Key invariants
//! - Codes are 8 characters drawn uniformly from `[A-Z0-9]`.
//! - `used` flips from `false` to `true` at most once.
//! - Expiry is evaluated against the caller's clock at redemption time only.
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const SUPERPASS_CODE_LEN: usize = 8;
pub const SUPERPASS_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SuperpassAction {
    SingleCategoryDelete,
    BulkCategoryDelete,
    SingleProductCategoryDelete,
    BulkProductCategoryDelete,
}

impl SuperpassAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuperpassAction::SingleCategoryDelete => "single-category-delete",
            SuperpassAction::BulkCategoryDelete => "bulk-category-delete",
            SuperpassAction::SingleProductCategoryDelete => "single-product-category-delete",
            SuperpassAction::BulkProductCategoryDelete => "bulk-product-category-delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "single-category-delete" => Some(SuperpassAction::SingleCategoryDelete),
            "bulk-category-delete" => Some(SuperpassAction::BulkCategoryDelete),
            "single-product-category-delete" => Some(SuperpassAction::SingleProductCategoryDelete),
            "bulk-product-category-delete" => Some(SuperpassAction::BulkProductCategoryDelete),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SuperpassToken {
    pub id: Uuid,
    pub code: String,
    pub action: SuperpassAction,
    pub category_ids: Vec<String>,
    pub admin_email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

/// Why a token cannot be redeemed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unredeemable {
    Used,
    Expired,
}

impl SuperpassToken {
    pub fn issue(
        action: SuperpassAction,
        category_ids: Vec<String>,
        admin_email: &str,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: generate_code(),
            action,
            category_ids,
            admin_email: admin_email.to_string(),
            issued_at,
            expires_at: issued_at + ttl,
            used: false,
            used_at: None,
        }
    }

    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), Unredeemable> {
        if self.used {
            return Err(Unredeemable::Used);
        }
        if now >= self.expires_at {
            return Err(Unredeemable::Expired);
        }
        Ok(())
    }

    pub fn mark_used(&mut self, now: DateTime<Utc>) {
        self.used = true;
        self.used_at = Some(now);
    }
}

/// Draw a fresh code. Not cryptographically strong; collisions are possible.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SUPERPASS_CODE_LEN)
        .map(|_| SUPERPASS_ALPHABET[rng.gen_range(0..SUPERPASS_ALPHABET.len())] as char)
        .collect()
}

/// Normalize user input before matching against stored codes.
pub fn normalize_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}
