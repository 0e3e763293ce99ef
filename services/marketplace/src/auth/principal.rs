//! Caller identity and request guards.
//!
//! # Purpose
//! Holds the identity derived from a verified bearer token and the helpers
//! handlers use to require authentication, the admin role, or branch
//! ownership.
use crate::api::error::{ApiError, api_forbidden, api_unauthorized};
use crate::app::AppState;
use crate::auth::token::MarketClaims;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub branch_code: Option<String>,
}

impl Principal {
    pub fn from_claims(claims: MarketClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
            branch_code: claims.branch_code,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }

    pub fn owns_branch(&self, branch_code: &str) -> bool {
        self.branch_code.as_deref() == Some(branch_code)
    }
}

pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim).filter(|token| !token.is_empty())
}

pub fn require_principal(state: &AppState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let bearer = extract_bearer(headers).ok_or_else(|| api_unauthorized("missing bearer token"))?;
    state.token_verifier.verify(bearer).map_err(|err| {
        tracing::debug!(error = %err, "bearer token rejected");
        api_unauthorized("invalid token")
    })
}

pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let principal = require_principal(state, headers)?;
    if !principal.is_admin() {
        return Err(api_forbidden("admin role required"));
    }
    Ok(principal)
}

pub fn require_branch_owner(
    state: &AppState,
    headers: &HeaderMap,
    branch_code: &str,
) -> Result<Principal, ApiError> {
    let principal = require_principal(state, headers)?;
    if !principal.owns_branch(branch_code) {
        return Err(api_forbidden("branch mismatch"));
    }
    Ok(principal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn non_bearer_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(extract_bearer(&headers), None);
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer "),
        );
        assert_eq!(extract_bearer(&headers), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn admin_requires_exact_role() {
        let principal = Principal {
            user_id: "u".into(),
            email: None,
            role: Some("administrator".into()),
            branch_code: None,
        };
        assert!(!principal.is_admin());
        assert!(!principal.owns_branch("MAIN"));
    }
}
