//! Bearer token verification.
//!
//! # Purpose
//! Turns an `Authorization: Bearer <jwt>` credential issued by the identity
//! provider into a [`Principal`]. The provider signs tokens with a shared HS256
//! secret; the verifier checks signature, expiry, and the optional issuer and
//! audience before trusting any claim.
//!
//! # Key invariants
//! - Only HS256 is accepted; tokens signed with any other algorithm fail.
//! - `sub` and `exp` are mandatory.
//!
//! # How to use
//! Build a [`JwtVerifier`] from [`AuthConfig`] and store it behind
//! `Arc<dyn TokenVerifier>` in application state. Tests and local tooling can
//! call [`JwtVerifier::mint`] to produce tokens the verifier accepts.
use crate::auth::principal::Principal;
use crate::config::AuthConfig;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Claims carried by marketplace bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// `admin` grants superpass access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Branch the caller owns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_code: Option<String>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("token subject is empty")]
    EmptySubject,
}

/// Validates a bearer credential and yields the caller's identity.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Principal, TokenError>;
}

#[derive(Clone)]
pub struct JwtVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: Option<String>,
    audience: Option<String>,
    leeway: u64,
}

impl JwtVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            leeway: config.leeway_secs,
        }
    }

    /// Sign a token for `sub` that this verifier will accept for `ttl`.
    pub fn mint(
        &self,
        sub: &str,
        email: Option<&str>,
        role: Option<&str>,
        branch_code: Option<&str>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let claims = MarketClaims {
            sub: sub.to_string(),
            exp: now + ttl.as_secs() as i64,
            iat: Some(now),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            email: email.map(str::to_string),
            role: role.map(str::to_string),
            branch_code: branch_code.map(str::to_string),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Principal, TokenError> {
        let data =
            jsonwebtoken::decode::<MarketClaims>(token, &self.decoding_key, &self.validation())?;
        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(TokenError::EmptySubject);
        }
        Ok(Principal::from_claims(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(issuer: Option<&str>, audience: Option<&str>) -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            issuer: issuer.map(str::to_string),
            audience: audience.map(str::to_string),
            leeway_secs: 0,
        }
    }

    #[test]
    fn minted_token_round_trips_to_principal() {
        let verifier = JwtVerifier::new(&config(Some("market-auth"), Some("market-api")));
        let token = verifier
            .mint(
                "user-1",
                Some("u1@example.com"),
                Some("admin"),
                Some("MAIN"),
                Duration::from_secs(60),
            )
            .expect("mint");
        let principal = verifier.verify(&token).expect("verify");
        assert_eq!(principal.user_id, "user-1");
        assert_eq!(principal.email.as_deref(), Some("u1@example.com"));
        assert!(principal.is_admin());
        assert!(principal.owns_branch("MAIN"));
        assert!(!principal.owns_branch("OTHER"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let signer = JwtVerifier::new(&config(None, None));
        let token = signer
            .mint("user-1", None, None, None, Duration::from_secs(60))
            .expect("mint");
        let mut other = config(None, None);
        other.jwt_secret = "different".to_string();
        let verifier = JwtVerifier::new(&other);
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn issuer_mismatch_is_rejected() {
        let signer = JwtVerifier::new(&config(Some("someone-else"), None));
        let token = signer
            .mint("user-1", None, None, None, Duration::from_secs(60))
            .expect("mint");
        let verifier = JwtVerifier::new(&config(Some("market-auth"), None));
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let verifier = JwtVerifier::new(&config(None, None));
        let claims = MarketClaims {
            sub: "user-1".to_string(),
            exp: 1_000,
            iat: None,
            iss: None,
            aud: None,
            email: None,
            role: None,
            branch_code: None,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("encode");
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let verifier = JwtVerifier::new(&config(None, None));
        assert!(verifier.verify("not-a-jwt").is_err());
    }
}
