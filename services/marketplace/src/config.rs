//! Marketplace service configuration.
//!
//! # Purpose
//! Loads listener addresses, storage backend selection, bearer-token
//! verification settings, superpass policy, and mail delivery settings from
//! `MARKET_*` environment variables, optionally overridden by a YAML file named
//! in `MARKET_CONFIG`.
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

pub const DEFAULT_SUPERPASS_TTL_SECS: u64 = 30;
pub const DEFAULT_SUPERPASS_RECIPIENT: &str = "admin@localhost";
pub const DEFAULT_AUTH_LEEWAY_SECS: u64 = 30;
pub const DEFAULT_PG_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_PG_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" => Ok(StorageBackend::Postgres),
            other => bail!("unknown storage backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_pg_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_pg_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_pg_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 shared secret used to verify bearer tokens.
    pub jwt_secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SuperpassConfig {
    pub ttl_secs: u64,
    /// Fixed out-of-band address every code is mailed to.
    pub recipient: String,
}

#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    /// Transactional email HTTP endpoint; codes are only logged when unset.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub from: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub auth: AuthConfig,
    pub superpass: SuperpassConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Default, Deserialize)]
struct MarketplaceConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<StorageBackend>,
    postgres: Option<PostgresConfig>,
    auth: Option<AuthOverride>,
    superpass: Option<SuperpassOverride>,
    mail: Option<MailOverride>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthOverride {
    jwt_secret: Option<String>,
    issuer: Option<String>,
    audience: Option<String>,
    leeway_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SuperpassOverride {
    ttl_secs: Option<u64>,
    recipient: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MailOverride {
    endpoint: Option<String>,
    api_key: Option<String>,
    from: Option<String>,
}

fn default_pg_max_connections() -> u32 {
    DEFAULT_PG_MAX_CONNECTIONS
}

fn default_pg_timeout_ms() -> u64 {
    DEFAULT_PG_TIMEOUT_MS
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_opt(key) {
        Some(value) => value.parse().with_context(|| format!("parse {key}")),
        None => Ok(default),
    }
}

impl MarketplaceConfig {
    pub fn from_env() -> Result<Self> {
        let metrics_bind = std::env::var("MARKET_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse MARKET_METRICS_BIND")?;
        let bind_addr = std::env::var("MARKET_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8443".to_string())
            .parse()
            .with_context(|| "parse MARKET_BIND")?;
        let storage = match env_opt("MARKET_STORAGE") {
            Some(value) => StorageBackend::parse(&value)?,
            None => StorageBackend::Memory,
        };
        let postgres = match env_opt("MARKET_POSTGRES_URL") {
            Some(url) => Some(PostgresConfig {
                url,
                max_connections: env_parse(
                    "MARKET_POSTGRES_MAX_CONNECTIONS",
                    DEFAULT_PG_MAX_CONNECTIONS,
                )?,
                connect_timeout_ms: env_parse(
                    "MARKET_POSTGRES_CONNECT_TIMEOUT_MS",
                    DEFAULT_PG_TIMEOUT_MS,
                )?,
                acquire_timeout_ms: env_parse(
                    "MARKET_POSTGRES_ACQUIRE_TIMEOUT_MS",
                    DEFAULT_PG_TIMEOUT_MS,
                )?,
            }),
            None => None,
        };
        let auth = AuthConfig {
            jwt_secret: env_opt("MARKET_AUTH_JWT_SECRET").unwrap_or_default(),
            issuer: env_opt("MARKET_AUTH_ISSUER"),
            audience: env_opt("MARKET_AUTH_AUDIENCE"),
            leeway_secs: env_parse("MARKET_AUTH_LEEWAY_SECS", DEFAULT_AUTH_LEEWAY_SECS)?,
        };
        let superpass = SuperpassConfig {
            ttl_secs: env_parse("MARKET_SUPERPASS_TTL_SECS", DEFAULT_SUPERPASS_TTL_SECS)?,
            recipient: env_opt("MARKET_SUPERPASS_RECIPIENT")
                .unwrap_or_else(|| DEFAULT_SUPERPASS_RECIPIENT.to_string()),
        };
        let mail = MailConfig {
            endpoint: env_opt("MARKET_MAIL_ENDPOINT"),
            api_key: env_opt("MARKET_MAIL_API_KEY"),
            from: env_opt("MARKET_MAIL_FROM"),
        };
        Ok(Self {
            bind_addr,
            metrics_bind,
            storage,
            postgres,
            auth,
            superpass,
            mail,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("MARKET_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read MARKET_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: MarketplaceConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse marketplace config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = value;
        }
        if let Some(value) = override_cfg.postgres {
            self.postgres = Some(value);
        }
        if let Some(auth) = override_cfg.auth {
            if let Some(value) = auth.jwt_secret {
                self.auth.jwt_secret = value;
            }
            if auth.issuer.is_some() {
                self.auth.issuer = auth.issuer;
            }
            if auth.audience.is_some() {
                self.auth.audience = auth.audience;
            }
            if let Some(value) = auth.leeway_secs {
                self.auth.leeway_secs = value;
            }
        }
        if let Some(superpass) = override_cfg.superpass {
            if let Some(value) = superpass.ttl_secs {
                self.superpass.ttl_secs = value;
            }
            if let Some(value) = superpass.recipient {
                self.superpass.recipient = value;
            }
        }
        if let Some(mail) = override_cfg.mail {
            if mail.endpoint.is_some() {
                self.mail.endpoint = mail.endpoint;
            }
            if mail.api_key.is_some() {
                self.mail.api_key = mail.api_key;
            }
            if mail.from.is_some() {
                self.mail.from = mail.from;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            bail!("MARKET_AUTH_JWT_SECRET must be set");
        }
        if self.superpass.ttl_secs == 0 {
            bail!("superpass ttl must be positive");
        }
        Ok(())
    }
}
