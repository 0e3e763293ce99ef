//! Out-of-band delivery of superpass codes.
//!
//! # Purpose
//! Sends the freshly issued superpass code to the configured administrator
//! address. Delivery is fire-and-forget: the issuing request never waits on
//! the mail provider, and failures are only logged and counted.
//!
//! # Backends
//! - [`LogMailer`] writes the message to the trace log (development).
//! - [`HttpMailer`] posts JSON to a transactional-email HTTP endpoint.
use crate::config::MailConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_FROM: &str = "no-reply@marketplace.local";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl MailMessage {
    pub fn superpass(to: &str, code: &str, action: &str, ttl_secs: u64) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your superpass code".to_string(),
            text: format!(
                "Superpass code {code} confirms the {action} operation. \
                 It expires in {ttl_secs} seconds and can be used once."
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail endpoint returned {0}")]
    Status(u16),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        // Code is only visible at debug level.
        tracing::info!(to = %message.to, subject = %message.subject, "mail delivered to log");
        tracing::debug!(to = %message.to, text = %message.text, "mail body");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Debug, Serialize)]
struct OutboundMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        from: Option<String>,
    ) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
            from: from.unwrap_or_else(|| DEFAULT_FROM.to_string()),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let body = OutboundMail {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MailError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Pick the mailer for the configured endpoint; logs only when none is set.
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match &config.endpoint {
        Some(endpoint) => Ok(Arc::new(HttpMailer::new(
            endpoint,
            config.api_key.clone(),
            config.from.clone(),
        )?)),
        None => Ok(Arc::new(LogMailer)),
    }
}

/// Send `message` on a background task. Never blocks the caller.
pub fn dispatch(mailer: Arc<dyn Mailer>, message: MailMessage) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let to = message.to.clone();
        if let Err(err) = mailer.send(message).await {
            metrics::counter!("marketplace_mail_failures_total").increment(1);
            tracing::warn!(error = %err, mailer = mailer.name(), %to, "mail delivery failed");
        }
    })
}
