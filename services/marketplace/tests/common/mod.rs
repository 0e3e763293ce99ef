#![allow(dead_code)]

use async_trait::async_trait;
use marketplace::app::{AppState, build_router};
use marketplace::auth::token::JwtVerifier;
use marketplace::config::AuthConfig;
use marketplace::mail::{MailError, MailMessage, Mailer};
use marketplace::store::memory::InMemoryStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_SECRET: &str = "marketplace-test-secret";

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().expect("lock").clone()
    }

    /// Wait for the background dispatch task to deliver `count` messages.
    pub async fn wait_for(&self, count: usize) -> Vec<MailMessage> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} mail messages, got {}", self.sent().len());
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        self.sent.lock().expect("lock").push(message);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub struct TestApp {
    pub app: axum::routing::RouterIntoService<axum::body::Body, ()>,
    pub store: Arc<InMemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    verifier: JwtVerifier,
}

impl TestApp {
    pub fn new() -> Self {
        let auth = AuthConfig {
            jwt_secret: TEST_SECRET.to_string(),
            issuer: None,
            audience: None,
            leeway_secs: 0,
        };
        let verifier = JwtVerifier::new(&auth);
        let store = Arc::new(InMemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState {
            api_version: "v1".to_string(),
            store: store.clone(),
            token_verifier: Arc::new(verifier.clone()),
            mailer: mailer.clone(),
            superpass_ttl: chrono::Duration::seconds(30),
            superpass_recipient: "admin@example.com".to_string(),
        };
        Self {
            app: build_router(state).into_service(),
            store,
            mailer,
            verifier,
        }
    }

    fn mint(&self, sub: &str, role: Option<&str>, branch_code: Option<&str>) -> String {
        self.verifier
            .mint(
                sub,
                Some(&format!("{sub}@example.com")),
                role,
                branch_code,
                Duration::from_secs(300),
            )
            .expect("mint token")
    }

    pub fn user_token(&self, user_id: &str) -> String {
        self.mint(user_id, None, None)
    }

    pub fn branch_token(&self, branch_code: &str) -> String {
        self.mint(&format!("owner-{branch_code}"), None, Some(branch_code))
    }

    pub fn admin_token(&self) -> String {
        self.mint("admin-1", Some("admin"), None)
    }
}
