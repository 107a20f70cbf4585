#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use folio_api::auth::{AppState, AppStateInner, OperatorIdentity};
use folio_api::middleware::create_token;
use folio_db::Database;
use folio_db::models::format_timestamp;
use folio_gateway::dispatcher::Dispatcher;
use folio_notify::{Email, EmailTransport, Notifier};
use folio_types::models::{Role, User};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const OPERATOR_EMAIL: &str = "ops@example.com";
pub const OPERATOR_NAME: &str = "Ada Operator";

/// Records outgoing email; can be switched to fail every send.
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<Email>>,
    pub fail: AtomicBool,
}

impl Outbox {
    pub fn emails(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    /// Notifications are spawned, so give them a moment to land.
    pub async fn wait_for(&self, count: usize) -> Vec<Email> {
        for _ in 0..100 {
            let emails = self.emails();
            if emails.len() >= count {
                return emails;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {} emails, got {:?}", count, self.emails());
    }
}

#[async_trait]
impl EmailTransport for Outbox {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("email API returned 503");
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub outbox: Arc<Outbox>,
}

pub fn spawn_app() -> TestApp {
    let outbox = Arc::new(Outbox::default());
    let operator = OperatorIdentity::new(OPERATOR_EMAIL, OPERATOR_NAME);
    let notifier = Notifier::new(outbox.clone(), operator.email.clone(), operator.name.clone());

    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().expect("in-memory database"),
        jwt_secret: JWT_SECRET.to_string(),
        dispatcher: Dispatcher::new(),
        notifier,
        operator,
    });

    TestApp {
        router: folio_api::router(state.clone()),
        state,
        outbox,
    }
}

impl TestApp {
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    /// Insert an account directly (no password hashing) and return a token.
    pub fn seed_user_at(&self, email: &str, name: &str, created_at: DateTime<Utc>) -> (Uuid, String) {
        let role = if email == OPERATOR_EMAIL { Role::Operator } else { Role::User };
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: name.to_string(),
            role,
            created_at,
        };
        self.state
            .db
            .create_user(
                &user.id.to_string(),
                &user.email,
                &user.full_name,
                "not-a-real-hash",
                role.as_str(),
                &format_timestamp(created_at),
            )
            .unwrap();
        let token = create_token(JWT_SECRET, &user).unwrap();
        (user.id, token)
    }

    pub fn seed_user(&self, email: &str, name: &str) -> (Uuid, String) {
        self.seed_user_at(email, name, Utc::now())
    }

    pub fn seed_operator(&self) -> (Uuid, String) {
        self.seed_user(OPERATOR_EMAIL, OPERATOR_NAME)
    }

    pub async fn submit(&self, token: &str, plan: &str, text: &str) -> Value {
        let (status, body) = self
            .call(
                "POST",
                "/requests",
                Some(token),
                Some(serde_json::json!({ "plan": plan, "text": text })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }
}
