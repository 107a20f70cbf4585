use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::email::Email;

/// Something that can hand an email to a delivery service.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

/// Posts `{to, subject, content}` as JSON to a transactional email API.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl EmailTransport for HttpTransport {
    async fn send(&self, email: &Email) -> Result<()> {
        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
            .context("email API unreachable")?
            .error_for_status()
            .context("Failed to send email")?;

        info!("Email '{}' sent to {}", email.subject, email.to);
        Ok(())
    }
}

/// Writes emails to the log instead of delivering them. Used when no email
/// API is configured.
pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send(&self, email: &Email) -> Result<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            "Email delivery disabled, message follows:\n{}",
            email.content
        );
        Ok(())
    }
}
