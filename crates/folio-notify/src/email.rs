use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use folio_types::models::Plan;

use crate::transport::EmailTransport;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub content: String,
}

/// What the operator is told about a new request.
#[derive(Debug, Clone)]
pub struct Submission {
    pub user_email: String,
    pub user_name: Option<String>,
    pub plan: String,
    pub text: String,
}

/// Formats and sends the two transactional emails: new request (to the
/// operator) and new answer (to the request owner).
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn EmailTransport>,
    operator_email: String,
    operator_name: String,
}

impl Notifier {
    pub fn new(
        transport: Arc<dyn EmailTransport>,
        operator_email: impl Into<String>,
        operator_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            operator_email: operator_email.into(),
            operator_name: operator_name.into(),
        }
    }

    pub fn submission_email(&self, submission: &Submission) -> Email {
        let name = submission
            .user_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Unknown");
        let plan = submission
            .plan
            .parse::<Plan>()
            .map(|p| p.display_name().to_string())
            .unwrap_or_else(|_| submission.plan.clone());

        Email {
            to: self.operator_email.clone(),
            subject: "New request received".to_string(),
            content: format!(
                "New request from {} ({})\nPlan: {}\nMessage: {}",
                name, submission.user_email, plan, submission.text
            ),
        }
    }

    pub fn answer_email(&self, to: &str, answer: &str) -> Email {
        Email {
            to: to.to_string(),
            subject: "Reply to your request".to_string(),
            content: format!(
                "I have replied to your request:\n{}\n\nThanks for getting in touch!\n{}",
                answer, self.operator_name
            ),
        }
    }

    pub async fn notify_operator(&self, submission: &Submission) -> Result<()> {
        self.transport.send(&self.submission_email(submission)).await
    }

    pub async fn notify_user(&self, to: &str, answer: &str) -> Result<()> {
        self.transport.send(&self.answer_email(to, answer)).await
    }

    /// Fire-and-forget: failures are logged and dropped.
    pub fn spawn_notify_operator(&self, submission: Submission) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_operator(&submission).await {
                warn!("Operator notification for {} failed: {:#}", submission.user_email, e);
            }
        });
    }

    /// Fire-and-forget: failures are logged and dropped.
    pub fn spawn_notify_user(&self, to: String, answer: String) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_user(&to, &answer).await {
                warn!("Answer notification to {} failed: {:#}", to, e);
            }
        });
    }
}
