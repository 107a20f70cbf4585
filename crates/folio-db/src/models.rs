//! Database row types. These map directly to SQLite rows and stay
//! string-typed; `into_model` does the parsing into folio-types models.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use folio_types::models::{ContactRequest, User};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: String,
    pub created_at: String,
}

pub struct RequestRow {
    pub id: i64,
    pub created_at: String,
    pub user_id: String,
    pub from_user: String,
    pub plan: String,
    pub text: String,
    pub status: String,
    pub answer: Option<String>,
    pub viewed_by_user: String,
}

/// A request joined with its owner's profile columns.
pub struct RequestWithOwnerRow {
    pub request: RequestRow,
    pub owner_email: Option<String>,
    pub owner_name: Option<String>,
}

impl UserRow {
    pub fn into_model(self) -> Result<User> {
        Ok(User {
            id: self.id.parse().with_context(|| format!("corrupt user id '{}'", self.id))?,
            role: self.role.parse()?,
            created_at: parse_timestamp(&self.created_at)?,
            email: self.email,
            full_name: self.full_name,
        })
    }
}

impl RequestRow {
    pub fn into_model(self) -> Result<ContactRequest> {
        let user_id: Uuid = self
            .user_id
            .parse()
            .with_context(|| format!("corrupt user_id '{}' on request {}", self.user_id, self.id))?;

        Ok(ContactRequest {
            id: self.id,
            created_at: parse_timestamp(&self.created_at)?,
            user_id,
            from_user: self.from_user,
            plan: self.plan.parse()?,
            text: self.text,
            status: self.status.parse()?,
            answer: self.answer,
            viewed_by_user: self.viewed_by_user == "true",
        })
    }
}

/// Timestamps are written as RFC 3339. Rows created through the SQLite CLI
/// with `datetime('now')` come back as "YYYY-MM-DD HH:MM:SS" and are read
/// as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
