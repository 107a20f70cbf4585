use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseTagError {
    pub kind: &'static str,
    pub value: String,
}

/// Service tier a request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Info,
    Frontend,
    FrontendModern,
    Fullstack,
    FullstackModern,
}

impl Plan {
    pub const ALL: [Plan; 5] = [
        Plan::Info,
        Plan::Frontend,
        Plan::FrontendModern,
        Plan::Fullstack,
        Plan::FullstackModern,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Info => "info",
            Plan::Frontend => "frontend",
            Plan::FrontendModern => "frontend_modern",
            Plan::Fullstack => "fullstack",
            Plan::FullstackModern => "fullstack_modern",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Plan::Info => "Information",
            Plan::Frontend => "Website",
            Plan::FrontendModern => "Advanced Website",
            Plan::Fullstack => "Web App",
            Plan::FullstackModern => "Advanced Web App",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Plan::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParseTagError { kind: "plan", value: s.to_string() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Answered,
    /// Part of the stored vocabulary; nothing transitions into it yet.
    Closed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Answered => "answered",
            RequestStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "answered" => Ok(RequestStatus::Answered),
            "closed" => Ok(RequestStatus::Closed),
            other => Err(ParseTagError { kind: "status", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Operator => "operator",
        }
    }
}

impl FromStr for Role {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "operator" => Ok(Role::Operator),
            other => Err(ParseTagError { kind: "role", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// A contact request as seen by its owner and the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub from_user: String,
    pub plan: Plan,
    pub text: String,
    pub status: RequestStatus,
    pub answer: Option<String>,
    pub viewed_by_user: bool,
}
