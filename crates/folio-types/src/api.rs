use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ContactRequest, Plan, Role, User};

// -- JWT Claims --

/// Session claims shared by the REST middleware and the gateway upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

// -- Requests --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRequestBody {
    pub plan: Plan,
    #[serde(default)]
    pub subject: Option<String>,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnswerRequestBody {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRequestView {
    #[serde(flatten)]
    pub request: ContactRequest,
    pub profile: OwnerProfile,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminRequestList {
    pub pending_count: usize,
    pub requests: Vec<AdminRequestView>,
}

/// Unread indicator for the profile menu.
#[derive(Debug, Serialize, Deserialize)]
pub struct BadgeResponse {
    pub has_new: bool,
    pub count: usize,
}

// -- Users --

#[derive(Debug, Deserialize)]
pub struct DeleteUserBody {
    #[serde(alias = "userId")]
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserStats {
    pub total_users: usize,
    pub last_signups: Vec<User>,
    /// `YYYY-MM-DD` -> signups that day.
    pub signups_by_date: BTreeMap<String, usize>,
}

// -- Notification functions --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminNotificationBody {
    pub user_email: String,
    #[serde(default)]
    pub user_name: Option<String>,
    pub plan: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNotificationBody {
    pub user_email: String,
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}
