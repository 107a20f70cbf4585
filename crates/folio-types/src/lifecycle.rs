//! Transition rules for contact requests.
//!
//! `pending` moves to `answered` once the operator replies; the owner may
//! mark the answer as viewed, or delete the request while it is still
//! pending. Storage applies the same conditions in its `WHERE` clauses, so
//! these checks decide the error a caller sees rather than guarding the data.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ContactRequest, RequestStatus};

/// Separator placed between an answer and the operator's signature.
pub const SIGNATURE_SEPARATOR: &str = "\n\n---\n";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("request is no longer pending")]
    NotPending,

    #[error("request has not been answered yet")]
    NotAnswered,

    #[error("answer must not be empty")]
    EmptyAnswer,

    #[error("request belongs to another user")]
    NotOwner,
}

/// Signature block appended to every answer.
pub fn signature_block(operator_name: &str, operator_email: &str) -> String {
    format!("Best regards,\n{}\n{}", operator_name, operator_email)
}

/// The answer is stored as written; only emptiness is judged on the trimmed
/// text (see `check_answer`).
pub fn sign_answer(answer: &str, signature: &str) -> String {
    format!("{}{}{}", answer, SIGNATURE_SEPARATOR, signature)
}

/// Body stored for a new request. A subject, when given, is kept as the
/// first paragraph. Both parts are stored exactly as submitted.
pub fn compose_text(subject: Option<&str>, message: &str) -> String {
    match subject.filter(|s| !s.trim().is_empty()) {
        Some(subject) => format!("{}\n\n{}", subject, message),
        None => message.to_string(),
    }
}

pub fn check_answer(request: &ContactRequest, answer: &str) -> Result<(), LifecycleError> {
    if request.status != RequestStatus::Pending {
        return Err(LifecycleError::NotPending);
    }
    if answer.trim().is_empty() {
        return Err(LifecycleError::EmptyAnswer);
    }
    Ok(())
}

pub fn check_delete(request: &ContactRequest, user_id: Uuid) -> Result<(), LifecycleError> {
    if request.user_id != user_id {
        return Err(LifecycleError::NotOwner);
    }
    if request.status != RequestStatus::Pending {
        return Err(LifecycleError::NotPending);
    }
    Ok(())
}

/// Returns whether opening the answer changes anything. An already viewed
/// answer is `Ok(false)`.
pub fn check_view(request: &ContactRequest, user_id: Uuid) -> Result<bool, LifecycleError> {
    if request.user_id != user_id {
        return Err(LifecycleError::NotOwner);
    }
    if request.status != RequestStatus::Answered {
        return Err(LifecycleError::NotAnswered);
    }
    Ok(!request.viewed_by_user)
}

/// Lower is more urgent.
pub fn urgency(request: &ContactRequest) -> u8 {
    match (request.status, request.viewed_by_user) {
        (RequestStatus::Pending, _) => 0,
        (RequestStatus::Answered, false) => 1,
        (RequestStatus::Answered, true) => 2,
        (RequestStatus::Closed, _) => 3,
    }
}

/// Sort key: most urgent first, newest first inside a group.
pub fn urgency_key(request: &ContactRequest) -> (u8, Reverse<DateTime<Utc>>, Reverse<i64>) {
    (urgency(request), Reverse(request.created_at), Reverse(request.id))
}

pub fn sort_by_urgency(requests: &mut [ContactRequest]) {
    requests.sort_by_key(urgency_key);
}
