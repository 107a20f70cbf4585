//! The two email functions, callable directly by clients. The request
//! handlers use the same `Notifier` in-process.

use axum::{Json, extract::State, response::IntoResponse};

use folio_notify::Submission;
use folio_types::api::{AdminNotificationBody, SuccessResponse, UserNotificationBody};

use crate::auth::{AppState, is_valid_email, normalize_email};
use crate::error::ApiError;

/// Tell the operator about a submission.
pub async fn send_admin_notification(
    State(state): State<AppState>,
    Json(body): Json<AdminNotificationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user_email = normalize_email(&body.user_email);
    if !is_valid_email(&user_email) || body.text.trim().is_empty() || body.plan.trim().is_empty() {
        return Err(ApiError::validation("userEmail, plan and text are required"));
    }

    let submission = Submission {
        user_email,
        user_name: body.user_name,
        plan: body.plan,
        text: body.text,
    };
    state
        .notifier
        .notify_operator(&submission)
        .await
        .map_err(|e| ApiError::Notification(format!("{:#}", e)))?;

    Ok(Json(SuccessResponse { success: true }))
}

/// Mail an answer to a user. Operator only.
pub async fn send_user_notification(
    State(state): State<AppState>,
    Json(body): Json<UserNotificationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user_email = normalize_email(&body.user_email);
    if !is_valid_email(&user_email) || body.answer.trim().is_empty() {
        return Err(ApiError::validation("userEmail and answer are required"));
    }

    state
        .notifier
        .notify_user(&user_email, &body.answer)
        .await
        .map_err(|e| ApiError::Notification(format!("{:#}", e)))?;

    Ok(Json(SuccessResponse { success: true }))
}
