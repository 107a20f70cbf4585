use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use folio_db::models::format_timestamp;
use folio_notify::Submission;
use folio_types::api::{BadgeResponse, Claims, CreateRequestBody};
use folio_types::events::{ChangeKind, GatewayEvent};
use folio_types::lifecycle::{
    LifecycleError, check_delete, check_view, compose_text, sort_by_urgency,
};
use folio_types::models::ContactRequest;

use crate::auth::{AppState, with_db};
use crate::error::ApiError;

const MAX_TEXT_LEN: usize = 5000;

pub(crate) async fn load_request(state: &AppState, id: i64) -> Result<ContactRequest, ApiError> {
    with_db(state, move |db| db.get_request(id))
        .await?
        .ok_or(ApiError::NotFound("request"))?
        .into_model()
        .map_err(ApiError::from)
}

pub async fn create_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<CreateRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let subject_blank = body.subject.as_deref().is_some_and(|s| s.trim().is_empty());
    if body.text.trim().is_empty() || subject_blank {
        return Err(ApiError::validation("Please fill in all fields"));
    }

    let text = compose_text(body.subject.as_deref(), &body.text);
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(ApiError::validation(format!(
            "Request text is limited to {} characters",
            MAX_TEXT_LEN
        )));
    }

    let plan = body.plan;
    let user_id = claims.sub.to_string();
    let from_user = claims.email.clone();
    let created_at = format_timestamp(chrono::Utc::now());

    let request = with_db(&state, move |db| {
        let id = db.insert_request(&user_id, &from_user, plan.as_str(), &text, &created_at)?;
        db.get_request(id)?
            .ok_or_else(|| anyhow::anyhow!("request {} missing right after insert", id))?
            .into_model()
    })
    .await?;

    info!("Request {} ({}) created by {}", request.id, request.plan, claims.email);

    state.dispatcher.broadcast(GatewayEvent::RequestChanged {
        kind: ChangeKind::Insert,
        request_id: request.id,
        user_id: request.user_id,
    });

    // Only after the write: a lost email never costs the request
    state.notifier.spawn_notify_operator(Submission {
        user_email: claims.email,
        user_name: Some(claims.name),
        plan: request.plan.as_str().to_string(),
        text: request.text.clone(),
    });

    Ok((StatusCode::CREATED, Json(request)))
}

/// The caller's requests, most urgent first.
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let rows = with_db(&state, move |db| db.list_requests_for_user(&user_id)).await?;

    let mut requests = rows
        .into_iter()
        .map(|row| row.into_model())
        .collect::<anyhow::Result<Vec<_>>>()?;
    sort_by_urgency(&mut requests);

    Ok(Json(requests))
}

/// Owner opens an answer. Repeat opens change nothing.
pub async fn view_request(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let mut request = load_request(&state, id).await?;

    if check_view(&request, claims.sub)? {
        let user_id = claims.sub.to_string();
        let changed = with_db(&state, move |db| db.mark_viewed(id, &user_id)).await?;
        if changed {
            state.dispatcher.broadcast(GatewayEvent::RequestChanged {
                kind: ChangeKind::Update,
                request_id: id,
                user_id: claims.sub,
            });
        }
        request.viewed_by_user = true;
    }

    Ok(Json(request))
}

pub async fn delete_request(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let request = load_request(&state, id).await?;
    check_delete(&request, claims.sub)?;

    let user_id = claims.sub.to_string();
    let deleted = with_db(&state, move |db| db.delete_pending_request(id, &user_id)).await?;
    if !deleted {
        // Answered between the read and the delete
        return Err(LifecycleError::NotPending.into());
    }

    info!("Request {} deleted by {}", id, claims.email);

    state.dispatcher.broadcast(GatewayEvent::RequestChanged {
        kind: ChangeKind::Delete,
        request_id: id,
        user_id: claims.sub,
    });

    Ok(StatusCode::NO_CONTENT)
}

/// Pending requests for the operator, unread answers for everyone else.
pub async fn badge(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let count = if claims.is_operator() {
        with_db(&state, |db| db.count_pending()).await?
    } else {
        let user_id = claims.sub.to_string();
        with_db(&state, move |db| db.count_unviewed_answers(&user_id)).await?
    };

    Ok(Json(BadgeResponse {
        has_new: count > 0,
        count,
    }))
}
