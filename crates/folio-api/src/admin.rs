use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use folio_types::api::{
    AdminRequestList, AdminRequestView, AnswerRequestBody, Claims, DeleteUserBody, OwnerProfile,
    SuccessResponse, UserStats,
};
use folio_types::events::{ChangeKind, GatewayEvent};
use folio_types::lifecycle::{LifecycleError, check_answer, sign_answer, urgency_key};
use folio_types::models::{Plan, RequestStatus, User};

use crate::auth::{AppState, with_db};
use crate::error::ApiError;
use crate::requests::load_request;

/// How many recent signups the stats panel shows.
const LAST_SIGNUPS: usize = 5;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Answered,
}

#[derive(Debug, Deserialize)]
pub struct AdminRequestQuery {
    #[serde(default)]
    pub status: StatusFilter,
    /// A plan tag, or "all"
    pub plan: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserSort {
    #[default]
    Newest,
    Oldest,
    Name,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub sort: UserSort,
}

/// Every request with its owner's profile, filtered, most urgent first.
pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<AdminRequestQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = match query.plan.as_deref() {
        None | Some("all") => None,
        Some(tag) => Some(
            tag.parse::<Plan>()
                .map_err(|e| ApiError::validation(e.to_string()))?,
        ),
    };

    let rows = with_db(&state, |db| db.list_requests_with_owners()).await?;

    let mut views = rows
        .into_iter()
        .map(|row| -> anyhow::Result<AdminRequestView> {
            let request = row.request.into_model()?;
            Ok(AdminRequestView {
                profile: OwnerProfile {
                    id: request.user_id,
                    email: row.owner_email,
                    full_name: row.owner_name,
                },
                request,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let pending_count = views
        .iter()
        .filter(|v| v.request.status == RequestStatus::Pending)
        .count();

    views.retain(|v| {
        let status_ok = match query.status {
            StatusFilter::All => true,
            StatusFilter::Pending => v.request.status == RequestStatus::Pending,
            StatusFilter::Answered => v.request.status == RequestStatus::Answered,
        };
        status_ok && plan.is_none_or(|p| v.request.plan == p)
    });
    views.sort_by_key(|v| urgency_key(&v.request));

    Ok(Json(AdminRequestList {
        pending_count,
        requests: views,
    }))
}

/// pending -> answered. The answer is signed, stored, and mailed to the
/// owner once the store has accepted it.
pub async fn answer_request(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<AnswerRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let current = load_request(&state, id).await?;
    check_answer(&current, &body.answer)?;

    let signed = sign_answer(&body.answer, &state.operator.signature());
    let owner_id = current.user_id.to_string();
    let stored = signed.clone();

    let outcome = with_db(&state, move |db| {
        // Conditional on still being pending; a concurrent answer wins
        if !db.answer_request(id, &stored)? {
            return Ok(None);
        }
        let owner_email = db.get_user_by_id(&owner_id)?.map(|u| u.email);
        let request = db
            .get_request(id)?
            .ok_or_else(|| anyhow::anyhow!("request {} missing right after answer", id))?
            .into_model()?;
        Ok(Some((request, owner_email)))
    })
    .await?;

    let Some((request, owner_email)) = outcome else {
        return Err(LifecycleError::NotPending.into());
    };

    info!("Request {} answered by {}", id, claims.email);

    state.dispatcher.broadcast(GatewayEvent::RequestChanged {
        kind: ChangeKind::Update,
        request_id: id,
        user_id: request.user_id,
    });

    let recipient = owner_email.unwrap_or_else(|| request.from_user.clone());
    state.notifier.spawn_notify_user(recipient, signed);

    Ok(Json(request))
}

async fn load_users(state: &AppState) -> Result<Vec<User>, ApiError> {
    let rows = with_db(state, |db| db.list_users()).await?;
    let users = rows
        .into_iter()
        .map(|row| row.into_model())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(users)
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut users = load_users(&state).await?;

    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let term = term.to_lowercase();
        users.retain(|u| {
            u.full_name.to_lowercase().contains(&term) || u.email.to_lowercase().contains(&term)
        });
    }

    match query.sort {
        UserSort::Newest => users.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        UserSort::Oldest => users.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        UserSort::Name => users.sort_by_cached_key(|u| {
            if u.full_name.is_empty() { u.email.to_lowercase() } else { u.full_name.to_lowercase() }
        }),
    }

    Ok(Json(users))
}

/// Removes an account and, with it, the account's requests.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<DeleteUserBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.user_id == claims.sub {
        return Err(ApiError::Conflict("The operator account cannot delete itself".into()));
    }

    let user_id = body.user_id.to_string();
    let (deleted, request_ids) = with_db(&state, move |db| {
        let request_ids = db.request_ids_for_user(&user_id)?;
        let deleted = db.delete_user(&user_id)?;
        Ok((deleted, request_ids))
    })
    .await?;

    if !deleted {
        return Err(ApiError::NotFound("user"));
    }

    info!(
        "User {} deleted by {} ({} requests removed)",
        body.user_id,
        claims.email,
        request_ids.len()
    );

    for request_id in request_ids {
        state.dispatcher.broadcast(GatewayEvent::RequestChanged {
            kind: ChangeKind::Delete,
            request_id,
            user_id: body.user_id,
        });
    }

    Ok(Json(SuccessResponse { success: true }))
}

pub async fn user_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = load_users(&state).await?;

    let mut signups_by_date: BTreeMap<String, usize> = BTreeMap::new();
    for user in &users {
        *signups_by_date
            .entry(user.created_at.format("%Y-%m-%d").to_string())
            .or_default() += 1;
    }

    Ok(Json(UserStats {
        total_users: users.len(),
        last_signups: users.into_iter().take(LAST_SIGNUPS).collect(),
        signups_by_date,
    }))
}
