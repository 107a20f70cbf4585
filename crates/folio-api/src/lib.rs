pub mod admin;
pub mod auth;
pub mod error;
pub mod middleware;
pub mod notifications;
pub mod requests;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::HeaderMap,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use folio_gateway::connection;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::{bearer_token, decode_token, require_auth, require_operator};

/// Full HTTP surface: sessions, requests, operator dashboard, email
/// functions and the change-feed gateway.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/gateway", get(gateway_upgrade));

    let protected_routes = Router::new()
        .route("/auth/session", get(auth::session))
        .route("/requests", get(requests::list_requests).post(requests::create_request))
        .route("/requests/{id}", axum::routing::delete(requests::delete_request))
        .route("/requests/{id}/view", post(requests::view_request))
        .route("/notifications/badge", get(requests::badge))
        .route(
            "/functions/send-admin-notification",
            post(notifications::send_admin_notification),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let operator_routes = Router::new()
        .route("/admin/requests", get(admin::list_requests))
        .route("/admin/requests/{id}/answer", post(admin::answer_request))
        .route("/admin/users", get(admin::list_users).delete(admin::delete_user))
        .route("/admin/stats", get(admin::user_stats))
        .route(
            "/functions/send-user-notification",
            post(notifications::send_user_notification),
        )
        .route_layer(from_fn(require_operator))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(operator_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

/// Browsers cannot set headers on a WebSocket handshake, so the token may
/// also come as `?token=`.
async fn gateway_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let token = query
        .token
        .as_deref()
        .or_else(|| bearer_token(&headers))
        .ok_or(ApiError::Unauthorized)?;
    let claims = decode_token(&state.jwt_secret, token)?;

    let dispatcher = state.dispatcher.clone();
    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, dispatcher, claims.sub, claims.email, claims.role)
    }))
}
