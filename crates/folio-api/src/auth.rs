use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};
use uuid::Uuid;

use folio_db::{Database, is_constraint_violation};
use folio_db::models::format_timestamp;
use folio_gateway::dispatcher::Dispatcher;
use folio_notify::Notifier;
use folio_types::api::{Claims, LoginRequest, RegisterRequest, SessionInfo, SessionResponse};
use folio_types::lifecycle::signature_block;
use folio_types::models::{Role, User};

use crate::error::ApiError;
use crate::middleware::create_token;

const MIN_PASSWORD_LEN: usize = 6;
const MAX_NAME_LEN: usize = 100;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub notifier: Notifier,
    pub operator: OperatorIdentity,
}

/// The account that answers requests and signs the answers.
#[derive(Debug, Clone)]
pub struct OperatorIdentity {
    pub email: String,
    pub name: String,
}

impl OperatorIdentity {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            email: normalize_email(email),
            name: name.trim().to_string(),
        }
    }

    pub fn signature(&self) -> String {
        signature_block(&self.name, &self.email)
    }

    fn role_for(&self, email: &str) -> Role {
        if email == self.email { Role::Operator } else { Role::User }
    }
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("database task failed"))
        })?
        .map_err(ApiError::from)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape check only: one `@`, something before it, a dotted domain after.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
        }
        None => false,
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Please enter a valid email address"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let full_name = req.full_name.trim().to_string();
    if full_name.is_empty() || full_name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::validation("Name is required"));
    }

    // Check if email is taken
    let lookup = email.clone();
    if with_db(&state, move |db| db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::Conflict("Email is already registered".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user = User {
        id: Uuid::new_v4(),
        role: state.operator.role_for(&email),
        email,
        full_name,
        created_at: chrono::Utc::now(),
    };

    let row = user.clone();
    let created = with_db(&state, move |db| {
        let result = db.create_user(
            &row.id.to_string(),
            &row.email,
            &row.full_name,
            &password_hash,
            row.role.as_str(),
            &format_timestamp(row.created_at),
        );
        // A concurrent registration can take the email after the check above
        match result {
            Ok(()) => Ok(true),
            Err(e) if is_constraint_violation(&e) => Ok(false),
            Err(e) => Err(e),
        }
    })
    .await?;
    if !created {
        return Err(ApiError::Conflict("Email is already registered".into()));
    }

    info!("Registered {} ({}) as {}", user.email, user.id, user.role.as_str());

    let token = create_token(&state.jwt_secret, &user)?;

    Ok((StatusCode::CREATED, Json(session_response(user, token))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    let row = with_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    {
        let parsed_hash = PasswordHash::new(&row.password)
            .map_err(|e| anyhow::anyhow!("stored hash for {} is corrupt: {}", row.id, e))?;

        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized)?;
    }

    let user = row.into_model()?;
    let token = create_token(&state.jwt_secret, &user)?;

    Ok(Json(session_response(user, token)))
}

/// Current session, re-read from the store so a deleted account stops
/// resolving even while its token is unexpired.
pub async fn session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    let user = with_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or(ApiError::Unauthorized)?
        .into_model()?;

    Ok(Json(SessionInfo {
        user_id: user.id,
        email: user.email,
        full_name: user.full_name,
        role: user.role,
    }))
}

fn session_response(user: User, token: String) -> SessionResponse {
    SessionResponse {
        user_id: user.id,
        email: user.email,
        full_name: user.full_name,
        role: user.role,
        token,
    }
}
