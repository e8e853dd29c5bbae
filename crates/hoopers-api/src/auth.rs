use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use hoopers_db::Database;
use hoopers_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    UsernameAvailableQuery, UsernameAvailableResponse,
};

use crate::error::ApiError;
use crate::middleware;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub media_base_url: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::BadRequest(
            "username must be 3-32 characters".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("argon2: {e}")))?
        .to_string();

    let user_id = Uuid::new_v4();
    let display_name = req.display_name.as_deref().unwrap_or(&req.username);

    // Taken usernames surface as a conflict from the unique index.
    state
        .db
        .create_user(user_id, &req.username, &password_hash, display_name)?;

    let token = create_token(&state.jwt_secret, user_id, &req.username)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_username(&req.username)?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unreadable: {e}")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let token = create_token(&state.jwt_secret, user.id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        token,
    }))
}

pub async fn username_available(
    State(state): State<AppState>,
    Query(query): Query<UsernameAvailableQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let available = state.db.username_available(&query.username)?;
    Ok(Json(UsernameAvailableResponse {
        username: query.username,
        available,
    }))
}

/// Deleting the account takes every owned row with it; the DB-side cascade
/// fan-out covers posts, invites, orders and the rest.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(claims): Extension<middleware::Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.delete_account(claims.sub)?;
    Ok(StatusCode::NO_CONTENT)
}

fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
