use std::sync::Arc;

use axum::{
    extract::{Json, State},
    Extension,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::auth::{SessionIdentity, SignInResponse};
use shared_models::domain::UserRecord;
use shared_models::error::AppError;
use shared_store::AppContext;

use crate::services::password::{hash_secret, verify_secret};
use crate::services::session::SessionService;

const MSG_BAD_INPUT: &str = "Invalid request. Bad input parameters.";
const MSG_BAD_CREDENTIALS: &str = "Invalid username/password credentials.";
const MSG_USER_EXISTS: &str = "Invalid request. User already exists.";

const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub is_physician: bool,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

fn password_acceptable(password: &str) -> bool {
    (PASSWORD_MIN..=PASSWORD_MAX).contains(&password.len())
}

fn sign_in_response(user: &UserRecord, token: String) -> SignInResponse {
    SignInResponse {
        auth_token: token,
        id: user.id,
        username: user.username.clone(),
        name: user.full_name(),
        is_physician: user.is_physician,
    }
}

pub async fn register(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<SignInResponse>, AppError> {
    debug!("Registering user: {}", req.username);

    if req.username.trim().is_empty()
        || req.first_name.trim().is_empty()
        || req.last_name.trim().is_empty()
        || !password_acceptable(&req.password)
    {
        return Err(AppError::BadRequest(MSG_BAD_INPUT.to_string()));
    }

    if ctx
        .store
        .users
        .find_by_username(&req.username)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(MSG_USER_EXISTS.to_string()));
    }

    let user = UserRecord {
        id: Uuid::new_v4(),
        username: req.username.clone(),
        password_hash: hash_secret(&req.password)?,
        first_name: req.first_name,
        last_name: req.last_name,
        is_physician: req.is_physician,
    };
    ctx.store.users.insert(&user).await?;

    let sessions = SessionService::new(
        ctx.store.clone(),
        &ctx.config.token_secret,
        ctx.config.token_ttl_hours,
    );
    let (_, token) = sessions.open(&user.username).await?;

    info!("Registered user: {}", user.username);
    Ok(Json(sign_in_response(&user, token)))
}

/// A wrong username and a wrong password produce the same rejection, so the
/// response never reveals which usernames exist.
pub async fn sign_in(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, AppError> {
    debug!("Sign-in attempt: {}", req.username);

    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(MSG_BAD_INPUT.to_string()));
    }

    let user = ctx
        .store
        .users
        .find_by_username(&req.username)
        .await?
        .ok_or_else(|| AppError::BadRequest(MSG_BAD_CREDENTIALS.to_string()))?;

    if !verify_secret(&req.password, &user.password_hash) {
        return Err(AppError::BadRequest(MSG_BAD_CREDENTIALS.to_string()));
    }

    let sessions = SessionService::new(
        ctx.store.clone(),
        &ctx.config.token_secret,
        ctx.config.token_ttl_hours,
    );
    let (_, token) = sessions.open(&user.username).await?;

    info!("User signed in: {}", user.username);
    Ok(Json(sign_in_response(&user, token)))
}

pub async fn sign_out(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
) -> Result<Json<serde_json::Value>, AppError> {
    debug!("Sign-out: {}", identity.username);

    let sessions = SessionService::new(
        ctx.store.clone(),
        &ctx.config.token_secret,
        ctx.config.token_ttl_hours,
    );
    sessions.revoke(identity.session_id).await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn update_password(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    debug!("Password update: {}", identity.username);

    if !password_acceptable(&req.new_password) {
        return Err(AppError::BadRequest(MSG_BAD_INPUT.to_string()));
    }

    let user = ctx
        .store
        .users
        .find_by_username(&identity.username)
        .await?
        .ok_or_else(|| AppError::BadRequest(MSG_BAD_CREDENTIALS.to_string()))?;

    if !verify_secret(&req.current_password, &user.password_hash) {
        return Err(AppError::BadRequest(MSG_BAD_CREDENTIALS.to_string()));
    }

    let new_hash = hash_secret(&req.new_password)?;
    ctx.store
        .users
        .update_password(&user.username, &new_hash)
        .await?;

    info!("Password updated: {}", user.username);
    Ok(Json(json!({ "success": true })))
}
