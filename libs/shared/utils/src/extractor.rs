use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_models::auth::SessionIdentity;
use shared_models::error::{AppError, AuthError};
use shared_store::AppContext;

use crate::token::validate_token;

/// The session gate. Public bootstrap routes (register, sign-in) are wired
/// outside this layer and never reach it; everything behind it requires a
/// valid Bearer token bound to a still-existing session row.
pub async fn auth_middleware(
    State(ctx): State<Arc<AppContext>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or(AuthError::MissingToken)?;

    let auth_value = auth_header.to_str().map_err(|_| AuthError::MissingToken)?;
    if !auth_value.starts_with("Bearer ") {
        return Err(AuthError::MissingToken.into());
    }
    let token = &auth_value["Bearer ".len()..];

    let claims = validate_token(token, &ctx.config.token_secret)
        .map_err(AuthError::InvalidToken)?;

    // A deleted session row means the token was revoked by sign-out.
    let session = ctx
        .store
        .sessions
        .find(claims.sid)
        .await?
        .ok_or(AuthError::SessionRevoked)?;

    let identity = SessionIdentity {
        session_id: session.id,
        username: claims.sub,
    };
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
