use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_store::AppContext;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Register and sign-in are the only routes reachable without a session;
/// everything else sits behind the session gate.
pub fn auth_routes(state: Arc<AppContext>) -> Router {
    let public_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/signin", post(handlers::sign_in));

    let protected_routes = Router::new()
        .route("/signout", get(handlers::sign_out))
        .route("/password", put(handlers::update_password))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
