use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::get,
    Extension, Router,
};
use tower::ServiceExt;

use shared_models::auth::SessionIdentity;
use shared_store::AppContext;
use shared_utils::extractor::auth_middleware;
use shared_utils::test_utils::{open_session, test_context};

/// One protected route that echoes the identity the gate attached.
fn app(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route(
            "/whoami",
            get(|Extension(identity): Extension<SessionIdentity>| async move {
                identity.username
            }),
        )
        .layer(middleware::from_fn_with_state(ctx.clone(), auth_middleware))
        .with_state(ctx)
}

fn request(auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/whoami");
    if let Some(value) = auth {
        builder = builder.header("Authorization", value);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn missing_or_malformed_headers_are_unauthorized() {
    let ctx = test_context();

    for auth in [None, Some("Basic abc"), Some("Bearer"), Some("token-without-scheme")] {
        let response = app(ctx.clone()).oneshot(request(auth)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn garbage_tokens_are_unauthorized() {
    let ctx = test_context();
    let response = app(ctx)
        .oneshot(request(Some("Bearer not.a.token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_token_passes_and_identity_is_attached() {
    let ctx = test_context();
    let (_, token) = open_session(&ctx.store, "casey").await;

    let response = app(ctx)
        .oneshot(request(Some(&format!("Bearer {token}"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"casey");
}

#[tokio::test]
async fn revoked_session_is_unauthorized_even_with_a_valid_token() {
    let ctx = test_context();
    let (session, token) = open_session(&ctx.store, "casey").await;

    // sign-out deletes the row; the signed token alone is no longer enough
    ctx.store.sessions.delete(session.id).await.unwrap();

    let response = app(ctx)
        .oneshot(request(Some(&format!("Bearer {token}"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
