use axum::extract::{Json, State};
use axum::Extension;
use serde_json::json;

use auth_cell::handlers::{
    register, sign_in, sign_out, update_password, RegisterRequest, SignInRequest,
    UpdatePasswordRequest,
};
use shared_models::auth::SessionIdentity;
use shared_models::error::AppError;
use shared_utils::test_utils::{open_session, test_context, TEST_SECRET};
use shared_utils::token::validate_token;

fn register_request(username: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        password: password.to_string(),
        first_name: "Alex".to_string(),
        last_name: "Morgan".to_string(),
        is_physician: false,
    }
}

#[tokio::test]
async fn test_register_creates_user_and_session() {
    let ctx = test_context();

    let result = register(
        State(ctx.clone()),
        Json(register_request("alex", "s3cret-pass")),
    )
    .await;

    let response = result.unwrap().0;
    assert_eq!(response.username, "alex");
    assert_eq!(response.name, "Alex Morgan");
    assert!(!response.is_physician);

    // the issued token is bound to a live session row
    let claims = validate_token(&response.auth_token, TEST_SECRET).unwrap();
    assert!(ctx.store.sessions.find(claims.sid).await.unwrap().is_some());

    // stored password is hashed, never the plaintext
    let stored = ctx.store.users.find_by_username("alex").await.unwrap().unwrap();
    assert_ne!(stored.password_hash, "s3cret-pass");
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let ctx = test_context();

    // password below the minimum length
    let result = register(State(ctx.clone()), Json(register_request("alex", "short"))).await;
    match result.unwrap_err() {
        AppError::BadRequest(msg) => {
            assert_eq!(msg, "Invalid request. Bad input parameters.")
        }
        other => panic!("Expected BadRequest, got {other:?}"),
    }

    // blank username
    let result = register(State(ctx), Json(register_request("  ", "s3cret-pass"))).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_register_rejects_duplicate_username() {
    let ctx = test_context();

    register(
        State(ctx.clone()),
        Json(register_request("alex", "s3cret-pass")),
    )
    .await
    .unwrap();

    let result = register(
        State(ctx),
        Json(register_request("alex", "other-pass-9")),
    )
    .await;
    match result.unwrap_err() {
        AppError::BadRequest(msg) => {
            assert_eq!(msg, "Invalid request. User already exists.")
        }
        other => panic!("Expected BadRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sign_in_success() {
    let ctx = test_context();
    register(
        State(ctx.clone()),
        Json(register_request("alex", "s3cret-pass")),
    )
    .await
    .unwrap();

    let result = sign_in(
        State(ctx.clone()),
        Json(SignInRequest {
            username: "alex".to_string(),
            password: "s3cret-pass".to_string(),
        }),
    )
    .await;

    let response = result.unwrap().0;
    assert_eq!(response.username, "alex");
    let claims = validate_token(&response.auth_token, TEST_SECRET).unwrap();
    assert!(ctx.store.sessions.find(claims.sid).await.unwrap().is_some());
}

#[tokio::test]
async fn test_sign_in_uniform_rejection() {
    let ctx = test_context();
    register(
        State(ctx.clone()),
        Json(register_request("alex", "s3cret-pass")),
    )
    .await
    .unwrap();

    // wrong password and unknown username are indistinguishable
    let wrong_password = sign_in(
        State(ctx.clone()),
        Json(SignInRequest {
            username: "alex".to_string(),
            password: "wrong-pass-1".to_string(),
        }),
    )
    .await;
    let unknown_user = sign_in(
        State(ctx),
        Json(SignInRequest {
            username: "nobody".to_string(),
            password: "s3cret-pass".to_string(),
        }),
    )
    .await;

    for result in [wrong_password, unknown_user] {
        match result.unwrap_err() {
            AppError::BadRequest(msg) => {
                assert_eq!(msg, "Invalid username/password credentials.")
            }
            other => panic!("Expected BadRequest, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_sign_out_revokes_session() {
    let ctx = test_context();
    let (session, _) = open_session(&ctx.store, "alex").await;
    let identity = SessionIdentity {
        session_id: session.id,
        username: "alex".to_string(),
    };

    let result = sign_out(State(ctx.clone()), Extension(identity.clone())).await;
    assert_eq!(result.unwrap().0, json!({ "success": true }));
    assert!(ctx.store.sessions.find(session.id).await.unwrap().is_none());

    // signing out twice with the same session is still a success
    let result = sign_out(State(ctx), Extension(identity)).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_update_password() {
    let ctx = test_context();
    register(
        State(ctx.clone()),
        Json(register_request("alex", "s3cret-pass")),
    )
    .await
    .unwrap();
    let (session, _) = open_session(&ctx.store, "alex").await;
    let identity = SessionIdentity {
        session_id: session.id,
        username: "alex".to_string(),
    };

    // wrong current password is rejected
    let result = update_password(
        State(ctx.clone()),
        Extension(identity.clone()),
        Json(UpdatePasswordRequest {
            current_password: "wrong-pass-1".to_string(),
            new_password: "new-pass-123".to_string(),
        }),
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    // new password outside 8..=20 chars is rejected
    let result = update_password(
        State(ctx.clone()),
        Extension(identity.clone()),
        Json(UpdatePasswordRequest {
            current_password: "s3cret-pass".to_string(),
            new_password: "short".to_string(),
        }),
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    // correct current password succeeds, and the new one signs in
    update_password(
        State(ctx.clone()),
        Extension(identity),
        Json(UpdatePasswordRequest {
            current_password: "s3cret-pass".to_string(),
            new_password: "new-pass-123".to_string(),
        }),
    )
    .await
    .unwrap();

    let result = sign_in(
        State(ctx),
        Json(SignInRequest {
            username: "alex".to_string(),
            password: "new-pass-123".to_string(),
        }),
    )
    .await;
    assert!(result.is_ok());
}
