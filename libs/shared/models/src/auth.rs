use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

/// Claims embedded in a session token: the session row id, the username,
/// and the issue/expiry timestamps (unix seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sid: Uuid,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// The identity attached to a request once the gate has admitted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub session_id: Uuid,
    pub username: String,
}

/// Body returned by register and signin.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub auth_token: String,
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub is_physician: bool,
}
