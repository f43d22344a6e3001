use chrono::Utc;
use uuid::Uuid;

use shared_models::domain::Session;
use shared_models::error::AppError;
use shared_store::Store;
use shared_utils::token::issue_token;

/// Owns the session lifecycle: a row in the session store is the source of
/// truth, and the signed token is just a portable reference to it. Deleting
/// the row revokes every copy of the token at once.
pub struct SessionService {
    store: Store,
    secret: String,
    ttl_hours: i64,
}

impl SessionService {
    pub fn new(store: Store, secret: &str, ttl_hours: i64) -> Self {
        Self {
            store,
            secret: secret.to_string(),
            ttl_hours,
        }
    }

    /// Open a new session for `username` and issue the matching token.
    pub async fn open(&self, username: &str) -> Result<(Session, String), AppError> {
        let session = Session {
            id: Uuid::new_v4(),
            username: username.to_string(),
            start_time: Utc::now(),
        };
        self.store.sessions.insert(&session).await?;

        let token = issue_token(session.id, username, &self.secret, self.ttl_hours)
            .map_err(AppError::Internal)?;
        Ok((session, token))
    }

    /// Delete the session row. Deleting an already-revoked session is a no-op,
    /// so repeated sign-outs with a stale token succeed quietly.
    pub async fn revoke(&self, session_id: Uuid) -> Result<(), AppError> {
        self.store.sessions.delete(session_id).await?;
        Ok(())
    }
}
