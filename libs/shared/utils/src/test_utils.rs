//! Shared helpers for the crate test suites: a canned config, memory-backed
//! contexts, and seed data for users, services, sessions and appointments.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::domain::{
    Appointment, AppointmentStatus, MedicalService, Session, UserRecord, UserRef,
};
use shared_store::{AppContext, Store};

use crate::token::issue_token;

pub const TEST_SECRET: &str = "test-secret-key-for-token-validation-must-be-long-enough";

pub fn test_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        token_secret: TEST_SECRET.to_string(),
        token_ttl_hours: 24,
        store_url: String::new(),
        store_api_key: String::new(),
        store_timeout_secs: 2,
    }
}

pub fn test_context() -> Arc<AppContext> {
    Arc::new(AppContext::new(test_config(), Store::memory()))
}

pub fn test_context_with(store: Store) -> Arc<AppContext> {
    Arc::new(AppContext::new(test_config(), store))
}

pub fn make_user(username: &str, first: &str, last: &str, is_physician: bool) -> UserRecord {
    UserRecord {
        id: Uuid::new_v4(),
        username: username.to_string(),
        // argon2 hash of "hunter2!", good enough for seeding
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2VlZHNhbHQ$u1JhrGqxYqdYeHhIcnFrWXNn/c0"
            .to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        is_physician,
    }
}

pub async fn seed_patient(store: &Store, username: &str) -> UserRecord {
    let user = make_user(username, "Pat", "Ent", false);
    store.users.insert(&user).await.unwrap();
    user
}

pub async fn seed_physician(store: &Store, username: &str) -> UserRecord {
    let user = make_user(username, "Doc", "Tor", true);
    store.users.insert(&user).await.unwrap();
    user
}

pub async fn seed_service(store: &Store, name: &str, rate: f64) -> MedicalService {
    let service = MedicalService {
        id: Uuid::new_v4(),
        name: name.to_string(),
        rate,
    };
    store.services.insert(&service).await.unwrap();
    service
}

/// Insert a session row and issue a matching token, the way register and
/// sign-in do.
pub async fn open_session(store: &Store, username: &str) -> (Session, String) {
    let session = Session {
        id: Uuid::new_v4(),
        username: username.to_string(),
        start_time: Utc::now(),
    };
    store.sessions.insert(&session).await.unwrap();
    let token = issue_token(session.id, username, TEST_SECRET, 24).unwrap();
    (session, token)
}

pub fn make_appointment(
    patient: &UserRecord,
    physician: &UserRecord,
    status: AppointmentStatus,
    start_time: DateTime<Utc>,
) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        title: "Consultation".to_string(),
        patient: patient.to_ref(),
        physician: physician.to_ref(),
        status,
        start_time,
        end_time: start_time + chrono::Duration::minutes(30),
        description: "seeded".to_string(),
        service_name: "General Checkup".to_string(),
        service_charge: 100.0,
        payment_balance: 100.0,
        conversation_thread_id: None,
    }
}

pub fn user_ref(username: &str, name: &str) -> UserRef {
    UserRef {
        id: Uuid::new_v4(),
        username: username.to_string(),
        name: name.to_string(),
    }
}
