//! Repository seam over the independently-writable collections.
//!
//! Every collection is its own store; there is no cross-collection
//! transaction anywhere. The services that need multi-record consistency
//! (the creation saga, the cascade deleter) build it on top of these
//! single-collection operations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::domain::{
    Appointment, AppointmentStatus, ConversationThread, LabReport, MedicalService, Medication,
    Note, Payment, Session, UserRecord,
};
use shared_models::error::StoreError;

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

// ==============================================================================
// QUERY TYPES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppointmentView {
    #[default]
    All,
    /// In progress right now: startTime <= now < endTime and not Done.
    Waiting,
    /// Completed appointments, the ones payments are settled against.
    Payments,
}

/// Participant-scoped appointment listing. `limit == 0` means unbounded.
#[derive(Debug, Clone, Default)]
pub struct AppointmentQuery {
    pub username: String,
    pub view: AppointmentView,
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

/// Partial appointment update. Only the mutable fields appear here; identity
/// fields are rejected upstream before a patch is ever built.
/// `conversation_thread_id` is set exactly once, by the creation saga.
#[derive(Debug, Clone, Default)]
pub struct AppointmentPatch {
    pub status: Option<AppointmentStatus>,
    pub description: Option<String>,
    pub payment_balance: Option<f64>,
    pub conversation_thread_id: Option<Uuid>,
}

impl AppointmentPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.description.is_none()
            && self.payment_balance.is_none()
            && self.conversation_thread_id.is_none()
    }
}

// ==============================================================================
// REPOSITORY TRAITS
// ==============================================================================

#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<(), StoreError>;
    async fn find(&self, id: Uuid) -> Result<Option<Session>, StoreError>;
    /// Idempotent: deleting an absent session is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn insert(&self, user: &UserRecord) -> Result<(), StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn update_password(&self, username: &str, password_hash: &str)
        -> Result<(), StoreError>;
}

#[async_trait]
pub trait ServiceRepo: Send + Sync {
    async fn insert(&self, service: &MedicalService) -> Result<(), StoreError>;
    async fn find(&self, id: Uuid) -> Result<Option<MedicalService>, StoreError>;
}

#[async_trait]
pub trait AppointmentRepo: Send + Sync {
    async fn insert(&self, appointment: &Appointment) -> Result<(), StoreError>;
    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;
    async fn update(&self, id: Uuid, patch: &AppointmentPatch) -> Result<(), StoreError>;
    /// Idempotent: deleting an absent appointment is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
    /// Participant-scoped listing, startTime descending.
    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError>;
    /// Appointments for one physician with startTime in [from, to],
    /// startTime ascending. Status filtering is left to the caller.
    async fn booked_in_window(
        &self,
        physician_username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;
}

#[async_trait]
pub trait ThreadRepo: Send + Sync {
    async fn insert(&self, thread: &ConversationThread) -> Result<(), StoreError>;
    async fn find(&self, id: Uuid) -> Result<Option<ConversationThread>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
    /// Removes the thread owned by the appointment, if any. Returns the
    /// number of rows removed; zero matches is not an error.
    async fn delete_for_appointment(&self, appointment_id: Uuid) -> Result<u64, StoreError>;
}

/// Shared shape of the four dependent clinical-record collections.
#[async_trait]
pub trait RecordRepo<T>: Send + Sync {
    async fn insert(&self, record: &T) -> Result<(), StoreError>;
    async fn find(&self, id: Uuid) -> Result<Option<T>, StoreError>;
    /// Newest first. `limit == 0` means unbounded.
    async fn list_for_appointment(
        &self,
        appointment_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<T>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
    async fn delete_for_appointment(&self, appointment_id: Uuid) -> Result<u64, StoreError>;
}

// ==============================================================================
// STORE HANDLE SET
// ==============================================================================

/// One handle per collection, constructed once at startup and passed through
/// the request context. No lazy singletons, no global mutable state.
#[derive(Clone)]
pub struct Store {
    pub sessions: Arc<dyn SessionRepo>,
    pub users: Arc<dyn UserRepo>,
    pub services: Arc<dyn ServiceRepo>,
    pub appointments: Arc<dyn AppointmentRepo>,
    pub threads: Arc<dyn ThreadRepo>,
    pub notes: Arc<dyn RecordRepo<Note>>,
    pub medications: Arc<dyn RecordRepo<Medication>>,
    pub lab_reports: Arc<dyn RecordRepo<LabReport>>,
    pub payments: Arc<dyn RecordRepo<Payment>>,
}

impl Store {
    /// All collections backed by one in-memory store.
    pub fn memory() -> Self {
        let db = Arc::new(MemoryStore::default());
        Self {
            sessions: db.clone(),
            users: db.clone(),
            services: db.clone(),
            appointments: db.clone(),
            threads: db.clone(),
            notes: db.clone(),
            medications: db.clone(),
            lab_reports: db.clone(),
            payments: db,
        }
    }

    /// All collections backed by the PostgREST-style HTTP store.
    pub fn rest(config: &AppConfig) -> Self {
        let db = Arc::new(RestStore::new(config));
        Self {
            sessions: db.clone(),
            users: db.clone(),
            services: db.clone(),
            appointments: db.clone(),
            threads: db.clone(),
            notes: db.clone(),
            medications: db.clone(),
            lab_reports: db.clone(),
            payments: db,
        }
    }
}

/// Shared axum state: configuration plus the store handles.
pub struct AppContext {
    pub config: AppConfig,
    pub store: Store,
}

impl AppContext {
    pub fn new(config: AppConfig, store: Store) -> Self {
        Self { config, store }
    }
}
