use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, BookAppointmentRequest, ListAppointmentsQuery};
use appointment_cell::services::booking::BookingService;
use shared_models::auth::SessionIdentity;
use shared_models::domain::{Appointment, AppointmentStatus};
use shared_models::error::StoreError;
use shared_store::{
    AppointmentPatch, AppointmentQuery, AppointmentRepo, Store, ThreadRepo,
};
use shared_utils::test_utils::{
    make_appointment, seed_patient, seed_physician, seed_service, test_context,
    test_context_with,
};

fn identity_for(username: &str) -> SessionIdentity {
    SessionIdentity {
        session_id: Uuid::new_v4(),
        username: username.to_string(),
    }
}

fn book_request(service_id: Uuid) -> BookAppointmentRequest {
    BookAppointmentRequest {
        title: "Knee follow-up".to_string(),
        patient: "pat".to_string(),
        physician: "doc".to_string(),
        service_id,
        start_date: "2024-01-10".to_string(),
        start_time: "10:00 AM".to_string(),
        description: "post-op check".to_string(),
    }
}

#[tokio::test]
async fn booking_links_appointment_and_thread_both_ways() {
    let ctx = test_context();
    seed_patient(&ctx.store, "pat").await;
    seed_physician(&ctx.store, "doc").await;
    let service = seed_service(&ctx.store, "General Checkup", 150.0).await;

    let booking = BookingService::new(ctx.store.clone());
    let appointment = booking
        .create_appointment(&identity_for("pat"), book_request(service.id))
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.payment_balance, 150.0);
    assert_eq!(appointment.start_time.to_rfc3339(), "2024-01-10T10:00:00+00:00");
    assert_eq!(appointment.end_time.to_rfc3339(), "2024-01-10T10:30:00+00:00");

    // the persisted row carries the back-link too
    let stored = ctx
        .store
        .appointments
        .find(appointment.id)
        .await
        .unwrap()
        .unwrap();
    let thread_id = stored.conversation_thread_id.unwrap();

    let thread = ctx.store.threads.find(thread_id).await.unwrap().unwrap();
    assert_eq!(thread.appointment_id, appointment.id);
    assert_eq!(thread.host.username, "pat");
    assert_eq!(thread.members, vec!["doc".to_string()]);
    assert!(thread.active_members.is_empty());
}

#[tokio::test]
async fn booking_rejects_unresolvable_participants() {
    let ctx = test_context();
    seed_patient(&ctx.store, "pat").await;
    // "doc" exists but is not physician-flagged
    seed_patient(&ctx.store, "doc").await;
    let service = seed_service(&ctx.store, "General Checkup", 150.0).await;

    let booking = BookingService::new(ctx.store.clone());
    let result = booking
        .create_appointment(&identity_for("pat"), book_request(service.id))
        .await;
    assert_matches!(result, Err(AppointmentError::InvalidInput));

    let result = booking
        .create_appointment(&identity_for("pat"), book_request(Uuid::new_v4()))
        .await;
    assert_matches!(result, Err(AppointmentError::InvalidInput));
}

#[tokio::test]
async fn booking_rejects_malformed_slot() {
    let ctx = test_context();
    seed_patient(&ctx.store, "pat").await;
    seed_physician(&ctx.store, "doc").await;
    let service = seed_service(&ctx.store, "General Checkup", 150.0).await;

    let mut request = book_request(service.id);
    request.start_time = "25:00".to_string();

    let booking = BookingService::new(ctx.store.clone());
    let result = booking
        .create_appointment(&identity_for("pat"), request)
        .await;
    assert_matches!(result, Err(AppointmentError::InvalidInput));
}

// ---------------------------------------------------------------------------
// Fault injection: the saga must leave no partial pair behind.
// ---------------------------------------------------------------------------

/// Thread repo whose insert always fails; everything else delegates.
struct FailingThreadInsert {
    inner: Arc<dyn ThreadRepo>,
}

#[async_trait]
impl ThreadRepo for FailingThreadInsert {
    async fn insert(
        &self,
        _thread: &shared_models::domain::ConversationThread,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("injected thread failure".to_string()))
    }
    async fn find(
        &self,
        id: Uuid,
    ) -> Result<Option<shared_models::domain::ConversationThread>, StoreError> {
        self.inner.find(id).await
    }
    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
    async fn delete_for_appointment(&self, appointment_id: Uuid) -> Result<u64, StoreError> {
        self.inner.delete_for_appointment(appointment_id).await
    }
}

/// Appointment repo whose update (the back-link write) always fails. Inserted
/// ids are recorded so the test can inspect what the unwind left behind.
struct FailingBacklink {
    inner: Arc<dyn AppointmentRepo>,
    inserted: Mutex<Option<Uuid>>,
}

#[async_trait]
impl AppointmentRepo for FailingBacklink {
    async fn insert(&self, appointment: &Appointment) -> Result<(), StoreError> {
        *self.inserted.lock().unwrap() = Some(appointment.id);
        self.inner.insert(appointment).await
    }
    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.inner.find(id).await
    }
    async fn update(&self, _id: Uuid, _patch: &AppointmentPatch) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("injected back-link failure".to_string()))
    }
    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        self.inner.list(query).await
    }
    async fn booked_in_window(
        &self,
        physician_username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.inner.booked_in_window(physician_username, from, to).await
    }
}

#[tokio::test]
async fn thread_failure_unwinds_the_appointment() {
    let mut store = Store::memory();
    store.threads = Arc::new(FailingThreadInsert {
        inner: store.threads.clone(),
    });
    let ctx = test_context_with(store);
    seed_patient(&ctx.store, "pat").await;
    seed_physician(&ctx.store, "doc").await;
    let service = seed_service(&ctx.store, "General Checkup", 150.0).await;

    let booking = BookingService::new(ctx.store.clone());
    let result = booking
        .create_appointment(&identity_for("pat"), book_request(service.id))
        .await;
    assert_matches!(result, Err(AppointmentError::Store(_)));

    // the step-A row was compensated away
    let listed = booking
        .list_appointments(&identity_for("pat"), &ListAppointmentsQuery {
            search: None,
            view: None,
            page: None,
            limit: None,
        })
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn backlink_failure_unwinds_appointment_and_thread() {
    let mut store = Store::memory();
    let failing = Arc::new(FailingBacklink {
        inner: store.appointments.clone(),
        inserted: Mutex::new(None),
    });
    store.appointments = failing.clone();
    let ctx = test_context_with(store);
    seed_patient(&ctx.store, "pat").await;
    seed_physician(&ctx.store, "doc").await;
    let service = seed_service(&ctx.store, "General Checkup", 150.0).await;

    let booking = BookingService::new(ctx.store.clone());
    let result = booking
        .create_appointment(&identity_for("pat"), book_request(service.id))
        .await;
    assert_matches!(result, Err(AppointmentError::Store(_)));

    let appointment_id = failing.inserted.lock().unwrap().unwrap();
    assert!(ctx
        .store
        .appointments
        .find(appointment_id)
        .await
        .unwrap()
        .is_none());
    // the thread compensation ran too, so nothing is left to remove
    assert_eq!(
        ctx.store
            .threads
            .delete_for_appointment(appointment_id)
            .await
            .unwrap(),
        0
    );
}

// ---------------------------------------------------------------------------
// Update, get and list semantics.
// ---------------------------------------------------------------------------

async fn seed_booked(ctx: &Arc<shared_store::AppContext>) -> Appointment {
    seed_patient(&ctx.store, "pat").await;
    seed_physician(&ctx.store, "doc").await;
    let service = seed_service(&ctx.store, "General Checkup", 150.0).await;
    BookingService::new(ctx.store.clone())
        .create_appointment(&identity_for("pat"), book_request(service.id))
        .await
        .unwrap()
}

#[tokio::test]
async fn update_rejects_identity_fields() {
    let ctx = test_context();
    let appointment = seed_booked(&ctx).await;
    let booking = BookingService::new(ctx.store.clone());

    for field in ["id", "title", "patient", "physician", "conversationThreadId"] {
        let payload = json!({ field: "tampered" });
        let result = booking
            .update_appointment(&identity_for("pat"), appointment.id, &payload)
            .await;
        assert_matches!(result, Err(AppointmentError::ImmutableField(f)) if f == field);
    }
}

#[tokio::test]
async fn update_rejects_unknown_fields() {
    let ctx = test_context();
    let appointment = seed_booked(&ctx).await;
    let booking = BookingService::new(ctx.store.clone());

    let result = booking
        .update_appointment(
            &identity_for("pat"),
            appointment.id,
            &json!({ "paymentBalance": 0.0 }),
        )
        .await;
    assert_matches!(result, Err(AppointmentError::UnknownField(_)));
}

#[tokio::test]
async fn update_merges_status_and_description() {
    let ctx = test_context();
    let appointment = seed_booked(&ctx).await;
    let booking = BookingService::new(ctx.store.clone());

    let updated = booking
        .update_appointment(
            &identity_for("doc"),
            appointment.id,
            &json!({ "status": "Accepted", "description": "bring x-rays" }),
        )
        .await
        .unwrap();
    assert_eq!(updated.status, AppointmentStatus::Accepted);
    assert_eq!(updated.description, "bring x-rays");

    // identity fields survived the merge
    let stored = ctx
        .store
        .appointments
        .find(appointment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, AppointmentStatus::Accepted);
    assert_eq!(stored.title, appointment.title);
    assert_eq!(stored.conversation_thread_id, appointment.conversation_thread_id);
}

#[tokio::test]
async fn absent_and_foreign_appointments_are_both_not_found() {
    let ctx = test_context();
    let appointment = seed_booked(&ctx).await;
    let booking = BookingService::new(ctx.store.clone());

    let result = booking
        .get_appointment(&identity_for("pat"), Uuid::new_v4())
        .await;
    assert_matches!(result, Err(AppointmentError::NotFound));

    // a signed-in outsider gets the same answer as for a missing row
    let result = booking
        .get_appointment(&identity_for("intruder"), appointment.id)
        .await;
    assert_matches!(result, Err(AppointmentError::NotFound));

    let result = booking
        .update_appointment(
            &identity_for("intruder"),
            appointment.id,
            &json!({ "status": "Done" }),
        )
        .await;
    assert_matches!(result, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn list_views_scope_and_filter() {
    let ctx = test_context();
    let pat = seed_patient(&ctx.store, "pat").await;
    let doc = seed_physician(&ctx.store, "doc").await;
    let other = seed_patient(&ctx.store, "other").await;

    let now = Utc::now();
    // in progress right now
    let mut waiting = make_appointment(&pat, &doc, AppointmentStatus::Accepted, now - chrono::Duration::minutes(10));
    waiting.title = "Knee follow-up".to_string();
    // finished and settled
    let done = make_appointment(&pat, &doc, AppointmentStatus::Done, now - chrono::Duration::days(2));
    // someone else's appointment, never visible to pat
    let foreign = make_appointment(&other, &doc, AppointmentStatus::Pending, now);
    for a in [&waiting, &done, &foreign] {
        ctx.store.appointments.insert(a).await.unwrap();
    }

    let booking = BookingService::new(ctx.store.clone());
    let list = |view: Option<&str>, search: Option<&str>| ListAppointmentsQuery {
        search: search.map(str::to_string),
        view: view.map(str::to_string),
        page: None,
        limit: None,
    };

    let all = booking
        .list_appointments(&identity_for("pat"), &list(None, None))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let in_progress = booking
        .list_appointments(&identity_for("pat"), &list(Some("waiting"), None))
        .await
        .unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].id, waiting.id);

    let settled = booking
        .list_appointments(&identity_for("pat"), &list(Some("payments"), None))
        .await
        .unwrap();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].id, done.id);

    // the physician sees all three
    let doc_view = booking
        .list_appointments(&identity_for("doc"), &list(None, None))
        .await
        .unwrap();
    assert_eq!(doc_view.len(), 3);

    // search is case-insensitive over titles
    let searched = booking
        .list_appointments(&identity_for("doc"), &list(None, Some("KNEE")))
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].id, waiting.id);
}
