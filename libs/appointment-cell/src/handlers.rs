use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    Extension,
};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::SessionIdentity;
use shared_models::domain::{Appointment, LabReport, Medication, Note, Payment};
use shared_models::error::AppError;
use shared_store::AppContext;

use crate::models::{
    AddLabReportRequest, AddMedicationRequest, AddNoteRequest, AddPaymentRequest,
    AvailabilityQuery, BookAppointmentRequest, ListAppointmentsQuery, RecordListQuery,
    SlotAvailability,
};
use crate::services::availability::AvailabilityService;
use crate::services::booking::BookingService;
use crate::services::cascade::CascadeDeleter;
use crate::services::records::RecordService;

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

pub async fn list_appointments(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let service = BookingService::new(ctx.store.clone());
    let appointments = service.list_appointments(&identity, &query).await?;
    Ok(Json(appointments))
}

pub async fn get_appointment(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let service = BookingService::new(ctx.store.clone());
    let appointment = service.get_appointment(&identity, id).await?;
    Ok(Json(appointment))
}

pub async fn create_appointment(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let service = BookingService::new(ctx.store.clone());
    let appointment = service.create_appointment(&identity, request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn update_appointment(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path(id): Path<Uuid>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<Appointment>, AppError> {
    let service = BookingService::new(ctx.store.clone());
    let appointment = service.update_appointment(&identity, id, &payload).await?;
    Ok(Json(appointment))
}

/// Delete is participant-scoped like every other read: an id that was never
/// booked (or belongs to someone else) is a 404, while the cascade itself
/// stays idempotent underneath.
pub async fn delete_appointment(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let booking = BookingService::new(ctx.store.clone());
    booking.get_appointment(&identity, id).await?;

    let deleter = CascadeDeleter::new(ctx.store.clone());
    deleter.delete_appointment(id).await?;
    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

pub async fn booked_slots(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    debug!(
        "Booked slots for {} on {}",
        query.physician_username, query.date
    );
    let service = AvailabilityService::new(ctx.store.clone());
    let labels = service
        .booked_labels(&query.physician_username, &query.date)
        .await?;
    Ok(Json(labels))
}

pub async fn availability(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<SlotAvailability>>, AppError> {
    let service = AvailabilityService::new(ctx.store.clone());
    let grid = service
        .compute_availability(&query.physician_username, &query.date)
        .await?;
    Ok(Json(grid))
}

// ==============================================================================
// DEPENDENT RECORDS
// ==============================================================================

fn paging(query: &RecordListQuery) -> (u32, u32) {
    (query.page.unwrap_or(0), query.limit.unwrap_or(0))
}

pub async fn list_notes(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path(appointment_id): Path<Uuid>,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<Vec<Note>>, AppError> {
    let (page, limit) = paging(&query);
    let service = RecordService::new(ctx.store.clone());
    let notes = service
        .list_notes(&identity, appointment_id, page, limit)
        .await?;
    Ok(Json(notes))
}

pub async fn add_note(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<AddNoteRequest>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    let service = RecordService::new(ctx.store.clone());
    let note = service.add_note(&identity, appointment_id, request).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn delete_note(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path((appointment_id, note_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let service = RecordService::new(ctx.store.clone());
    service.delete_note(&identity, appointment_id, note_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn list_medications(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path(appointment_id): Path<Uuid>,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<Vec<Medication>>, AppError> {
    let (page, limit) = paging(&query);
    let service = RecordService::new(ctx.store.clone());
    let medications = service
        .list_medications(&identity, appointment_id, page, limit)
        .await?;
    Ok(Json(medications))
}

pub async fn add_medication(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<AddMedicationRequest>,
) -> Result<(StatusCode, Json<Medication>), AppError> {
    let service = RecordService::new(ctx.store.clone());
    let medication = service
        .add_medication(&identity, appointment_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(medication)))
}

pub async fn delete_medication(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path((appointment_id, medication_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let service = RecordService::new(ctx.store.clone());
    service
        .delete_medication(&identity, appointment_id, medication_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn list_lab_reports(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path(appointment_id): Path<Uuid>,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<Vec<LabReport>>, AppError> {
    let (page, limit) = paging(&query);
    let service = RecordService::new(ctx.store.clone());
    let reports = service
        .list_lab_reports(&identity, appointment_id, page, limit)
        .await?;
    Ok(Json(reports))
}

pub async fn add_lab_report(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<AddLabReportRequest>,
) -> Result<(StatusCode, Json<LabReport>), AppError> {
    let service = RecordService::new(ctx.store.clone());
    let report = service
        .add_lab_report(&identity, appointment_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn delete_lab_report(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path((appointment_id, report_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let service = RecordService::new(ctx.store.clone());
    service
        .delete_lab_report(&identity, appointment_id, report_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn list_payments(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path(appointment_id): Path<Uuid>,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let (page, limit) = paging(&query);
    let service = RecordService::new(ctx.store.clone());
    let payments = service
        .list_payments(&identity, appointment_id, page, limit)
        .await?;
    Ok(Json(payments))
}

pub async fn add_payment(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<AddPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let service = RecordService::new(ctx.store.clone());
    let payment = service
        .add_payment(&identity, appointment_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn delete_payment(
    State(ctx): State<Arc<AppContext>>,
    Extension(identity): Extension<SessionIdentity>,
    Path((appointment_id, payment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let service = RecordService::new(ctx.store.clone());
    service
        .delete_payment(&identity, appointment_id, payment_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}
