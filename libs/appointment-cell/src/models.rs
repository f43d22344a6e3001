use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;
use shared_store::AppointmentView;

// ==============================================================================
// ERRORS
// ==============================================================================

/// Failures raised inside the appointment cell. Converted to `AppError` at
/// the handler boundary, where status codes are assigned.
#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Invalid request. Bad input parameters.")]
    InvalidInput,

    #[error("Field '{0}' cannot be updated")]
    ImmutableField(String),

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("storage failure: {0}")]
    Store(#[from] shared_models::error::StoreError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::InvalidInput => AppError::Validation(err.to_string()),
            AppointmentError::ImmutableField(_) | AppointmentError::UnknownField(_) => {
                AppError::Validation(err.to_string())
            }
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::Store(e) => AppError::from(e),
        }
    }
}

// ==============================================================================
// REQUEST / RESPONSE SHAPES
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    pub title: String,
    /// Patient username. The caller books for themselves in practice, but the
    /// wire shape carries it explicitly.
    pub patient: String,
    /// Physician username; must resolve to a physician-flagged user.
    pub physician: String,
    pub service_id: Uuid,
    /// Calendar date, `2024-01-10`.
    pub start_date: String,
    /// Canonical slot label, `9:00 AM`.
    pub start_time: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListAppointmentsQuery {
    pub search: Option<String>,
    pub view: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListAppointmentsQuery {
    /// Unknown view names fall back to the default listing.
    pub fn view(&self) -> AppointmentView {
        match self.view.as_deref() {
            Some("waiting") => AppointmentView::Waiting,
            Some("payments") => AppointmentView::Payments,
            _ => AppointmentView::All,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub physician_username: String,
    /// Calendar date, `2024-01-10`.
    pub date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
}

/// One entry of the free/busy grid, in grid order.
#[derive(Debug, Clone, Serialize)]
pub struct SlotAvailability {
    pub label: String,
    pub status: SlotStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddNoteRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddMedicationRequest {
    pub name: String,
    pub dosage: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddLabReportRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddPaymentRequest {
    pub amount: f64,
}
