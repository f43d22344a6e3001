use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// USERS & SESSIONS
// ==============================================================================

/// Short projection of a user embedded in appointments and threads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: Uuid,
    pub username: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_physician: bool,
}

impl UserRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn to_ref(&self) -> UserRef {
        UserRef {
            id: self.id,
            username: self.username.clone(),
            name: self.full_name(),
        }
    }
}

/// Server-side session row. One per sign-in; deleted on sign-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub username: String,
    pub start_time: DateTime<Utc>,
}

/// A bookable service offered by physicians.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalService {
    pub id: Uuid,
    pub name: String,
    pub rate: f64,
}

// ==============================================================================
// APPOINTMENTS & CONVERSATION THREADS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppointmentStatus {
    Pending,
    Accepted,
    Rejected,
    Done,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "Pending"),
            AppointmentStatus::Accepted => write!(f, "Accepted"),
            AppointmentStatus::Rejected => write!(f, "Rejected"),
            AppointmentStatus::Done => write!(f, "Done"),
        }
    }
}

/// The parent entity of the consistency domain. Identity fields
/// {id, title, patient, physician, conversationThreadId} never change after
/// the creation saga completes; only status, description and paymentBalance
/// are mutable (paymentBalance only through payment operations).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub title: String,
    pub patient: UserRef,
    pub physician: UserRef,
    pub status: AppointmentStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: String,
    pub service_name: String,
    pub service_charge: f64,
    pub payment_balance: f64,
    pub conversation_thread_id: Option<Uuid>,
}

/// 1:1 with its owning appointment; exists iff the appointment references it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationThread {
    pub id: Uuid,
    pub title: String,
    pub host: UserRef,
    pub members: Vec<String>,
    pub active_members: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub appointment_id: Uuid,
}

// ==============================================================================
// DEPENDENT CLINICAL RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub from_username: String,
    pub title: String,
    pub content: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub from_username: String,
    pub to_username: String,
    pub name: String,
    pub dosage: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabReport {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub from_username: String,
    pub name: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub from_username: String,
    pub to_username: String,
    pub amount: f64,
    pub date: DateTime<Utc>,
}
