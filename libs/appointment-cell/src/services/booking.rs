use chrono::{Duration as ChronoDuration, NaiveDateTime};
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::SessionIdentity;
use shared_models::domain::{Appointment, AppointmentStatus, ConversationThread, UserRecord};
use shared_store::{AppointmentQuery, AppointmentPatch, Store};

use crate::models::{AppointmentError, BookAppointmentRequest, ListAppointmentsQuery};

const DEFAULT_DURATION_MINUTES: i64 = 30;

/// Undo action for one completed saga step. Each is an idempotent delete
/// owning everything it needs, so unwinding never touches the service.
type Compensation = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Books appointments and keeps the appointment ↔ conversation-thread pair
/// consistent without a multi-record write primitive: each forward step
/// pushes its own compensation, and any later failure unwinds the stack in
/// reverse order.
pub struct BookingService {
    store: Store,
}

impl BookingService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The creation saga: appointment, then thread, then back-link.
    ///
    /// On success the appointment and its thread reference each other. On a
    /// reported failure no partial pair survives, except when a compensation
    /// itself fails; that is logged and left for the cascade deleter.
    pub async fn create_appointment(
        &self,
        identity: &SessionIdentity,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "{} booking appointment '{}' for {} with {}",
            identity.username, request.title, request.patient, request.physician
        );

        // Step 1: validate and resolve the participants and the service.
        if request.title.trim().is_empty()
            || request.patient.trim().is_empty()
            || request.physician.trim().is_empty()
        {
            return Err(AppointmentError::InvalidInput);
        }

        let patient = self.resolve_user(&request.patient).await?;
        let physician = self.resolve_user(&request.physician).await?;
        if !physician.is_physician {
            return Err(AppointmentError::InvalidInput);
        }
        let service = self
            .store
            .services
            .find(request.service_id)
            .await?
            .ok_or(AppointmentError::InvalidInput)?;

        // Step 2: assemble the slot window from the date + canonical label.
        let start_time = parse_slot_start(&request.start_date, &request.start_time)?;
        let end_time = start_time + ChronoDuration::minutes(DEFAULT_DURATION_MINUTES);

        let mut compensations: Vec<Compensation> = Vec::new();

        // Step A: the appointment row, thread link still empty.
        let mut appointment = Appointment {
            id: Uuid::new_v4(),
            title: request.title,
            patient: patient.to_ref(),
            physician: physician.to_ref(),
            status: AppointmentStatus::Pending,
            start_time,
            end_time,
            description: request.description,
            service_name: service.name,
            service_charge: service.rate,
            payment_balance: service.rate,
            conversation_thread_id: None,
        };
        self.store.appointments.insert(&appointment).await?;
        compensations.push(delete_appointment_compensation(
            self.store.clone(),
            appointment.id,
        ));

        // Step B: the conversation thread owned by the appointment.
        let thread = ConversationThread {
            id: Uuid::new_v4(),
            title: appointment.title.clone(),
            host: appointment.patient.clone(),
            members: vec![appointment.physician.username.clone()],
            active_members: Vec::new(),
            start_time,
            appointment_id: appointment.id,
        };
        if let Err(e) = self.store.threads.insert(&thread).await {
            warn!("Thread creation failed, unwinding booking: {}", e);
            unwind(compensations).await;
            return Err(e.into());
        }
        compensations.push(delete_thread_compensation(self.store.clone(), thread.id));

        // Step C: back-link the appointment to its thread.
        let patch = AppointmentPatch {
            conversation_thread_id: Some(thread.id),
            ..Default::default()
        };
        if let Err(e) = self.store.appointments.update(appointment.id, &patch).await {
            warn!("Thread back-link failed, unwinding booking: {}", e);
            unwind(compensations).await;
            return Err(e.into());
        }

        appointment.conversation_thread_id = Some(thread.id);
        info!(
            "Booked appointment {} with thread {}",
            appointment.id, thread.id
        );
        Ok(appointment)
    }

    /// Partial update of the mutable fields. Naming an identity field is a
    /// validation error, as is any field the shape does not define.
    pub async fn update_appointment(
        &self,
        identity: &SessionIdentity,
        id: Uuid,
        payload: &Value,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment {}", id);

        let fields = payload
            .as_object()
            .ok_or(AppointmentError::InvalidInput)?;

        const IDENTITY_FIELDS: [&str; 5] =
            ["id", "title", "patient", "physician", "conversationThreadId"];

        let mut patch = AppointmentPatch::default();
        for (key, value) in fields {
            if IDENTITY_FIELDS.contains(&key.as_str()) {
                return Err(AppointmentError::ImmutableField(key.clone()));
            }
            match key.as_str() {
                "status" => {
                    let status: AppointmentStatus = serde_json::from_value(value.clone())
                        .map_err(|_| AppointmentError::InvalidInput)?;
                    patch.status = Some(status);
                }
                "description" => {
                    let description = value
                        .as_str()
                        .ok_or(AppointmentError::InvalidInput)?;
                    patch.description = Some(description.to_string());
                }
                other => return Err(AppointmentError::UnknownField(other.to_string())),
            }
        }

        let mut appointment = self.get_appointment(identity, id).await?;
        if patch.is_empty() {
            return Ok(appointment);
        }

        self.store.appointments.update(id, &patch).await?;
        if let Some(status) = patch.status {
            appointment.status = status;
        }
        if let Some(description) = patch.description {
            appointment.description = description;
        }
        Ok(appointment)
    }

    /// Fetch one appointment. Absent rows and rows the caller does not
    /// participate in are indistinguishable from the outside.
    pub async fn get_appointment(
        &self,
        identity: &SessionIdentity,
        id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .store
            .appointments
            .find(id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if !is_participant(&appointment, &identity.username) {
            return Err(AppointmentError::NotFound);
        }
        Ok(appointment)
    }

    /// Participant-scoped listing with the optional view, search and paging.
    pub async fn list_appointments(
        &self,
        identity: &SessionIdentity,
        query: &ListAppointmentsQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let store_query = AppointmentQuery {
            username: identity.username.clone(),
            view: query.view(),
            search: query.search.clone(),
            page: query.page.unwrap_or(0),
            limit: query.limit.unwrap_or(0),
        };
        Ok(self.store.appointments.list(&store_query).await?)
    }

    async fn resolve_user(&self, username: &str) -> Result<UserRecord, AppointmentError> {
        self.store
            .users
            .find_by_username(username)
            .await?
            .ok_or(AppointmentError::InvalidInput)
    }
}

pub fn is_participant(appointment: &Appointment, username: &str) -> bool {
    appointment.patient.username == username || appointment.physician.username == username
}

/// `2024-01-10` + `9:00 AM` → the UTC slot start.
pub fn parse_slot_start(
    date: &str,
    label: &str,
) -> Result<chrono::DateTime<chrono::Utc>, AppointmentError> {
    NaiveDateTime::parse_from_str(&format!("{date} {label}"), "%Y-%m-%d %I:%M %p")
        .map(|naive| naive.and_utc())
        .map_err(|_| AppointmentError::InvalidInput)
}

fn delete_appointment_compensation(store: Store, id: Uuid) -> Compensation {
    Box::new(move || {
        Box::pin(async move {
            if let Err(e) = store.appointments.delete(id).await {
                warn!("Compensation failed to delete appointment {}: {}", id, e);
            }
        })
    })
}

fn delete_thread_compensation(store: Store, id: Uuid) -> Compensation {
    Box::new(move || {
        Box::pin(async move {
            if let Err(e) = store.threads.delete(id).await {
                warn!("Compensation failed to delete thread {}: {}", id, e);
            }
        })
    })
}

/// Run the compensation stack newest-first. Compensation failures were
/// already logged by the closures; nothing here retries or surfaces them.
async fn unwind(mut compensations: Vec<Compensation>) {
    while let Some(compensation) = compensations.pop() {
        compensation().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_start_parses_canonical_labels() {
        let start = parse_slot_start("2024-01-10", "9:00 AM").unwrap();
        assert_eq!(start.to_rfc3339(), "2024-01-10T09:00:00+00:00");

        let noon = parse_slot_start("2024-01-10", "12:00 PM").unwrap();
        assert_eq!(noon.to_rfc3339(), "2024-01-10T12:00:00+00:00");

        let late = parse_slot_start("2024-01-10", "5:30 PM").unwrap();
        assert_eq!(late.to_rfc3339(), "2024-01-10T17:30:00+00:00");
    }

    #[test]
    fn slot_start_rejects_malformed_input() {
        assert!(parse_slot_start("2024-01-10", "17:30").is_err());
        assert!(parse_slot_start("Jan 10", "9:00 AM").is_err());
        assert!(parse_slot_start("2024-01-10", "").is_err());
    }
}
