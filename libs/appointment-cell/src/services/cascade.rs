use tracing::{debug, info};
use uuid::Uuid;

use shared_store::{AppointmentQuery, Store};

use crate::models::AppointmentError;

/// Dependent-first cascading delete for the appointment consistency domain.
///
/// Ordering matters: clinical records first, then the conversation thread,
/// then the appointment row last. A crash mid-cascade leaves orphan-free
/// prefixes only, and because every step tolerates absence the whole cascade
/// can be re-run to completion.
pub struct CascadeDeleter {
    store: Store,
}

impl CascadeDeleter {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Remove an appointment and everything hanging off it. Calling this for
    /// an id with no remaining rows succeeds and does nothing.
    pub async fn delete_appointment(&self, id: Uuid) -> Result<(), AppointmentError> {
        debug!("Cascade delete for appointment {}", id);

        let notes = self.store.notes.delete_for_appointment(id).await?;
        let medications = self.store.medications.delete_for_appointment(id).await?;
        let reports = self.store.lab_reports.delete_for_appointment(id).await?;
        let payments = self.store.payments.delete_for_appointment(id).await?;
        let threads = self.store.threads.delete_for_appointment(id).await?;
        self.store.appointments.delete(id).await?;

        info!(
            "Cascade removed appointment {} ({} notes, {} medications, {} reports, {} payments, {} threads)",
            id, notes, medications, reports, payments, threads
        );
        Ok(())
    }

    /// Cascade every appointment the user participates in, sequentially and
    /// fail-fast. There is no global rollback; completed cascades stay done.
    pub async fn delete_for_user(&self, username: &str) -> Result<u64, AppointmentError> {
        let query = AppointmentQuery {
            username: username.to_string(),
            ..Default::default()
        };
        let appointments = self.store.appointments.list(&query).await?;

        let mut removed = 0;
        for appointment in appointments {
            self.delete_appointment(appointment.id).await?;
            removed += 1;
        }
        info!("Removed {} appointments for {}", removed, username);
        Ok(removed)
    }
}
