use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::auth::SessionIdentity;
use shared_models::domain::{Appointment, LabReport, Medication, Note, Payment};
use shared_store::{AppointmentPatch, Store};

use crate::models::{
    AddLabReportRequest, AddMedicationRequest, AddNoteRequest, AddPaymentRequest,
    AppointmentError,
};
use crate::services::booking::is_participant;

/// CRUD over the four dependent clinical-record collections. Every operation
/// resolves the owning appointment first, so records can only ever be
/// attached to (or read through) a live appointment the caller participates
/// in.
pub struct RecordService {
    store: Store,
}

impl RecordService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    async fn require_appointment(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .store
            .appointments
            .find(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;
        if !is_participant(&appointment, &identity.username) {
            return Err(AppointmentError::NotFound);
        }
        Ok(appointment)
    }

    // ---------------------------------------------------------------- notes

    pub async fn list_notes(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Note>, AppointmentError> {
        self.require_appointment(identity, appointment_id).await?;
        Ok(self
            .store
            .notes
            .list_for_appointment(appointment_id, page, limit)
            .await?)
    }

    pub async fn add_note(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
        request: AddNoteRequest,
    ) -> Result<Note, AppointmentError> {
        if request.title.trim().is_empty() || request.content.trim().is_empty() {
            return Err(AppointmentError::InvalidInput);
        }
        self.require_appointment(identity, appointment_id).await?;

        let note = Note {
            id: Uuid::new_v4(),
            appointment_id,
            from_username: identity.username.clone(),
            title: request.title,
            content: request.content,
            date: Utc::now(),
        };
        self.store.notes.insert(&note).await?;
        Ok(note)
    }

    pub async fn delete_note(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
        note_id: Uuid,
    ) -> Result<(), AppointmentError> {
        self.require_appointment(identity, appointment_id).await?;
        self.store.notes.delete(note_id).await?;
        Ok(())
    }

    // ---------------------------------------------------------- medications

    pub async fn list_medications(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Medication>, AppointmentError> {
        self.require_appointment(identity, appointment_id).await?;
        Ok(self
            .store
            .medications
            .list_for_appointment(appointment_id, page, limit)
            .await?)
    }

    pub async fn add_medication(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
        request: AddMedicationRequest,
    ) -> Result<Medication, AppointmentError> {
        if request.name.trim().is_empty() || request.dosage.trim().is_empty() {
            return Err(AppointmentError::InvalidInput);
        }
        let appointment = self.require_appointment(identity, appointment_id).await?;

        let medication = Medication {
            id: Uuid::new_v4(),
            appointment_id,
            from_username: identity.username.clone(),
            to_username: other_participant(&appointment, &identity.username),
            name: request.name,
            dosage: request.dosage,
            date: Utc::now(),
        };
        self.store.medications.insert(&medication).await?;
        Ok(medication)
    }

    pub async fn delete_medication(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
        medication_id: Uuid,
    ) -> Result<(), AppointmentError> {
        self.require_appointment(identity, appointment_id).await?;
        self.store.medications.delete(medication_id).await?;
        Ok(())
    }

    // ---------------------------------------------------------- lab reports

    pub async fn list_lab_reports(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<LabReport>, AppointmentError> {
        self.require_appointment(identity, appointment_id).await?;
        Ok(self
            .store
            .lab_reports
            .list_for_appointment(appointment_id, page, limit)
            .await?)
    }

    pub async fn add_lab_report(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
        request: AddLabReportRequest,
    ) -> Result<LabReport, AppointmentError> {
        if request.name.trim().is_empty() {
            return Err(AppointmentError::InvalidInput);
        }
        self.require_appointment(identity, appointment_id).await?;

        let report = LabReport {
            id: Uuid::new_v4(),
            appointment_id,
            from_username: identity.username.clone(),
            name: request.name,
            date: Utc::now(),
        };
        self.store.lab_reports.insert(&report).await?;
        Ok(report)
    }

    pub async fn delete_lab_report(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
        report_id: Uuid,
    ) -> Result<(), AppointmentError> {
        self.require_appointment(identity, appointment_id).await?;
        self.store.lab_reports.delete(report_id).await?;
        Ok(())
    }

    // ------------------------------------------------------------- payments

    pub async fn list_payments(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Payment>, AppointmentError> {
        self.require_appointment(identity, appointment_id).await?;
        Ok(self
            .store
            .payments
            .list_for_appointment(appointment_id, page, limit)
            .await?)
    }

    /// Record a payment and settle it against the balance. The insert and
    /// the balance write are two independent operations; a failure between
    /// them leaves the balance stale until a correcting payment.
    pub async fn add_payment(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
        request: AddPaymentRequest,
    ) -> Result<Payment, AppointmentError> {
        if !request.amount.is_finite() || request.amount <= 0.0 {
            return Err(AppointmentError::InvalidInput);
        }
        let appointment = self.require_appointment(identity, appointment_id).await?;

        let payment = Payment {
            id: Uuid::new_v4(),
            appointment_id,
            from_username: identity.username.clone(),
            to_username: other_participant(&appointment, &identity.username),
            amount: request.amount,
            date: Utc::now(),
        };
        self.store.payments.insert(&payment).await?;

        let patch = AppointmentPatch {
            payment_balance: Some(appointment.payment_balance - request.amount),
            ..Default::default()
        };
        self.store.appointments.update(appointment_id, &patch).await?;

        info!(
            "Payment of {} recorded against appointment {}",
            request.amount, appointment_id
        );
        Ok(payment)
    }

    /// Remove a payment and restore its amount to the balance. The balance
    /// is only restored when a row was actually removed, so repeating the
    /// delete cannot inflate it.
    pub async fn delete_payment(
        &self,
        identity: &SessionIdentity,
        appointment_id: Uuid,
        payment_id: Uuid,
    ) -> Result<(), AppointmentError> {
        let appointment = self.require_appointment(identity, appointment_id).await?;

        let payment = match self.store.payments.find(payment_id).await? {
            Some(p) if p.appointment_id == appointment_id => p,
            // already gone, or attached to a different appointment
            _ => {
                debug!("Payment {} not present, nothing to restore", payment_id);
                return Ok(());
            }
        };

        self.store.payments.delete(payment_id).await?;

        let patch = AppointmentPatch {
            payment_balance: Some(appointment.payment_balance + payment.amount),
            ..Default::default()
        };
        self.store.appointments.update(appointment_id, &patch).await?;
        Ok(())
    }
}

fn other_participant(appointment: &Appointment, username: &str) -> String {
    if appointment.patient.username == username {
        appointment.physician.username.clone()
    } else {
        appointment.patient.username.clone()
    }
}
