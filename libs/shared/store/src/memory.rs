//! In-memory backend: every collection is a `RwLock<HashMap>`. Used by the
//! tests and by secret-less development runs. Deliberately mirrors the
//! semantics of the REST backend, including its lack of cross-collection
//! transactions.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_models::domain::{
    Appointment, AppointmentStatus, ConversationThread, LabReport, MedicalService, Medication,
    Note, Payment, Session, UserRecord,
};
use shared_models::error::StoreError;

use crate::{
    AppointmentPatch, AppointmentQuery, AppointmentRepo, AppointmentView, RecordRepo, ServiceRepo,
    SessionRepo, ThreadRepo, UserRepo,
};

#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    users: RwLock<HashMap<String, UserRecord>>,
    services: RwLock<HashMap<Uuid, MedicalService>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    threads: RwLock<HashMap<Uuid, ConversationThread>>,
    notes: RwLock<HashMap<Uuid, Note>>,
    medications: RwLock<HashMap<Uuid, Medication>>,
    lab_reports: RwLock<HashMap<Uuid, LabReport>>,
    payments: RwLock<HashMap<Uuid, Payment>>,
}

fn matches_search(appointment: &Appointment, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    appointment.title.to_lowercase().contains(&needle)
        || appointment.description.to_lowercase().contains(&needle)
        || appointment.patient.name.to_lowercase().contains(&needle)
        || appointment.physician.name.to_lowercase().contains(&needle)
}

fn matches_view(appointment: &Appointment, view: AppointmentView, now: DateTime<Utc>) -> bool {
    match view {
        AppointmentView::All => true,
        AppointmentView::Waiting => {
            appointment.start_time <= now
                && appointment.end_time > now
                && appointment.status != AppointmentStatus::Done
        }
        AppointmentView::Payments => appointment.status == AppointmentStatus::Done,
    }
}

fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> Vec<T> {
    if limit == 0 {
        return items;
    }
    items
        .into_iter()
        .skip((page as usize) * (limit as usize))
        .take(limit as usize)
        .collect()
}

#[async_trait]
impl SessionRepo for MemoryStore {
    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.sessions.write().await.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn insert(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.users
            .write()
            .await
            .insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn update_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if let Some(user) = users.get_mut(username) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceRepo for MemoryStore {
    async fn insert(&self, service: &MedicalService) -> Result<(), StoreError> {
        self.services
            .write()
            .await
            .insert(service.id, service.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<MedicalService>, StoreError> {
        Ok(self.services.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl AppointmentRepo for MemoryStore {
    async fn insert(&self, appointment: &Appointment) -> Result<(), StoreError> {
        self.appointments
            .write()
            .await
            .insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, patch: &AppointmentPatch) -> Result<(), StoreError> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments
            .get_mut(&id)
            .ok_or_else(|| StoreError::Unavailable(format!("no appointment row {}", id)))?;
        if let Some(status) = patch.status {
            appointment.status = status;
        }
        if let Some(description) = &patch.description {
            appointment.description = description.clone();
        }
        if let Some(balance) = patch.payment_balance {
            appointment.payment_balance = balance;
        }
        if let Some(thread_id) = patch.conversation_thread_id {
            appointment.conversation_thread_id = Some(thread_id);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.appointments.write().await.remove(&id);
        Ok(())
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        let now = Utc::now();
        let mut rows: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| {
                a.patient.username == query.username || a.physician.username == query.username
            })
            .filter(|a| matches_view(a, query.view, now))
            .filter(|a| match &query.search {
                Some(needle) if !needle.is_empty() => matches_search(a, needle),
                _ => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(paginate(rows, query.page, query.limit))
    }

    async fn booked_in_window(
        &self,
        physician_username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut rows: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.physician.username == physician_username)
            .filter(|a| a.start_time >= from && a.start_time <= to)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(rows)
    }
}

#[async_trait]
impl ThreadRepo for MemoryStore {
    async fn insert(&self, thread: &ConversationThread) -> Result<(), StoreError> {
        self.threads.write().await.insert(thread.id, thread.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<ConversationThread>, StoreError> {
        Ok(self.threads.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.threads.write().await.remove(&id);
        Ok(())
    }

    async fn delete_for_appointment(&self, appointment_id: Uuid) -> Result<u64, StoreError> {
        let mut threads = self.threads.write().await;
        let ids: Vec<Uuid> = threads
            .values()
            .filter(|t| t.appointment_id == appointment_id)
            .map(|t| t.id)
            .collect();
        for id in &ids {
            threads.remove(id);
        }
        Ok(ids.len() as u64)
    }
}

macro_rules! impl_memory_record_repo {
    ($record:ty, $field:ident) => {
        #[async_trait]
        impl RecordRepo<$record> for MemoryStore {
            async fn insert(&self, record: &$record) -> Result<(), StoreError> {
                self.$field.write().await.insert(record.id, record.clone());
                Ok(())
            }

            async fn find(&self, id: Uuid) -> Result<Option<$record>, StoreError> {
                Ok(self.$field.read().await.get(&id).cloned())
            }

            async fn list_for_appointment(
                &self,
                appointment_id: Uuid,
                page: u32,
                limit: u32,
            ) -> Result<Vec<$record>, StoreError> {
                let mut rows: Vec<$record> = self
                    .$field
                    .read()
                    .await
                    .values()
                    .filter(|r| r.appointment_id == appointment_id)
                    .cloned()
                    .collect();
                rows.sort_by(|a, b| b.date.cmp(&a.date));
                Ok(paginate(rows, page, limit))
            }

            async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
                self.$field.write().await.remove(&id);
                Ok(())
            }

            async fn delete_for_appointment(
                &self,
                appointment_id: Uuid,
            ) -> Result<u64, StoreError> {
                let mut rows = self.$field.write().await;
                let ids: Vec<Uuid> = rows
                    .values()
                    .filter(|r| r.appointment_id == appointment_id)
                    .map(|r| r.id)
                    .collect();
                for id in &ids {
                    rows.remove(id);
                }
                Ok(ids.len() as u64)
            }
        }
    };
}

impl_memory_record_repo!(Note, notes);
impl_memory_record_repo!(Medication, medications);
impl_memory_record_repo!(LabReport, lab_reports);
impl_memory_record_repo!(Payment, payments);
