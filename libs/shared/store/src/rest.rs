//! PostgREST-style HTTP backend. Every call is bounded by the configured
//! timeout; a timeout is classified as transient (`StoreError::Timeout`)
//! and kept distinct from a definite rejection from the store.

use chrono::{DateTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use async_trait::async_trait;
use shared_config::AppConfig;
use shared_models::domain::{
    Appointment, ConversationThread, LabReport, MedicalService, Medication, Note, Payment,
    Session, UserRecord,
};
use shared_models::error::StoreError;

use crate::{
    AppointmentPatch, AppointmentQuery, AppointmentRepo, AppointmentView, RecordRepo, ServiceRepo,
    SessionRepo, ThreadRepo, UserRepo,
};

pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.store_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.store_url.clone(),
            api_key: config.store_api_key.clone(),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(key) = HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", key);
        }
        headers
    }

    fn classify(err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response, StoreError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Store request {} {}", method, url);

        let mut headers = self.headers();
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await.map_err(Self::classify)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Store error ({}): {}", status, error_text);
            return Err(StoreError::Unavailable(format!(
                "store responded {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body, extra_headers).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }

    /// Fire a write and discard the response body (writes may return 201/204
    /// with no content).
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(), StoreError> {
        self.send(method, path, body, None).await.map(|_| ())
    }

    /// DELETE with `Prefer: return=representation` so the removed rows come
    /// back and can be counted.
    async fn delete_returning(&self, path: &str) -> Result<u64, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("return=representation"),
        );
        let removed: Vec<Value> = self
            .request(Method::DELETE, path, None, Some(headers))
            .await?;
        Ok(removed.len() as u64)
    }

    async fn find_one<T>(&self, path: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let mut rows: Vec<T> = self.request(Method::GET, path, None, None).await?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }

    fn to_body<T: serde::Serialize>(record: &T) -> Result<Value, StoreError> {
        serde_json::to_value(record).map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    urlencoding::encode(&ts.to_rfc3339()).into_owned()
}

#[async_trait]
impl SessionRepo for RestStore {
    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        self.execute(
            Method::POST,
            "/rest/v1/sessions",
            Some(Self::to_body(session)?),
        )
        .await
    }

    async fn find(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        self.find_one(&format!("/rest/v1/sessions?id=eq.{}", id)).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.execute(
            Method::DELETE,
            &format!("/rest/v1/sessions?id=eq.{}", id),
            None,
        )
        .await
    }
}

#[async_trait]
impl UserRepo for RestStore {
    async fn insert(&self, user: &UserRecord) -> Result<(), StoreError> {
        // passwordHash is skipped by the record's own serializer, so the
        // stored row is assembled by hand here.
        let body = json!({
            "id": user.id,
            "username": user.username,
            "passwordHash": user.password_hash,
            "firstName": user.first_name,
            "lastName": user.last_name,
            "isPhysician": user.is_physician,
        });
        self.execute(Method::POST, "/rest/v1/users", Some(body)).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        self.find_one(&format!(
            "/rest/v1/users?username=eq.{}",
            urlencoding::encode(username)
        ))
        .await
    }

    async fn update_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        self.execute(
            Method::PATCH,
            &format!(
                "/rest/v1/users?username=eq.{}",
                urlencoding::encode(username)
            ),
            Some(json!({ "passwordHash": password_hash })),
        )
        .await
    }
}

#[async_trait]
impl ServiceRepo for RestStore {
    async fn insert(&self, service: &MedicalService) -> Result<(), StoreError> {
        self.execute(
            Method::POST,
            "/rest/v1/medical_services",
            Some(Self::to_body(service)?),
        )
        .await
    }

    async fn find(&self, id: Uuid) -> Result<Option<MedicalService>, StoreError> {
        self.find_one(&format!("/rest/v1/medical_services?id=eq.{}", id))
            .await
    }
}

#[async_trait]
impl AppointmentRepo for RestStore {
    async fn insert(&self, appointment: &Appointment) -> Result<(), StoreError> {
        self.execute(
            Method::POST,
            "/rest/v1/appointments",
            Some(Self::to_body(appointment)?),
        )
        .await
    }

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.find_one(&format!("/rest/v1/appointments?id=eq.{}", id))
            .await
    }

    async fn update(&self, id: Uuid, patch: &AppointmentPatch) -> Result<(), StoreError> {
        let mut body = Map::new();
        if let Some(status) = patch.status {
            body.insert("status".to_string(), json!(status));
        }
        if let Some(description) = &patch.description {
            body.insert("description".to_string(), json!(description));
        }
        if let Some(balance) = patch.payment_balance {
            body.insert("paymentBalance".to_string(), json!(balance));
        }
        if let Some(thread_id) = patch.conversation_thread_id {
            body.insert("conversationThreadId".to_string(), json!(thread_id));
        }
        self.execute(
            Method::PATCH,
            &format!("/rest/v1/appointments?id=eq.{}", id),
            Some(Value::Object(body)),
        )
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.execute(
            Method::DELETE,
            &format!("/rest/v1/appointments?id=eq.{}", id),
            None,
        )
        .await
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        let username = urlencoding::encode(&query.username).into_owned();
        let participant = format!(
            "or(patient->>username.eq.{},physician->>username.eq.{})",
            username, username
        );

        let mut filters = Vec::new();
        match &query.search {
            Some(needle) if !needle.is_empty() => {
                let q = urlencoding::encode(needle).into_owned();
                filters.push(format!(
                    "and=({},or(title.ilike.*{}*,description.ilike.*{}*,patient->>name.ilike.*{}*,physician->>name.ilike.*{}*))",
                    participant, q, q, q, q
                ));
            }
            _ => filters.push(format!("and=({})", participant)),
        }

        let now = encode_ts(Utc::now());
        match query.view {
            AppointmentView::All => {}
            AppointmentView::Waiting => {
                filters.push(format!("startTime=lte.{}", now));
                filters.push(format!("endTime=gt.{}", now));
                filters.push("status=neq.Done".to_string());
            }
            AppointmentView::Payments => filters.push("status=eq.Done".to_string()),
        }

        let mut path = format!(
            "/rest/v1/appointments?{}&order=startTime.desc",
            filters.join("&")
        );
        if query.limit > 0 {
            path.push_str(&format!(
                "&limit={}&offset={}",
                query.limit,
                query.page * query.limit
            ));
        }

        self.request(Method::GET, &path, None, None).await
    }

    async fn booked_in_window(
        &self,
        physician_username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?physician->>username=eq.{}&startTime=gte.{}&startTime=lte.{}&order=startTime.asc",
            urlencoding::encode(physician_username),
            encode_ts(from),
            encode_ts(to)
        );
        self.request(Method::GET, &path, None, None).await
    }
}

#[async_trait]
impl ThreadRepo for RestStore {
    async fn insert(&self, thread: &ConversationThread) -> Result<(), StoreError> {
        self.execute(
            Method::POST,
            "/rest/v1/conversation_threads",
            Some(Self::to_body(thread)?),
        )
        .await
    }

    async fn find(&self, id: Uuid) -> Result<Option<ConversationThread>, StoreError> {
        self.find_one(&format!("/rest/v1/conversation_threads?id=eq.{}", id))
            .await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.execute(
            Method::DELETE,
            &format!("/rest/v1/conversation_threads?id=eq.{}", id),
            None,
        )
        .await
    }

    async fn delete_for_appointment(&self, appointment_id: Uuid) -> Result<u64, StoreError> {
        self.delete_returning(&format!(
            "/rest/v1/conversation_threads?appointmentId=eq.{}",
            appointment_id
        ))
        .await
    }
}

macro_rules! impl_rest_record_repo {
    ($record:ty, $path:literal) => {
        #[async_trait]
        impl RecordRepo<$record> for RestStore {
            async fn insert(&self, record: &$record) -> Result<(), StoreError> {
                self.execute(
                    Method::POST,
                    concat!("/rest/v1/", $path),
                    Some(Self::to_body(record)?),
                )
                .await
            }

            async fn find(&self, id: Uuid) -> Result<Option<$record>, StoreError> {
                self.find_one(&format!("/rest/v1/{}?id=eq.{}", $path, id)).await
            }

            async fn list_for_appointment(
                &self,
                appointment_id: Uuid,
                page: u32,
                limit: u32,
            ) -> Result<Vec<$record>, StoreError> {
                let mut path = format!(
                    "/rest/v1/{}?appointmentId=eq.{}&order=date.desc",
                    $path, appointment_id
                );
                if limit > 0 {
                    path.push_str(&format!("&limit={}&offset={}", limit, page * limit));
                }
                self.request(Method::GET, &path, None, None).await
            }

            async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
                self.execute(
                    Method::DELETE,
                    &format!("/rest/v1/{}?id=eq.{}", $path, id),
                    None,
                )
                .await
            }

            async fn delete_for_appointment(
                &self,
                appointment_id: Uuid,
            ) -> Result<u64, StoreError> {
                self.delete_returning(&format!(
                    "/rest/v1/{}?appointmentId=eq.{}",
                    $path, appointment_id
                ))
                .await
            }
        }
    };
}

impl_rest_record_repo!(Note, "notes");
impl_rest_record_repo!(Medication, "medications");
impl_rest_record_repo!(LabReport, "lab_reports");
impl_rest_record_repo!(Payment, "payments");
