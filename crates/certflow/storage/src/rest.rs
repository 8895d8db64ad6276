//! REST adapter for the certificate portal backend
//!
//! Maps the storage traits onto the backend's HTTP API:
//!
//! | Operation | Request |
//! |---|---|
//! | get application | `GET /applications/{id}` |
//! | create application | `POST /applications` |
//! | put application | `PUT /applications/{id}` with the expected version |
//! | list applications | `GET /applications?stage=&status=&submitted_by=&limit=&offset=` |
//! | certificate for application | `GET /applications/{id}/certificate` |
//! | insert certificate | `POST /applications/{id}/certificate` |
//! | get certificate | `GET /certificates/{id}` |
//!
//! `409 Conflict` and `412 Precondition Failed` on a put mean another
//! writer got there first. Transport errors and `5xx` responses surface as
//! [`StorageError::Backend`] so callers can retry them.

use crate::traits::{ApplicationFilter, ApplicationStore, CertificateStore, QueryWindow};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use certflow_types::{Application, ApplicationId, Certificate, CertificateId, HistoryEntry};
use reqwest::{Client, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

/// HTTP client implementing the certflow storage traits
#[derive(Clone, Debug)]
pub struct RestStore {
    client: Client,
    base: Url,
}

/// Body of `PUT /applications/{id}`
#[derive(Debug, Serialize, Deserialize)]
pub struct PutApplicationRequest {
    pub expected_version: u64,
    pub application: Application,
    /// The entry this write appends, for backends that store history separately
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_entry: Option<HistoryEntry>,
}

/// Body the backend returns alongside a version conflict
#[derive(Debug, Default, Deserialize)]
struct ConflictBody {
    #[serde(default)]
    current_version: Option<u64>,
}

impl RestStore {
    /// Create a client for the backend at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| StorageError::InvalidInput(format!("base url {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(StorageError::InvalidInput(format!(
                "base url {} cannot carry a path",
                base_url
            )));
        }

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Endpoint under the base url; each segment is percent-encoded, so ids
    /// containing `/` or `?` stay inside their own segment.
    fn url(&self, segments: &[&str]) -> StorageResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                StorageError::InvalidInput(format!("base url {} cannot carry a path", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_optional<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> StorageResult<Option<T>> {
        let response = self
            .client
            .get(self.url(segments)?)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }
}

#[async_trait]
impl ApplicationStore for RestStore {
    async fn create_application(&self, application: Application) -> StorageResult<()> {
        let response = self
            .client
            .post(self.url(&["applications"])?)
            .json(&application)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(StorageError::Conflict(format!(
                "application {} already exists",
                application.id
            ))),
            _ => Err(status_error(response).await),
        }
    }

    async fn get_application(&self, id: &ApplicationId) -> StorageResult<Option<Application>> {
        self.get_optional(&["applications", id.as_str()]).await
    }

    async fn put_application(
        &self,
        application: &Application,
        expected_version: u64,
    ) -> StorageResult<()> {
        let body = PutApplicationRequest {
            expected_version,
            application: application.clone(),
            history_entry: application.last_entry().cloned(),
        };
        let response = self
            .client
            .put(self.url(&["applications", application.id.as_str()])?)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                let conflict: ConflictBody = response.json().await.unwrap_or_default();
                tracing::debug!(
                    application_id = %application.id,
                    expected_version,
                    current_version = ?conflict.current_version,
                    "Backend rejected stale write"
                );
                Err(StorageError::Stale {
                    id: application.id.clone(),
                    expected: expected_version,
                    found: conflict.current_version.unwrap_or(expected_version + 1),
                })
            }
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(format!(
                "application {} not found",
                application.id
            ))),
            _ => Err(status_error(response).await),
        }
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<Application>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(stage) = filter.stage {
            query.push(("stage", stage.to_string()));
        }
        if let Some(status) = filter.status {
            query.push(("status", status.to_string()));
        }
        if let Some(actor) = &filter.submitted_by {
            query.push(("submitted_by", actor.to_string()));
        }
        if window.limit > 0 {
            query.push(("limit", window.limit.to_string()));
        }
        if window.offset > 0 {
            query.push(("offset", window.offset.to_string()));
        }

        let response = self
            .client
            .get(self.url(&["applications"])?)
            .query(&query)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }
}

#[async_trait]
impl CertificateStore for RestStore {
    async fn certificate_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> StorageResult<Option<Certificate>> {
        self.get_optional(&["applications", application_id.as_str(), "certificate"])
            .await
    }

    async fn get_certificate(&self, id: &CertificateId) -> StorageResult<Option<Certificate>> {
        self.get_optional(&["certificates", id.as_str()]).await
    }

    async fn insert_certificate(&self, certificate: Certificate) -> StorageResult<Certificate> {
        // The backend answers with the stored certificate, which is the
        // earlier one if this application already had a certificate.
        let response = self
            .client
            .post(self.url(&[
                "applications",
                certificate.application_id.as_str(),
                "certificate",
            ])?)
            .json(&certificate)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }
}

fn transport_error(err: reqwest::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> StorageResult<T> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

async fn status_error(response: reqwest::Response) -> StorageError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            StorageError::InvalidInput(message)
        }
        StatusCode::CONFLICT => StorageError::Conflict(message),
        _ => StorageError::Backend(format!("{}: {}", status.as_u16(), message)),
    }
}
