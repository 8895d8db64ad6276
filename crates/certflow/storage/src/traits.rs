use crate::StorageResult;
use async_trait::async_trait;
use certflow_types::{
    ActorId, Application, ApplicationId, Certificate, CertificateId, Stage, Status,
};

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn first(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }
}

/// Filter for application listings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub stage: Option<Stage>,
    pub status: Option<Status>,
    pub submitted_by: Option<ActorId>,
}

impl ApplicationFilter {
    /// Applications waiting for review at `stage`
    pub fn pending_at(stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            status: Some(Status::Pending),
            submitted_by: None,
        }
    }

    pub fn with_status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn submitted_by(actor: ActorId) -> Self {
        Self {
            submitted_by: Some(actor),
            ..Self::default()
        }
    }

    pub fn matches(&self, application: &Application) -> bool {
        self.stage
            .map_or(true, |s| application.state.pending_stage() == Some(s))
            && self.status.map_or(true, |s| application.status() == s)
            && self
                .submitted_by
                .as_ref()
                .map_or(true, |a| &application.submitted_by == a)
    }
}

/// Storage interface for application records.
///
/// Writes are optimistic: `put_application` succeeds only when the stored
/// record still carries `expected_version`.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Insert a newly submitted application.
    async fn create_application(&self, application: Application) -> StorageResult<()>;

    /// Get one application by id.
    async fn get_application(&self, id: &ApplicationId) -> StorageResult<Option<Application>>;

    /// Replace the stored record, whose version must equal `expected_version`.
    /// The new record carries `expected_version + 1` and extends the stored
    /// history without rewriting it.
    async fn put_application(
        &self,
        application: &Application,
        expected_version: u64,
    ) -> StorageResult<()>;

    /// List matching applications, oldest submission first.
    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<Application>>;
}

/// Storage interface for issued certificates.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn certificate_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> StorageResult<Option<Certificate>>;

    async fn get_certificate(&self, id: &CertificateId) -> StorageResult<Option<Certificate>>;

    /// Store a certificate unless its application already has one.
    /// Returns whichever certificate is stored afterwards.
    async fn insert_certificate(&self, certificate: Certificate) -> StorageResult<Certificate>;
}

/// Storage bundle used by the review handlers.
pub trait CertflowStorage: ApplicationStore + CertificateStore + Send + Sync {}

impl<T> CertflowStorage for T where T: ApplicationStore + CertificateStore + Send + Sync {}
