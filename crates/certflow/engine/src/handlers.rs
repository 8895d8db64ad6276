//! Review handlers: the request-facing entry points
//!
//! Each handler resolves the actor through the identity collaborator, loads
//! the current record, asks the engine for a transition and commits it with
//! an optimistic version check. Transient storage failures are retried with
//! the same transition, so a retry never duplicates a history entry.

use crate::config::{PersistenceConfig, WorkflowConfig};
use crate::identity::IdentityProvider;
use crate::issuance::CertificateIssuer;
use crate::render::CertificateRenderer;
use crate::state_machine::{Transition, WorkflowEngine};
use certflow_storage::{
    ApplicationFilter, ApplicationStore, CertflowStorage, CertificateStore, QueryWindow,
    StorageError,
};
use certflow_types::{
    ActorId, ApplicantDetails, Application, ApplicationId, Certificate, CertificateId,
    HistoryEntry, ReviewAction, Status, WorkflowError, WorkflowResult,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a committed review action
#[derive(Clone, Debug, PartialEq)]
pub struct ActionOutcome {
    pub application: Application,
    pub entry: HistoryEntry,
    /// Set when the action completed the application and issuance succeeded
    pub certificate: Option<Certificate>,
}

/// Entry points for applicants, reviewers and administrators
pub struct ReviewHandler {
    engine: WorkflowEngine,
    applications: Arc<dyn ApplicationStore>,
    identity: Arc<dyn IdentityProvider>,
    issuer: CertificateIssuer,
    persistence: PersistenceConfig,
}

impl ReviewHandler {
    /// Build a handler over one storage backend serving both stores
    pub fn new<S>(
        config: &WorkflowConfig,
        storage: Arc<S>,
        identity: Arc<dyn IdentityProvider>,
        renderer: Arc<dyn CertificateRenderer>,
    ) -> WorkflowResult<Self>
    where
        S: CertflowStorage + 'static,
    {
        let applications: Arc<dyn ApplicationStore> = storage.clone();
        let certificates: Arc<dyn CertificateStore> = storage;
        Self::with_stores(config, applications, certificates, identity, renderer)
    }

    pub fn with_stores(
        config: &WorkflowConfig,
        applications: Arc<dyn ApplicationStore>,
        certificates: Arc<dyn CertificateStore>,
        identity: Arc<dyn IdentityProvider>,
        renderer: Arc<dyn CertificateRenderer>,
    ) -> WorkflowResult<Self> {
        config.validate()?;
        let engine = WorkflowEngine::new(config.registry()?);
        let issuer = CertificateIssuer::new(
            certificates,
            identity.clone(),
            renderer,
            config.certificate.clone(),
        );
        Ok(Self {
            engine,
            applications,
            identity,
            issuer,
            persistence: config.persistence.clone(),
        })
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn issuer(&self) -> &CertificateIssuer {
        &self.issuer
    }

    /// Submit a new application on behalf of an applicant
    pub async fn submit(
        &self,
        actor_id: &ActorId,
        details: ApplicantDetails,
    ) -> WorkflowResult<Application> {
        let actor = self.identity.resolve(actor_id).await?;
        let application = self.engine.open(&actor, details, Utc::now())?;
        self.create(&application).await?;

        info!(
            application_id = %application.id,
            applicant = %actor.id,
            stage = %application.current_stage(),
            "Application submitted"
        );
        Ok(application)
    }

    /// Apply a review action and persist it.
    ///
    /// When the action completes the application a certificate is issued.
    /// An issuance failure does not undo the completion; the outcome then
    /// carries no certificate and [`ReviewHandler::issue_certificate`] can
    /// be called again later.
    pub async fn act(
        &self,
        application_id: &ApplicationId,
        actor_id: &ActorId,
        action: ReviewAction,
    ) -> WorkflowResult<ActionOutcome> {
        let actor = self.identity.resolve(actor_id).await?;
        let current = self.load(application_id).await?;

        let transition = match self.engine.apply(&current, &actor, &action, Utc::now()) {
            Ok(transition) => transition,
            Err(err) => {
                debug!(
                    application_id = %application_id,
                    actor = %actor.id,
                    action = action.kind().as_str(),
                    error = %err,
                    "Action refused"
                );
                return Err(err);
            }
        };
        self.commit(&transition).await?;

        info!(
            application_id = %application_id,
            actor = %actor.id,
            role = %actor.role,
            action = transition.entry.action.as_str(),
            stage = %transition.entry.stage,
            current_stage = %transition.application.current_stage(),
            version = transition.application.version,
            "Action committed"
        );

        let certificate = if transition.completes() {
            self.issue_after_completion(&transition.application).await
        } else {
            None
        };

        Ok(ActionOutcome {
            application: transition.application,
            entry: transition.entry,
            certificate,
        })
    }

    /// Issue (or fetch) the certificate of a completed application
    pub async fn issue_certificate(
        &self,
        application_id: &ApplicationId,
    ) -> WorkflowResult<Certificate> {
        let application = self.load(application_id).await?;
        self.issuer.issue(&application).await
    }

    /// Start a renewal application from an issued certificate.
    ///
    /// Only the certificate holder may renew, and only within the renewal
    /// window before expiry or after it.
    pub async fn renew(
        &self,
        certificate_id: &CertificateId,
        actor_id: &ActorId,
    ) -> WorkflowResult<Application> {
        let actor = self.identity.resolve(actor_id).await?;
        let certificate = self.issuer.certificate(certificate_id).await?;
        if actor.id != certificate.holder {
            return Err(WorkflowError::Unauthorized {
                role: actor.role,
                stage: "renewal".to_string(),
            });
        }

        let now = Utc::now();
        let window = self.issuer.config().renewal_window_days;
        if !certificate.renewal_open(now, window) {
            let opens = certificate
                .renewal_opens_at(window)
                .map(|at| at.date_naive().to_string())
                .unwrap_or_else(|| "a later date".to_string());
            return Err(WorkflowError::InvalidTransition(format!(
                "certificate {} opens for renewal on {}",
                certificate.serial_number, opens
            )));
        }

        let open_renewals = self
            .applications
            .list_applications(
                &ApplicationFilter {
                    status: Some(Status::Pending),
                    ..ApplicationFilter::submitted_by(actor.id.clone())
                },
                QueryWindow::default(),
            )
            .await?;
        if open_renewals
            .iter()
            .any(|a| a.renewal_of.as_ref() == Some(&certificate.id))
        {
            return Err(WorkflowError::InvalidTransition(format!(
                "a renewal of certificate {} is already under review",
                certificate.serial_number
            )));
        }

        let application = self
            .engine
            .open(&actor, certificate.applicant.clone(), now)?
            .with_renewal_of(certificate.id.clone());
        self.create(&application).await?;

        info!(
            application_id = %application.id,
            certificate_id = %certificate.id,
            "Renewal submitted"
        );
        Ok(application)
    }

    /// Applications waiting on the actor.
    ///
    /// Stage officers see what is pending at their stage, administrators see
    /// every pending application, applicants see their own submissions.
    pub async fn queue_for(
        &self,
        actor_id: &ActorId,
        window: QueryWindow,
    ) -> WorkflowResult<Vec<Application>> {
        let actor = self.identity.resolve(actor_id).await?;
        let filter = if actor.role.is_admin() {
            ApplicationFilter::with_status(Status::Pending)
        } else if let Some(stage) = actor.role.stage() {
            if !self.engine.registry().contains(stage) {
                return Err(WorkflowError::UnknownStage(stage.to_string()));
            }
            ApplicationFilter::pending_at(stage)
        } else {
            ApplicationFilter::submitted_by(actor.id.clone())
        };
        Ok(self.applications.list_applications(&filter, window).await?)
    }

    /// Load one application, verifying its history chain
    pub async fn application(&self, id: &ApplicationId) -> WorkflowResult<Application> {
        self.load(id).await
    }

    async fn load(&self, id: &ApplicationId) -> WorkflowResult<Application> {
        let application = self
            .applications
            .get_application(id)
            .await?
            .ok_or_else(|| WorkflowError::ApplicationNotFound(id.clone()))?;
        application.verify_history()?;
        Ok(application)
    }

    async fn create(&self, application: &Application) -> WorkflowResult<()> {
        let mut attempt = 1;
        loop {
            match self
                .applications
                .create_application(application.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(err @ StorageError::Conflict(_)) if attempt > 1 => {
                    // An earlier attempt may have landed before its reply was lost.
                    let stored = self.applications.get_application(&application.id).await?;
                    if stored.as_ref() == Some(application) {
                        return Ok(());
                    }
                    return Err(err.into());
                }
                Err(err) if err.is_transient() && attempt < self.persistence.max_attempts => {
                    self.pause(attempt, &application.id, &err).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn commit(&self, transition: &Transition) -> WorkflowResult<()> {
        let application = &transition.application;
        let expected = transition.expected_version();
        let mut attempt = 1;
        loop {
            match self
                .applications
                .put_application(application, expected)
                .await
            {
                Ok(()) => return Ok(()),
                Err(err @ StorageError::Stale { .. }) if attempt > 1 => {
                    if self.landed(transition).await? {
                        debug!(
                            application_id = %application.id,
                            sequence = transition.entry.sequence,
                            "Earlier attempt had committed"
                        );
                        return Ok(());
                    }
                    return Err(err.into());
                }
                Err(err) if err.is_transient() && attempt < self.persistence.max_attempts => {
                    self.pause(attempt, &application.id, &err).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Whether the stored record already holds this transition's entry
    async fn landed(&self, transition: &Transition) -> WorkflowResult<bool> {
        let stored = self
            .applications
            .get_application(&transition.application.id)
            .await?;
        Ok(stored.map_or(false, |s| {
            s.history.get(transition.entry.sequence as usize) == Some(&transition.entry)
        }))
    }

    async fn pause(&self, attempt: u32, id: &ApplicationId, err: &StorageError) {
        let delay = self.persistence.delay_for(attempt);
        warn!(
            application_id = %id,
            attempt,
            max_attempts = self.persistence.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Persistence failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }

    async fn issue_after_completion(&self, application: &Application) -> Option<Certificate> {
        let mut attempt = 1;
        loop {
            match self.issuer.issue(application).await {
                Ok(certificate) => return Some(certificate),
                Err(err) if err.is_retryable() && attempt < self.persistence.max_attempts => {
                    let delay = self.persistence.delay_for(attempt);
                    warn!(
                        application_id = %application.id,
                        attempt,
                        error = %err,
                        "Certificate issuance failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        application_id = %application.id,
                        error = %err,
                        "Certificate issuance failed; application remains completed"
                    );
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticDirectory;
    use crate::render::JsonCertificateRenderer;
    use async_trait::async_trait;
    use certflow_storage::{InMemoryStore, StorageResult};
    use certflow_types::{Actor, CurrentStage, Role, Stage};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Wraps the in-memory store and fails writes on demand
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStore,
        /// Puts that fail before reaching the store
        fail_before: AtomicU32,
        /// Puts that reach the store but report failure
        fail_after: AtomicU32,
        puts: AtomicU32,
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    #[async_trait]
    impl ApplicationStore for FlakyStore {
        async fn create_application(&self, application: Application) -> StorageResult<()> {
            self.inner.create_application(application).await
        }

        async fn get_application(&self, id: &ApplicationId) -> StorageResult<Option<Application>> {
            self.inner.get_application(id).await
        }

        async fn put_application(
            &self,
            application: &Application,
            expected_version: u64,
        ) -> StorageResult<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if take(&self.fail_before) {
                return Err(StorageError::Backend("connection reset".into()));
            }
            self.inner.put_application(application, expected_version).await?;
            if take(&self.fail_after) {
                return Err(StorageError::Backend("response lost".into()));
            }
            Ok(())
        }

        async fn list_applications(
            &self,
            filter: &ApplicationFilter,
            window: QueryWindow,
        ) -> StorageResult<Vec<Application>> {
            self.inner.list_applications(filter, window).await
        }
    }

    #[async_trait]
    impl CertificateStore for FlakyStore {
        async fn certificate_for_application(
            &self,
            application_id: &ApplicationId,
        ) -> StorageResult<Option<Certificate>> {
            self.inner.certificate_for_application(application_id).await
        }

        async fn get_certificate(&self, id: &CertificateId) -> StorageResult<Option<Certificate>> {
            self.inner.get_certificate(id).await
        }

        async fn insert_certificate(&self, certificate: Certificate) -> StorageResult<Certificate> {
            self.inner.insert_certificate(certificate).await
        }
    }

    fn directory() -> StaticDirectory {
        StaticDirectory::new()
            .with_actor(Actor::new("applicant-1", "Lakshmi Devi", Role::Applicant))
            .with_actor(Actor::new("svro-1", "Ramesh", Role::Svro))
            .with_actor(Actor::new("mvro-1", "Anjali", Role::Mvro))
            .with_actor(Actor::new("ri-1", "Kiran", Role::Ri))
            .with_actor(Actor::new("mro-1", "Srinivas Rao", Role::Mro))
            .with_actor(Actor::new("admin-1", "Collectorate", Role::Admin))
    }

    fn config() -> WorkflowConfig {
        let mut config = WorkflowConfig::default();
        config.persistence.initial_backoff_ms = 1;
        config.persistence.max_backoff_ms = 2;
        config
    }

    fn handler(store: Arc<FlakyStore>) -> ReviewHandler {
        ReviewHandler::new(
            &config(),
            store,
            Arc::new(directory()),
            Arc::new(JsonCertificateRenderer),
        )
        .unwrap()
    }

    fn id(s: &str) -> ActorId {
        ActorId::new(s)
    }

    fn details() -> ApplicantDetails {
        ApplicantDetails::new("Lakshmi Devi", "123412341234", "BC-A")
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let store = Arc::new(FlakyStore::default());
        let handler = handler(store.clone());
        let app = handler.submit(&id("applicant-1"), details()).await.unwrap();

        store.fail_before.store(1, Ordering::SeqCst);
        let outcome = handler
            .act(&app.id, &id("svro-1"), ReviewAction::approve())
            .await
            .unwrap();

        assert_eq!(store.puts.load(Ordering::SeqCst), 2);
        let stored = handler.application(&app.id).await.unwrap();
        assert_eq!(stored.history.len(), 1);
        assert_eq!(stored, outcome.application);
    }

    #[tokio::test]
    async fn test_lost_reply_is_not_duplicated() {
        let store = Arc::new(FlakyStore::default());
        let handler = handler(store.clone());
        let app = handler.submit(&id("applicant-1"), details()).await.unwrap();

        store.fail_after.store(1, Ordering::SeqCst);
        let outcome = handler
            .act(&app.id, &id("svro-1"), ReviewAction::approve())
            .await
            .unwrap();

        let stored = handler.application(&app.id).await.unwrap();
        assert_eq!(stored.history.len(), 1);
        assert_eq!(stored.version, 1);
        assert_eq!(stored.history[0], outcome.entry);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_persistence_failure() {
        let store = Arc::new(FlakyStore::default());
        let handler = handler(store.clone());
        let app = handler.submit(&id("applicant-1"), details()).await.unwrap();

        store.fail_before.store(10, Ordering::SeqCst);
        let err = handler
            .act(&app.id, &id("svro-1"), ReviewAction::approve())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::PersistenceFailure(_)));
        assert_eq!(store.puts.load(Ordering::SeqCst), 3);

        let stored = handler.application(&app.id).await.unwrap();
        assert!(stored.history.is_empty());
        assert_eq!(stored.current_stage(), CurrentStage::Reviewing(Stage::Svro));
    }

    #[tokio::test]
    async fn test_completion_issues_certificate() {
        let store = Arc::new(FlakyStore::default());
        let handler = handler(store.clone());
        let app = handler.submit(&id("applicant-1"), details()).await.unwrap();

        let mut last = None;
        for officer in ["svro-1", "mvro-1", "ri-1", "mro-1"] {
            last = Some(
                handler
                    .act(&app.id, &id(officer), ReviewAction::approve())
                    .await
                    .unwrap(),
            );
        }
        let outcome = last.unwrap();
        assert_eq!(outcome.application.status(), Status::Completed);
        let certificate = outcome.certificate.expect("certificate issued on completion");
        assert_eq!(certificate.issuing_officer.id, id("mro-1"));

        let again = handler.issue_certificate(&app.id).await.unwrap();
        assert_eq!(again, certificate);
        assert_eq!(store.inner.certificate_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_actor_and_application() {
        let handler = handler(Arc::new(FlakyStore::default()));
        let err = handler
            .submit(&id("stranger"), details())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownActor(_)));

        let err = handler
            .act(&ApplicationId::new("nope"), &id("svro-1"), ReviewAction::approve())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ApplicationNotFound(_)));
    }

    #[tokio::test]
    async fn test_queue_by_role() {
        let handler = handler(Arc::new(FlakyStore::default()));
        let first = handler.submit(&id("applicant-1"), details()).await.unwrap();
        let second = handler.submit(&id("applicant-1"), details()).await.unwrap();
        handler
            .act(&second.id, &id("svro-1"), ReviewAction::approve())
            .await
            .unwrap();

        let svro = handler.queue_for(&id("svro-1"), QueryWindow::default()).await.unwrap();
        assert_eq!(svro.iter().map(|a| &a.id).collect::<Vec<_>>(), vec![&first.id]);

        let mvro = handler.queue_for(&id("mvro-1"), QueryWindow::default()).await.unwrap();
        assert_eq!(mvro.len(), 1);
        assert_eq!(mvro[0].id, second.id);

        let admin = handler.queue_for(&id("admin-1"), QueryWindow::default()).await.unwrap();
        assert_eq!(admin.len(), 2);

        let own = handler
            .queue_for(&id("applicant-1"), QueryWindow::first(1))
            .await
            .unwrap();
        assert_eq!(own.len(), 1);
    }

    #[tokio::test]
    async fn test_tampered_history_is_refused() {
        let store = Arc::new(FlakyStore::default());
        let review = handler(store.clone());
        let app = review.submit(&id("applicant-1"), details()).await.unwrap();
        let outcome = review
            .act(&app.id, &id("svro-1"), ReviewAction::approve())
            .await
            .unwrap();

        let mut forged = outcome.application.clone();
        forged.history[0].remarks = Some("approved by someone else".into());
        forged.version += 1;
        // the store refuses history rewrites, so plant the record directly
        let fresh = Arc::new(FlakyStore::default());
        fresh.inner.create_application(forged).await.unwrap();
        let err = handler(fresh).application(&app.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::HistoryTampered(0)));
    }

    #[tokio::test]
    async fn test_out_of_range_validity_is_rejected() {
        let mut config = config();
        config.certificate.validity_days = 200_000_000;
        let result = ReviewHandler::new(
            &config,
            Arc::new(FlakyStore::default()),
            Arc::new(directory()),
            Arc::new(JsonCertificateRenderer),
        );
        assert!(matches!(result, Err(WorkflowError::Validation(_))));

        config.certificate.validity_days = 30;
        config.certificate.renewal_window_days = 60;
        let result = ReviewHandler::new(
            &config,
            Arc::new(FlakyStore::default()),
            Arc::new(directory()),
            Arc::new(JsonCertificateRenderer),
        );
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
    }

    #[tokio::test]
    async fn test_zero_attempts_is_rejected() {
        let mut config = config();
        config.persistence.max_attempts = 0;
        let result = ReviewHandler::new(
            &config,
            Arc::new(FlakyStore::default()),
            Arc::new(directory()),
            Arc::new(JsonCertificateRenderer),
        );
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
    }
}
