//! Certificate issuance for completed applications

use crate::config::CertificateConfig;
use crate::identity::IdentityProvider;
use crate::render::{document_digest, CertificateRenderer};
use certflow_storage::CertificateStore;
use certflow_types::{
    derive_serial, Application, Certificate, CertificateId, IssuingOfficer, Status,
    WorkflowError, WorkflowResult,
};
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Issues at most one certificate per completed application
pub struct CertificateIssuer {
    store: Arc<dyn CertificateStore>,
    identity: Arc<dyn IdentityProvider>,
    renderer: Arc<dyn CertificateRenderer>,
    config: CertificateConfig,
}

impl CertificateIssuer {
    pub fn new(
        store: Arc<dyn CertificateStore>,
        identity: Arc<dyn IdentityProvider>,
        renderer: Arc<dyn CertificateRenderer>,
        config: CertificateConfig,
    ) -> Self {
        Self {
            store,
            identity,
            renderer,
            config,
        }
    }

    /// Issue the certificate for `application`, or return the one already
    /// issued. Every field derives from the application record, so repeated
    /// calls compute the same certificate.
    pub async fn issue(&self, application: &Application) -> WorkflowResult<Certificate> {
        if application.status() != Status::Completed {
            return Err(WorkflowError::InvalidTransition(format!(
                "certificate requires a completed application, {} is {}",
                application.id,
                application.status()
            )));
        }

        if let Some(existing) = self
            .store
            .certificate_for_application(&application.id)
            .await?
        {
            debug!(
                application_id = %application.id,
                certificate_id = %existing.id,
                "Certificate already issued"
            );
            return Ok(existing);
        }

        let approval = application.final_approval().ok_or_else(|| {
            WorkflowError::InvalidTransition(format!(
                "completed application {} has no final approval",
                application.id
            ))
        })?;

        let officer_name = match self.identity.resolve(&approval.actor).await {
            Ok(officer) => officer.name,
            Err(err) => {
                warn!(
                    officer = %approval.actor,
                    error = %err,
                    "Issuing officer not in directory, using id on certificate"
                );
                approval.actor.to_string()
            }
        };

        let issued_at = approval.timestamp;
        let valid_until = Duration::try_days(self.config.validity_days)
            .and_then(|validity| issued_at.checked_add_signed(validity))
            .ok_or_else(|| {
                WorkflowError::Validation(format!(
                    "certificate validity of {} days is out of range",
                    self.config.validity_days
                ))
            })?;
        let mut certificate = Certificate {
            id: CertificateId::generate(),
            application_id: application.id.clone(),
            serial_number: derive_serial(&self.config.serial_prefix, &application.id, issued_at),
            applicant: application.details.clone(),
            holder: application.submitted_by.clone(),
            issuing_officer: IssuingOfficer {
                id: approval.actor.clone(),
                name: officer_name,
            },
            issued_at,
            valid_until,
            document_digest: String::new(),
            media_type: self.renderer.media_type().to_string(),
            renewal_of: application.renewal_of.clone(),
        };
        let rendered = self.renderer.render(&certificate.document())?;
        certificate.document_digest = document_digest(&rendered);

        let candidate = certificate.id.clone();
        let stored = self.store.insert_certificate(certificate).await?;
        if stored.id == candidate {
            info!(
                application_id = %application.id,
                certificate_id = %stored.id,
                serial = %stored.serial_number,
                "Certificate issued"
            );
        } else {
            debug!(
                application_id = %application.id,
                certificate_id = %stored.id,
                "Concurrent issuance resolved to the stored certificate"
            );
        }
        Ok(stored)
    }

    /// Look up an issued certificate
    pub async fn certificate(&self, id: &CertificateId) -> WorkflowResult<Certificate> {
        self.store
            .get_certificate(id)
            .await?
            .ok_or_else(|| WorkflowError::CertificateNotFound(id.to_string()))
    }

    /// Render the document for an issued certificate
    pub fn render(&self, certificate: &Certificate) -> WorkflowResult<Vec<u8>> {
        self.renderer.render(&certificate.document())
    }

    pub fn config(&self) -> &CertificateConfig {
        &self.config
    }
}
