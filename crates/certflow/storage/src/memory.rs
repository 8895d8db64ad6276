//! In-memory reference implementation of the storage traits.
//!
//! Deterministic and test-friendly. Version checks and certificate
//! insert-if-absent happen under a single write lock, so concurrent
//! callers observe the same guarantees a transactional backend gives.

use crate::traits::{ApplicationFilter, ApplicationStore, CertificateStore, QueryWindow};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use certflow_types::{Application, ApplicationId, Certificate, CertificateId};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory certflow storage adapter.
#[derive(Default)]
pub struct InMemoryStore {
    applications: RwLock<HashMap<ApplicationId, Application>>,
    certificates: RwLock<Certificates>,
}

#[derive(Default)]
struct Certificates {
    by_id: HashMap<CertificateId, Certificate>,
    by_application: HashMap<ApplicationId, CertificateId>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn application_count(&self) -> usize {
        self.applications.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn certificate_count(&self) -> usize {
        self.certificates.read().map(|g| g.by_id.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ApplicationStore for InMemoryStore {
    async fn create_application(&self, application: Application) -> StorageResult<()> {
        let mut guard = self
            .applications
            .write()
            .map_err(|_| StorageError::Backend("applications lock poisoned".to_string()))?;

        if guard.contains_key(&application.id) {
            return Err(StorageError::Conflict(format!(
                "application {} already exists",
                application.id
            )));
        }
        guard.insert(application.id.clone(), application);
        Ok(())
    }

    async fn get_application(&self, id: &ApplicationId) -> StorageResult<Option<Application>> {
        let guard = self
            .applications
            .read()
            .map_err(|_| StorageError::Backend("applications lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn put_application(
        &self,
        application: &Application,
        expected_version: u64,
    ) -> StorageResult<()> {
        let mut guard = self
            .applications
            .write()
            .map_err(|_| StorageError::Backend("applications lock poisoned".to_string()))?;
        let stored = guard.get_mut(&application.id).ok_or_else(|| {
            StorageError::NotFound(format!("application {} not found", application.id))
        })?;

        if stored.version != expected_version {
            return Err(StorageError::Stale {
                id: application.id.clone(),
                expected: expected_version,
                found: stored.version,
            });
        }
        check_successor(stored, application)?;

        *stored = application.clone();
        Ok(())
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<Application>> {
        let guard = self
            .applications
            .read()
            .map_err(|_| StorageError::Backend("applications lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(apply_window(values, window))
    }
}

#[async_trait]
impl CertificateStore for InMemoryStore {
    async fn certificate_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> StorageResult<Option<Certificate>> {
        let guard = self
            .certificates
            .read()
            .map_err(|_| StorageError::Backend("certificates lock poisoned".to_string()))?;
        Ok(guard
            .by_application
            .get(application_id)
            .and_then(|id| guard.by_id.get(id))
            .cloned())
    }

    async fn get_certificate(&self, id: &CertificateId) -> StorageResult<Option<Certificate>> {
        let guard = self
            .certificates
            .read()
            .map_err(|_| StorageError::Backend("certificates lock poisoned".to_string()))?;
        Ok(guard.by_id.get(id).cloned())
    }

    async fn insert_certificate(&self, certificate: Certificate) -> StorageResult<Certificate> {
        let mut guard = self
            .certificates
            .write()
            .map_err(|_| StorageError::Backend("certificates lock poisoned".to_string()))?;

        if let Some(existing) = guard
            .by_application
            .get(&certificate.application_id)
            .and_then(|id| guard.by_id.get(id))
        {
            return Ok(existing.clone());
        }

        guard
            .by_application
            .insert(certificate.application_id.clone(), certificate.id.clone());
        guard.by_id.insert(certificate.id.clone(), certificate.clone());
        Ok(certificate)
    }
}

/// A replacement record must be the stored record's direct successor:
/// one version later and with the stored history as an untouched prefix.
pub(crate) fn check_successor(stored: &Application, next: &Application) -> StorageResult<()> {
    if next.version != stored.version + 1 {
        return Err(StorageError::InvalidInput(format!(
            "application {} must advance from version {} to {}, got {}",
            next.id,
            stored.version,
            stored.version + 1,
            next.version
        )));
    }
    if next.history.len() < stored.history.len()
        || next.history[..stored.history.len()] != stored.history[..]
    {
        return Err(StorageError::InvariantViolation(format!(
            "application {} history must only be appended to",
            next.id
        )));
    }
    Ok(())
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}
