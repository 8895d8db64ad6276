//! Engine configuration

use crate::StageRegistry;
use certflow_types::{Stage, WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Workflow engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Reviewing stages in order
    #[serde(default = "default_stages")]
    pub stages: Vec<Stage>,

    /// Persistence retry behaviour
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Certificate issuance settings
    #[serde(default)]
    pub certificate: CertificateConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            stages: default_stages(),
            persistence: PersistenceConfig::default(),
            certificate: CertificateConfig::default(),
        }
    }
}

impl WorkflowConfig {
    /// Build the stage registry described by this configuration
    pub fn registry(&self) -> WorkflowResult<StageRegistry> {
        StageRegistry::new(self.stages.clone())
    }

    /// Check the retry policy and certificate settings
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.persistence.max_attempts == 0 {
            return Err(WorkflowError::Validation(
                "persistence.max_attempts must be at least 1".into(),
            ));
        }
        self.certificate.validate()
    }
}

/// Retry policy for writes to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Total attempts per write, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound on the delay between retries in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl PersistenceConfig {
    /// Delay after the given failed attempt (1-based), doubling each time
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

/// Certificate issuance settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateConfig {
    /// Prefix of generated serial numbers
    #[serde(default = "default_serial_prefix")]
    pub serial_prefix: String,

    /// How long an issued certificate stays valid
    #[serde(default = "default_validity_days")]
    pub validity_days: i64,

    /// How many days before expiry renewal may be requested
    #[serde(default = "default_renewal_window")]
    pub renewal_window_days: i64,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            serial_prefix: default_serial_prefix(),
            validity_days: default_validity_days(),
            renewal_window_days: default_renewal_window(),
        }
    }
}

impl CertificateConfig {
    /// Longest validity period accepted, in days
    pub const MAX_VALIDITY_DAYS: i64 = 36_500;

    /// Validity must be positive and bounded; the renewal window must fit
    /// inside it.
    pub fn validate(&self) -> WorkflowResult<()> {
        if !(1..=Self::MAX_VALIDITY_DAYS).contains(&self.validity_days) {
            return Err(WorkflowError::Validation(format!(
                "certificate.validity_days must be between 1 and {}, got {}",
                Self::MAX_VALIDITY_DAYS,
                self.validity_days
            )));
        }
        if !(0..=self.validity_days).contains(&self.renewal_window_days) {
            return Err(WorkflowError::Validation(format!(
                "certificate.renewal_window_days must be between 0 and {}, got {}",
                self.validity_days, self.renewal_window_days
            )));
        }
        Ok(())
    }
}

// Default value helpers
fn default_stages() -> Vec<Stage> {
    Stage::ALL.to_vec()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    50
}

fn default_max_backoff() -> u64 {
    1_000
}

fn default_serial_prefix() -> String {
    "CC".to_string()
}

fn default_validity_days() -> i64 {
    365
}

fn default_renewal_window() -> i64 {
    30
}
