//! Error types for the certificate workflow

use crate::{ApplicationId, Role, Stage};

/// Errors that can occur in workflow operations
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Role {role} may not act on an application at stage {stage}")]
    Unauthorized { role: Role, stage: String },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Stale state for application {id}: expected version {expected}, found {found}")]
    StaleState {
        id: ApplicationId,
        expected: u64,
        found: u64,
    },

    #[error("A recheck is already outstanding for application {0}")]
    DuplicateRecheck(ApplicationId),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Application not found: {0}")]
    ApplicationNotFound(ApplicationId),

    #[error("Certificate not found: {0}")]
    CertificateNotFound(String),

    #[error("Unknown actor: {0}")]
    UnknownActor(String),

    #[error("History chain broken at entry {0}")]
    HistoryTampered(u64),

    #[error("Certificate rendering failed: {0}")]
    Rendering(String),
}

impl WorkflowError {
    pub fn unauthorized(role: Role, stage: Stage) -> Self {
        Self::Unauthorized {
            role,
            stage: stage.to_string(),
        }
    }

    /// Whether the caller may retry the same request after refreshing
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleState { .. } | Self::PersistenceFailure(_))
    }

    /// Stable, lowercase name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::UnknownStage(_) => "unknown_stage",
            Self::StaleState { .. } => "stale_state",
            Self::DuplicateRecheck(_) => "duplicate_recheck",
            Self::PersistenceFailure(_) => "persistence_failure",
            Self::Validation(_) => "validation",
            Self::ApplicationNotFound(_) => "application_not_found",
            Self::CertificateNotFound(_) => "certificate_not_found",
            Self::UnknownActor(_) => "unknown_actor",
            Self::HistoryTampered(_) => "history_tampered",
            Self::Rendering(_) => "rendering",
        }
    }

    /// Message suitable for showing to the person who triggered the action
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { stage, .. } => {
                format!("This application is awaiting {} review; you cannot act on it.", stage)
            }
            Self::InvalidTransition(reason) => format!("This action is not allowed: {}.", reason),
            Self::UnknownStage(stage) => {
                format!("The review stage '{}' is not configured. Contact an administrator.", stage)
            }
            Self::StaleState { .. } => {
                "Another reviewer just updated this application. Please refresh and try again."
                    .to_string()
            }
            Self::DuplicateRecheck(_) => {
                "A recheck is already in progress for this application.".to_string()
            }
            Self::PersistenceFailure(_) => {
                "The service is temporarily unavailable. Your action was not lost; please retry."
                    .to_string()
            }
            Self::Validation(reason) => format!("Please correct the request: {}.", reason),
            Self::ApplicationNotFound(_) => "Application not found.".to_string(),
            Self::CertificateNotFound(_) => "Certificate not found.".to_string(),
            Self::UnknownActor(_) => "Your account could not be verified.".to_string(),
            Self::HistoryTampered(_) => {
                "The application record failed an integrity check. Contact an administrator."
                    .to_string()
            }
            Self::Rendering(_) => {
                "The certificate document could not be generated. Please try again later."
                    .to_string()
            }
        }
    }
}

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;
