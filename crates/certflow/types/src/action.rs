//! Actions an actor may request against an application

use crate::{ActionKind, ActorId, ApplicantDetails, Role, Stage};
use serde::{Deserialize, Serialize};

/// An authenticated actor as resolved by the identity collaborator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: ActorId::new(id),
            name: name.into(),
            role,
        }
    }
}

/// A review action requested against an application
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    /// Sign off the current stage
    Approve {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remarks: Option<String>,
    },
    /// End the application; the reason is mandatory
    Reject { reason: String },
    /// Ask an earlier stage (or the current one) to re-verify
    RequestRecheck {
        description: String,
        /// Defaults to the stage before the current one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Stage>,
    },
    /// Close the outstanding recheck
    CompleteRecheck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remarks: Option<String>,
    },
    /// Attach a verification report for the current stage
    SubmitReport { report: String },
    /// Applicant correction of their details; stored as a new version
    AmendDetails { details: ApplicantDetails },
}

impl ReviewAction {
    pub fn approve() -> Self {
        Self::Approve { remarks: None }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Reject {
            reason: reason.into(),
        }
    }

    pub fn request_recheck(description: impl Into<String>) -> Self {
        Self::RequestRecheck {
            description: description.into(),
            target: None,
        }
    }

    pub fn complete_recheck() -> Self {
        Self::CompleteRecheck { remarks: None }
    }

    pub fn submit_report(report: impl Into<String>) -> Self {
        Self::SubmitReport {
            report: report.into(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Approve { .. } => ActionKind::Approve,
            Self::Reject { .. } => ActionKind::Reject,
            Self::RequestRecheck { .. } => ActionKind::RequestRecheck,
            Self::CompleteRecheck { .. } => ActionKind::CompleteRecheck,
            Self::SubmitReport { .. } => ActionKind::SubmitReport,
            Self::AmendDetails { .. } => ActionKind::AmendDetails,
        }
    }
}
