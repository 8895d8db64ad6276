//! Review stages, actor roles and application statuses
//!
//! All three are closed enums. Parsing from strings is case-insensitive
//! and happens once, at the boundary.

use crate::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ── Stage ────────────────────────────────────────────────────────────

/// A reviewing stage, named after the officer role that owns it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stage {
    /// Secretariat village revenue officer
    Svro,
    /// Mandal village revenue officer
    Mvro,
    /// Revenue inspector
    Ri,
    /// Mandal revenue officer
    Mro,
}

impl Stage {
    /// Every stage in the canonical review order
    pub const ALL: [Stage; 4] = [Stage::Svro, Stage::Mvro, Stage::Ri, Stage::Mro];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Svro => "SVRO",
            Stage::Mvro => "MVRO",
            Stage::Ri => "RI",
            Stage::Mro => "MRO",
        }
    }

    /// The role that owns this stage
    pub fn role(&self) -> Role {
        match self {
            Stage::Svro => Role::Svro,
            Stage::Mvro => Role::Mvro,
            Stage::Ri => Role::Ri,
            Stage::Mro => Role::Mro,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = WorkflowError;

    fn from_str(s: &str) -> WorkflowResult<Self> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| WorkflowError::UnknownStage(s.to_string()))
    }
}

// ── Role ─────────────────────────────────────────────────────────────

/// The role an authenticated actor holds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Applicant,
    Svro,
    Mvro,
    Ri,
    Mro,
    Admin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Applicant,
        Role::Svro,
        Role::Mvro,
        Role::Ri,
        Role::Mro,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Applicant => "APPLICANT",
            Role::Svro => "SVRO",
            Role::Mvro => "MVRO",
            Role::Ri => "RI",
            Role::Mro => "MRO",
            Role::Admin => "ADMIN",
        }
    }

    /// The stage this role reviews, if it is a reviewing role
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Role::Svro => Some(Stage::Svro),
            Role::Mvro => Some(Stage::Mvro),
            Role::Ri => Some(Stage::Ri),
            Role::Mro => Some(Stage::Mro),
            Role::Applicant | Role::Admin => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }

    /// Whether this role owns the given stage
    pub fn owns(&self, stage: Stage) -> bool {
        self.stage() == Some(stage)
    }
}

impl From<Stage> for Role {
    fn from(stage: Stage) -> Self {
        stage.role()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = WorkflowError;

    fn from_str(s: &str) -> WorkflowResult<Self> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| WorkflowError::Validation(format!("unknown role '{}'", s)))
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Coarse standing of an application, or of one stage's review of it.
///
/// An application as a whole is only ever `Pending`, `Rejected` or
/// `Completed`. `Approved` describes a single stage that has signed off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Approved => "APPROVED",
            Status::Rejected => "REJECTED",
            Status::Completed => "COMPLETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Rejected | Status::Completed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = WorkflowError;

    fn from_str(s: &str) -> WorkflowResult<Self> {
        [
            Status::Pending,
            Status::Approved,
            Status::Rejected,
            Status::Completed,
        ]
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| WorkflowError::Validation(format!("unknown status '{}'", s)))
    }
}

// ── Current stage ────────────────────────────────────────────────────

/// Who holds an application right now: a reviewing stage, or one of the
/// terminal markers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CurrentStage {
    Reviewing(Stage),
    Completed,
    Rejected,
}

impl CurrentStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurrentStage::Reviewing(stage) => stage.as_str(),
            CurrentStage::Completed => "COMPLETED",
            CurrentStage::Rejected => "REJECTED",
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            CurrentStage::Reviewing(stage) => Some(*stage),
            _ => None,
        }
    }
}

impl std::fmt::Display for CurrentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CurrentStage> for String {
    fn from(current: CurrentStage) -> Self {
        current.as_str().to_string()
    }
}

impl TryFrom<String> for CurrentStage {
    type Error = WorkflowError;

    fn try_from(value: String) -> WorkflowResult<Self> {
        value.parse()
    }
}

impl FromStr for CurrentStage {
    type Err = WorkflowError;

    fn from_str(s: &str) -> WorkflowResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" => Ok(CurrentStage::Completed),
            "REJECTED" => Ok(CurrentStage::Rejected),
            _ => s.parse().map(CurrentStage::Reviewing),
        }
    }
}
