//! Application records: the entity routed through the review stages
//!
//! An [`Application`] tracks where it stands (`state`), who has acted on
//! it (`history`), the outstanding recheck if any, and every version of
//! the applicant's details. Nothing recorded here is ever rewritten:
//! history only grows and amended details push the previous version
//! onto `superseded_details`.

use crate::{
    verify_chain, ActionKind, Actor, ActorId, ApplicationId, CertificateId, CurrentStage,
    HistoryEntry, Stage, Status, WorkflowError, WorkflowResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Applicant details ────────────────────────────────────────────────

/// Postal address captured on the application form
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub house: String,
    pub village: String,
    pub mandal: String,
    pub district: String,
    pub pincode: String,
}

/// Snapshot of the applicant's personal details at submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantDetails {
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardian_name: Option<String>,
    /// National identity number
    pub national_id: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub caste: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_caste: Option<String>,
    #[serde(default)]
    pub address: Address,
    /// Additional form fields not modelled explicitly
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ApplicantDetails {
    pub fn new(
        full_name: impl Into<String>,
        national_id: impl Into<String>,
        caste: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            guardian_name: None,
            national_id: national_id.into(),
            phone: String::new(),
            email: None,
            caste: caste.into(),
            sub_caste: None,
            address: Address::default(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Check the fields every certificate needs
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.full_name.trim().is_empty() {
            return Err(WorkflowError::Validation("applicant name is required".into()));
        }
        if self.caste.trim().is_empty() {
            return Err(WorkflowError::Validation("caste is required".into()));
        }
        let national_id = self.national_id.trim();
        if national_id.is_empty() || !national_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(WorkflowError::Validation(
                "national ID must be a non-empty alphanumeric value".into(),
            ));
        }
        if !self.phone.is_empty() && !self.phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(WorkflowError::Validation("phone must contain digits only".into()));
        }
        Ok(())
    }
}

/// A previous version of the applicant's details
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsVersion {
    pub version: u32,
    pub details: ApplicantDetails,
    pub superseded_at: DateTime<Utc>,
}

// ── State ────────────────────────────────────────────────────────────

/// Lifecycle state of an application
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "UPPERCASE")]
pub enum ApplicationState {
    /// Awaiting review at a stage
    Pending { stage: Stage },
    Rejected,
    Completed,
}

impl ApplicationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApplicationState::Pending { .. })
    }

    pub fn pending_stage(&self) -> Option<Stage> {
        match self {
            ApplicationState::Pending { stage } => Some(*stage),
            _ => None,
        }
    }
}

// ── Recheck ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecheckStatus {
    Pending,
    Completed,
}

/// A request for an earlier stage to re-verify the application
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecheckRequest {
    pub status: RecheckStatus,
    pub description: String,
    /// Stage that asked for the recheck
    pub raised_by: Stage,
    /// Stage asked to re-verify
    pub target: Stage,
    pub raised_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl RecheckRequest {
    pub fn is_outstanding(&self) -> bool {
        self.status == RecheckStatus::Pending
    }
}

// ── Reports ──────────────────────────────────────────────────────────

/// Verification report filed by a stage reviewer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub author: ActorId,
    pub body: String,
    pub submitted_at: DateTime<Utc>,
}

// ── Application ──────────────────────────────────────────────────────

/// A certificate application
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    /// The applicant who submitted the form
    pub submitted_by: ActorId,
    /// Current version of the applicant's details
    pub details: ApplicantDetails,
    /// Version number of `details`, starting at 1
    pub details_version: u32,
    /// Earlier versions of the details, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub superseded_details: Vec<DetailsVersion>,
    pub state: ApplicationState,
    /// Append-only audit trail
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// The most recent recheck, outstanding or completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recheck: Option<RecheckRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<StageReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Certificate this application renews, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_of: Option<CertificateId>,
    /// Optimistic concurrency counter, bumped by every accepted action
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Create a freshly submitted application pending at `first_stage`
    pub fn new(
        submitted_by: ActorId,
        details: ApplicantDetails,
        first_stage: Stage,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApplicationId::generate(),
            submitted_by,
            details,
            details_version: 1,
            superseded_details: Vec::new(),
            state: ApplicationState::Pending { stage: first_stage },
            history: Vec::new(),
            recheck: None,
            reports: Vec::new(),
            rejection_reason: None,
            renewal_of: None,
            version: 0,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn with_id(mut self, id: ApplicationId) -> Self {
        self.id = id;
        self
    }

    pub fn with_renewal_of(mut self, certificate: CertificateId) -> Self {
        self.renewal_of = Some(certificate);
        self
    }

    // ── Query methods ────────────────────────────────────────────────

    pub fn current_stage(&self) -> CurrentStage {
        match self.state {
            ApplicationState::Pending { stage } => CurrentStage::Reviewing(stage),
            ApplicationState::Rejected => CurrentStage::Rejected,
            ApplicationState::Completed => CurrentStage::Completed,
        }
    }

    pub fn status(&self) -> Status {
        match self.state {
            ApplicationState::Pending { .. } => Status::Pending,
            ApplicationState::Rejected => Status::Rejected,
            ApplicationState::Completed => Status::Completed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn outstanding_recheck(&self) -> Option<&RecheckRequest> {
        self.recheck.as_ref().filter(|r| r.is_outstanding())
    }

    pub fn has_outstanding_recheck(&self) -> bool {
        self.outstanding_recheck().is_some()
    }

    /// Whether any stage has signed off yet
    pub fn has_approvals(&self) -> bool {
        self.history.iter().any(|e| e.action == ActionKind::Approve)
    }

    /// Per-stage standing: `Approved` once a stage signed off, `Rejected`
    /// if it rejected, `Pending` while it holds the application, `None`
    /// if the application never reached it.
    pub fn stage_status(&self, stage: Stage) -> Option<Status> {
        for entry in self.history.iter().filter(|e| e.stage == stage) {
            match entry.action {
                ActionKind::Approve => return Some(Status::Approved),
                ActionKind::Reject => return Some(Status::Rejected),
                _ => {}
            }
        }
        (self.state.pending_stage() == Some(stage)).then_some(Status::Pending)
    }

    /// The approval that completed the application
    pub fn final_approval(&self) -> Option<&HistoryEntry> {
        if self.state != ApplicationState::Completed {
            return None;
        }
        self.history
            .iter()
            .rev()
            .find(|e| e.action == ActionKind::Approve)
    }

    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    pub fn reports_for(&self, stage: Stage) -> Vec<&StageReport> {
        self.reports.iter().filter(|r| r.stage == stage).collect()
    }

    /// Verify the hash links of the full history
    pub fn verify_history(&self) -> WorkflowResult<()> {
        verify_chain(&self.history)
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Append a history entry for an accepted action and bump the version.
    ///
    /// Callers must have validated the action; this only records it.
    pub fn record(
        &mut self,
        stage: Stage,
        actor: &Actor,
        action: ActionKind,
        remarks: Option<String>,
        at: DateTime<Utc>,
    ) -> HistoryEntry {
        let entry = HistoryEntry::seal(
            self.history.len() as u64,
            stage,
            actor.id.clone(),
            actor.role,
            action,
            remarks,
            at,
            self.history.last().map(|e| e.hash.clone()),
        );
        self.history.push(entry.clone());
        self.version += 1;
        self.updated_at = at;
        entry
    }

    /// Replace the current details, keeping the previous version
    pub fn amend_details(&mut self, details: ApplicantDetails, at: DateTime<Utc>) {
        let previous = std::mem::replace(&mut self.details, details);
        self.superseded_details.push(DetailsVersion {
            version: self.details_version,
            details: previous,
            superseded_at: at,
        });
        self.details_version += 1;
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn make_application() -> Application {
        Application::new(
            ActorId::new("applicant-1"),
            ApplicantDetails::new("Lakshmi Devi", "123412341234", "BC-A"),
            Stage::Svro,
            Utc::now(),
        )
    }

    #[test]
    fn test_new_application_is_pending_at_first_stage() {
        let app = make_application();
        assert_eq!(app.current_stage(), CurrentStage::Reviewing(Stage::Svro));
        assert_eq!(app.status(), Status::Pending);
        assert_eq!(app.version, 0);
        assert!(app.history.is_empty());
        assert!(!app.is_terminal());
    }

    #[test]
    fn test_record_links_history_and_bumps_version() {
        let mut app = make_application();
        let svro = Actor::new("svro-1", "Ravi", Role::Svro);
        let first = app.record(Stage::Svro, &svro, ActionKind::SubmitReport, None, Utc::now());
        let second = app.record(Stage::Svro, &svro, ActionKind::Approve, None, Utc::now());

        assert_eq!(app.version, 2);
        assert_eq!(second.previous_hash.as_deref(), Some(first.hash.as_str()));
        assert!(app.verify_history().is_ok());
    }

    #[test]
    fn test_stage_status_view() {
        let mut app = make_application();
        let svro = Actor::new("svro-1", "Ravi", Role::Svro);
        app.record(Stage::Svro, &svro, ActionKind::Approve, None, Utc::now());
        app.state = ApplicationState::Pending { stage: Stage::Mvro };

        assert_eq!(app.stage_status(Stage::Svro), Some(Status::Approved));
        assert_eq!(app.stage_status(Stage::Mvro), Some(Status::Pending));
        assert_eq!(app.stage_status(Stage::Ri), None);
    }

    #[test]
    fn test_amend_keeps_previous_version() {
        let mut app = make_application();
        let corrected = ApplicantDetails::new("Lakshmi Devi K", "123412341234", "BC-A");
        app.amend_details(corrected.clone(), Utc::now());

        assert_eq!(app.details, corrected);
        assert_eq!(app.details_version, 2);
        assert_eq!(app.superseded_details.len(), 1);
        assert_eq!(app.superseded_details[0].version, 1);
        assert_eq!(app.superseded_details[0].details.full_name, "Lakshmi Devi");
    }

    #[test]
    fn test_details_validation() {
        assert!(ApplicantDetails::new("A", "X12", "OC").validate().is_ok());
        assert!(ApplicantDetails::new("", "X12", "OC").validate().is_err());
        assert!(ApplicantDetails::new("A", "12-34", "OC").validate().is_err());
        assert!(ApplicantDetails::new("A", "1234", "OC")
            .with_phone("98x")
            .validate()
            .is_err());
    }

    #[test]
    fn test_state_wire_format() {
        let json = serde_json::to_value(ApplicationState::Pending { stage: Stage::Ri }).unwrap();
        assert_eq!(json["state"], "PENDING");
        assert_eq!(json["stage"], "RI");
        let done: ApplicationState = serde_json::from_str(r#"{"state":"COMPLETED"}"#).unwrap();
        assert!(done.is_terminal());
    }
}
