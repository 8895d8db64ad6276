//! Review state machine
//!
//! Pure transition logic: given an application snapshot, an actor and a
//! requested action, either produce the successor record plus the history
//! entry it appended, or refuse with a typed error. Nothing here touches
//! storage or the clock; callers pass `at` explicitly.
//!
//! Checks run in a fixed order so that errors are predictable:
//! 1. terminal state (`InvalidTransition`)
//! 2. stage membership (`UnknownStage`)
//! 3. authorization (`Unauthorized`)
//! 4. input validation (`Validation`)
//! 5. recheck gating (`InvalidTransition` / `DuplicateRecheck`)

use crate::registry::{NextStage, StageRegistry};
use certflow_types::{
    Actor, ApplicantDetails, Application, ApplicationState, HistoryEntry, RecheckRequest,
    RecheckStatus, ReviewAction, Role, Stage, StageReport, WorkflowError, WorkflowResult,
};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Result of an accepted action: the successor record and its new entry
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub application: Application,
    pub entry: HistoryEntry,
}

impl Transition {
    /// Version the stored record must still carry for this transition to commit
    pub fn expected_version(&self) -> u64 {
        self.application.version - 1
    }

    pub fn completes(&self) -> bool {
        self.application.state == ApplicationState::Completed
    }
}

/// Applies review actions to applications
#[derive(Clone, Debug, Default)]
pub struct WorkflowEngine {
    registry: StageRegistry,
}

impl WorkflowEngine {
    pub fn new(registry: StageRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Open a new application for `applicant`, pending at the first stage.
    ///
    /// Submission itself records no history entry; the first entry is the
    /// first stage's action.
    pub fn open(
        &self,
        applicant: &Actor,
        details: ApplicantDetails,
        at: DateTime<Utc>,
    ) -> WorkflowResult<Application> {
        if applicant.role != Role::Applicant {
            return Err(WorkflowError::Unauthorized {
                role: applicant.role,
                stage: "submission".to_string(),
            });
        }
        details.validate()?;
        Ok(Application::new(
            applicant.id.clone(),
            details,
            self.registry.first_stage(),
            at,
        ))
    }

    /// Apply `action` by `actor` to `application`.
    ///
    /// On success the returned record has `version + 1` and exactly one more
    /// history entry. On failure nothing changes.
    pub fn apply(
        &self,
        application: &Application,
        actor: &Actor,
        action: &ReviewAction,
        at: DateTime<Utc>,
    ) -> WorkflowResult<Transition> {
        let stage = match application.state {
            ApplicationState::Pending { stage } => stage,
            ApplicationState::Rejected => {
                return Err(WorkflowError::InvalidTransition(
                    "application already rejected".into(),
                ))
            }
            ApplicationState::Completed => {
                return Err(WorkflowError::InvalidTransition(
                    "application already completed".into(),
                ))
            }
        };
        if !self.registry.contains(stage) {
            return Err(WorkflowError::UnknownStage(stage.to_string()));
        }

        let mut next = application.clone();
        let remarks = match action {
            ReviewAction::Approve { remarks } => {
                authorize_owner(actor, stage)?;
                ensure_no_recheck(application, "approve")?;
                next.state = match self.registry.next_stage(stage)? {
                    NextStage::Stage(following) => ApplicationState::Pending { stage: following },
                    NextStage::Completed => ApplicationState::Completed,
                };
                remarks.clone()
            }

            ReviewAction::Reject { reason } => {
                if !self.registry.is_valid_actor(actor.role, stage) {
                    return Err(WorkflowError::unauthorized(actor.role, stage));
                }
                let reason = required(reason, "rejection reason")?;
                ensure_no_recheck(application, "reject")?;
                next.state = ApplicationState::Rejected;
                next.rejection_reason = Some(reason.clone());
                Some(reason)
            }

            ReviewAction::RequestRecheck {
                description,
                target,
            } => {
                authorize_owner(actor, stage)?;
                let description = required(description, "recheck description")?;
                let target = self.recheck_target(stage, *target)?;
                if application.has_outstanding_recheck() {
                    return Err(WorkflowError::DuplicateRecheck(application.id.clone()));
                }
                next.recheck = Some(RecheckRequest {
                    status: RecheckStatus::Pending,
                    description: description.clone(),
                    raised_by: stage,
                    target,
                    raised_at: at,
                    completed_at: None,
                    resolution: None,
                });
                Some(description)
            }

            ReviewAction::CompleteRecheck { remarks } => {
                let recheck = application.outstanding_recheck().ok_or_else(|| {
                    WorkflowError::InvalidTransition("no recheck is outstanding".into())
                })?;
                if !(actor.role.owns(recheck.raised_by) || actor.role.owns(recheck.target)) {
                    return Err(WorkflowError::unauthorized(actor.role, stage));
                }
                if let Some(open) = next.recheck.as_mut() {
                    open.status = RecheckStatus::Completed;
                    open.completed_at = Some(at);
                    open.resolution = remarks.clone();
                }
                remarks.clone()
            }

            ReviewAction::SubmitReport { report } => {
                authorize_owner(actor, stage)?;
                let body = required(report, "report body")?;
                next.reports.push(StageReport {
                    stage,
                    author: actor.id.clone(),
                    body,
                    submitted_at: at,
                });
                None
            }

            ReviewAction::AmendDetails { details } => {
                if actor.role != Role::Applicant || actor.id != application.submitted_by {
                    return Err(WorkflowError::unauthorized(actor.role, stage));
                }
                details.validate()?;
                if application.has_approvals() && !application.has_outstanding_recheck() {
                    return Err(WorkflowError::InvalidTransition(
                        "details are locked once a stage has approved".into(),
                    ));
                }
                next.amend_details(details.clone(), at);
                Some(format!("details version {}", next.details_version))
            }
        };

        let entry = next.record(stage, actor, action.kind(), remarks, at);
        debug!(
            application_id = %application.id,
            stage = %stage,
            action = entry.action.as_str(),
            actor = %actor.id,
            version = next.version,
            "Transition accepted"
        );

        Ok(Transition {
            application: next,
            entry,
        })
    }

    /// Resolve where a recheck raised at `stage` should go. An explicit target
    /// must not lie after the raising stage; the default is the previous
    /// stage, or the raising stage itself when it is the first.
    fn recheck_target(&self, stage: Stage, target: Option<Stage>) -> WorkflowResult<Stage> {
        match target {
            Some(target) => {
                if self.registry.position(target)? > self.registry.position(stage)? {
                    return Err(WorkflowError::Validation(format!(
                        "recheck target {} comes after the current stage {}",
                        target, stage
                    )));
                }
                Ok(target)
            }
            None => Ok(self.registry.previous_stage(stage)?.unwrap_or(stage)),
        }
    }
}

fn authorize_owner(actor: &Actor, stage: Stage) -> WorkflowResult<()> {
    if actor.role.owns(stage) {
        Ok(())
    } else {
        Err(WorkflowError::unauthorized(actor.role, stage))
    }
}

fn ensure_no_recheck(application: &Application, action: &str) -> WorkflowResult<()> {
    if application.has_outstanding_recheck() {
        return Err(WorkflowError::InvalidTransition(format!(
            "cannot {} while a recheck is outstanding",
            action
        )));
    }
    Ok(())
}

fn required(value: &str, what: &str) -> WorkflowResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::Validation(format!("{} must not be empty", what)));
    }
    Ok(trimmed.to_string())
}
