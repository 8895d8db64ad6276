//! Scripted replays of review sessions
//!
//! A script lists actors and a sequence of steps. Steps refer to
//! applications by a label chosen at submission, so scripts stay readable
//! and independent of generated ids:
//!
//! ```json
//! {
//!   "actors": [{ "id": "svro-1", "name": "Ramesh", "role": "SVRO" }],
//!   "steps": [
//!     { "op": "submit", "actor": "applicant-1", "label": "A1", "details": { ... } },
//!     { "op": "act", "actor": "svro-1", "application": "A1", "action": { "action": "APPROVE" } },
//!     { "op": "act", "actor": "ri-1", "application": "A1",
//!       "action": { "action": "REJECT", "reason": "" }, "expect_error": "validation" }
//!   ]
//! }
//! ```

use crate::error::{CliError, CliResult};
use certflow_engine::ReviewHandler;
use certflow_storage::QueryWindow;
use certflow_types::{
    Actor, ActorId, ApplicantDetails, ApplicationId, Certificate, CurrentStage, ReviewAction,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tabled::Tabled;
use tracing::debug;

/// A replay script
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Actors added to the identity directory for this run
    #[serde(default)]
    pub actors: Vec<Actor>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_path(path: &Path) -> CliResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let script: Script = serde_json::from_str(&raw)?;
        if script.steps.is_empty() {
            return Err(CliError::Script(format!("{} has no steps", path.display())));
        }
        Ok(script)
    }
}

/// One scripted step
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub op: Operation,

    /// Error kind the step must fail with, e.g. `invalid_transition`
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Submit {
        actor: ActorId,
        label: String,
        details: ApplicantDetails,
    },
    Act {
        actor: ActorId,
        application: String,
        action: ReviewAction,
    },
    Issue {
        application: String,
    },
    Renew {
        actor: ActorId,
        /// Label of the application whose certificate is renewed
        application: String,
        /// Label for the renewal application
        label: String,
    },
    Queue {
        actor: ActorId,
        #[serde(default)]
        expect_count: Option<usize>,
    },
    Expect {
        application: String,
        #[serde(default)]
        stage: Option<CurrentStage>,
        #[serde(default)]
        history_len: Option<usize>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Submit { .. } => "submit",
            Operation::Act { .. } => "act",
            Operation::Issue { .. } => "issue",
            Operation::Renew { .. } => "renew",
            Operation::Queue { .. } => "queue",
            Operation::Expect { .. } => "expect",
        }
    }
}

/// Outcome of one executed step
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct StepReport {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Op")]
    pub op: &'static str,
    #[tabled(rename = "Outcome")]
    pub outcome: String,
}

/// Runs scripts against a review handler
pub struct Replayer<'a> {
    handler: &'a ReviewHandler,
    labels: HashMap<String, ApplicationId>,
    certificates: HashMap<String, Certificate>,
    reports: Vec<StepReport>,
}

impl<'a> Replayer<'a> {
    pub fn new(handler: &'a ReviewHandler) -> Self {
        Self {
            handler,
            labels: HashMap::new(),
            certificates: HashMap::new(),
            reports: Vec::new(),
        }
    }

    /// Steps completed so far, including those before a failure
    pub fn reports(&self) -> &[StepReport] {
        &self.reports
    }

    /// Run every step, stopping at the first step that does not behave as
    /// scripted
    pub async fn run(&mut self, script: &Script) -> CliResult<()> {
        for (i, step) in script.steps.iter().enumerate() {
            let index = i + 1;
            debug!(step = index, op = step.op.name(), "Replaying step");

            let outcome = match (self.execute(&step.op).await, step.expect_error.as_deref()) {
                (Ok(outcome), None) => outcome,
                (Ok(_), Some(kind)) => {
                    return Err(step_failed(
                        index,
                        format!("expected a {} error but the step succeeded", kind),
                    ))
                }
                (Err(CliError::Workflow(err)), Some(kind)) if err.kind() == kind => {
                    format!("refused ({}): {}", kind, err.user_message())
                }
                (Err(CliError::Workflow(err)), Some(kind)) => {
                    return Err(step_failed(
                        index,
                        format!("expected a {} error, got {}: {}", kind, err.kind(), err),
                    ))
                }
                (Err(err), _) => return Err(step_failed(index, err.to_string())),
            };

            self.reports.push(StepReport {
                index,
                op: step.op.name(),
                outcome,
            });
        }
        Ok(())
    }

    async fn execute(&mut self, op: &Operation) -> CliResult<String> {
        match op {
            Operation::Submit {
                actor,
                label,
                details,
            } => {
                if self.labels.contains_key(label) {
                    return Err(CliError::Script(format!("label {} is already in use", label)));
                }
                let application = self.handler.submit(actor, details.clone()).await?;
                self.labels.insert(label.clone(), application.id.clone());
                Ok(format!(
                    "{} submitted as {}, at {}",
                    label,
                    application.id.short(),
                    application.current_stage()
                ))
            }

            Operation::Act {
                actor,
                application,
                action,
            } => {
                let id = self.resolve(application)?;
                let outcome = self.handler.act(&id, actor, action.clone()).await?;
                let mut text = format!(
                    "{} {} by {}, now {}",
                    application,
                    outcome.entry.action,
                    actor,
                    outcome.application.current_stage()
                );
                if let Some(certificate) = outcome.certificate {
                    text.push_str(&format!(", certificate {}", certificate.serial_number));
                    self.certificates.insert(application.clone(), certificate);
                }
                Ok(text)
            }

            Operation::Issue { application } => {
                let id = self.resolve(application)?;
                let certificate = self.handler.issue_certificate(&id).await?;
                if let Some(previous) = self.certificates.get(application) {
                    if previous.id != certificate.id {
                        return Err(CliError::Script(format!(
                            "issuance for {} returned a different certificate",
                            application
                        )));
                    }
                }
                let text = format!("{} certificate {}", application, certificate.serial_number);
                self.certificates.insert(application.clone(), certificate);
                Ok(text)
            }

            Operation::Renew {
                actor,
                application,
                label,
            } => {
                let certificate = self.certificates.get(application).ok_or_else(|| {
                    CliError::Script(format!("no certificate recorded for {}", application))
                })?;
                let renewal = self.handler.renew(&certificate.id, actor).await?;
                self.labels.insert(label.clone(), renewal.id.clone());
                Ok(format!("{} submitted as renewal of {}", label, application))
            }

            Operation::Queue {
                actor,
                expect_count,
            } => {
                let queue = self
                    .handler
                    .queue_for(actor, QueryWindow::default())
                    .await?;
                if let Some(expected) = expect_count {
                    if queue.len() != *expected {
                        return Err(CliError::Script(format!(
                            "queue for {} holds {} applications, expected {}",
                            actor,
                            queue.len(),
                            expected
                        )));
                    }
                }
                Ok(format!("{} waiting for {}", queue.len(), actor))
            }

            Operation::Expect {
                application,
                stage,
                history_len,
            } => {
                let id = self.resolve(application)?;
                let record = self.handler.application(&id).await?;
                if let Some(stage) = stage {
                    if record.current_stage() != *stage {
                        return Err(CliError::Script(format!(
                            "{} is at {}, expected {}",
                            application,
                            record.current_stage(),
                            stage
                        )));
                    }
                }
                if let Some(len) = history_len {
                    if record.history.len() != *len {
                        return Err(CliError::Script(format!(
                            "{} has {} history entries, expected {}",
                            application,
                            record.history.len(),
                            len
                        )));
                    }
                }
                Ok(format!(
                    "{} at {} with {} entries",
                    application,
                    record.current_stage(),
                    record.history.len()
                ))
            }
        }
    }

    fn resolve(&self, label: &str) -> CliResult<ApplicationId> {
        self.labels
            .get(label)
            .cloned()
            .ok_or_else(|| CliError::Script(format!("unknown application label {}", label)))
    }
}

fn step_failed(step: usize, message: String) -> CliError {
    CliError::Step { step, message }
}
