//! Stage registry: the ordered chain of reviewing stages
//!
//! The registry is fixed at deploy time. Every pending application's stage
//! must be a member; asking about any other stage is a configuration error
//! reported as `UnknownStage`.

use certflow_types::{Role, Stage, WorkflowError, WorkflowResult};

/// Where an application goes after its current stage approves
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextStage {
    Stage(Stage),
    Completed,
}

/// Ordered, duplicate-free list of reviewing stages
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageRegistry {
    stages: Vec<Stage>,
}

impl StageRegistry {
    /// Build a registry from an ordered list of stages
    pub fn new(stages: Vec<Stage>) -> WorkflowResult<Self> {
        if stages.is_empty() {
            return Err(WorkflowError::Validation(
                "stage registry must contain at least one stage".into(),
            ));
        }
        for (i, stage) in stages.iter().enumerate() {
            if stages[..i].contains(stage) {
                return Err(WorkflowError::Validation(format!(
                    "stage {} appears more than once in the registry",
                    stage
                )));
            }
        }
        Ok(Self { stages })
    }

    /// Build a registry from stage names, e.g. read from configuration
    pub fn from_names<I, S>(names: I) -> WorkflowResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stages = names
            .into_iter()
            .map(|name| name.as_ref().parse())
            .collect::<WorkflowResult<Vec<Stage>>>()?;
        Self::new(stages)
    }

    /// The standard chain: SVRO → MVRO → RI → MRO
    pub fn standard() -> Self {
        Self {
            stages: Stage::ALL.to_vec(),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn first_stage(&self) -> Stage {
        self.stages[0]
    }

    pub fn last_stage(&self) -> Stage {
        self.stages[self.stages.len() - 1]
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    /// Zero-based position of a stage in the chain
    pub fn position(&self, stage: Stage) -> WorkflowResult<usize> {
        self.stages
            .iter()
            .position(|s| *s == stage)
            .ok_or_else(|| WorkflowError::UnknownStage(stage.to_string()))
    }

    pub fn next_stage(&self, stage: Stage) -> WorkflowResult<NextStage> {
        let pos = self.position(stage)?;
        Ok(match self.stages.get(pos + 1) {
            Some(next) => NextStage::Stage(*next),
            None => NextStage::Completed,
        })
    }

    pub fn previous_stage(&self, stage: Stage) -> WorkflowResult<Option<Stage>> {
        let pos = self.position(stage)?;
        Ok(pos.checked_sub(1).map(|i| self.stages[i]))
    }

    pub fn is_last(&self, stage: Stage) -> WorkflowResult<bool> {
        Ok(self.next_stage(stage)? == NextStage::Completed)
    }

    /// Whether `role` may act on an application at `stage`. The stage's own
    /// role always may; `ADMIN` may for corrective actions.
    pub fn is_valid_actor(&self, role: Role, stage: Stage) -> bool {
        self.contains(stage) && (role.owns(stage) || role.is_admin())
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
