//! Append-only, hash-linked application history
//!
//! Each accepted action produces exactly one [`HistoryEntry`]. Entries
//! carry the blake3 hash of their predecessor, so any rewrite, reorder or
//! removal of an entry is detectable with [`verify_chain`].

use crate::{ActorId, Role, Stage, WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of action recorded in history
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Approve,
    Reject,
    RequestRecheck,
    CompleteRecheck,
    SubmitReport,
    AmendDetails,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Approve => "APPROVE",
            ActionKind::Reject => "REJECT",
            ActionKind::RequestRecheck => "REQUEST_RECHECK",
            ActionKind::CompleteRecheck => "COMPLETE_RECHECK",
            ActionKind::SubmitReport => "SUBMIT_REPORT",
            ActionKind::AmendDetails => "AMEND_DETAILS",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted action in an application's history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Zero-based position in the history
    pub sequence: u64,
    /// Stage the application was at when the action was taken
    pub stage: Stage,
    pub actor: ActorId,
    pub actor_role: Role,
    pub action: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    pub hash: String,
}

impl HistoryEntry {
    /// Build an entry and compute its link hash
    #[allow(clippy::too_many_arguments)]
    pub fn seal(
        sequence: u64,
        stage: Stage,
        actor: ActorId,
        actor_role: Role,
        action: ActionKind,
        remarks: Option<String>,
        timestamp: DateTime<Utc>,
        previous_hash: Option<String>,
    ) -> Self {
        let mut entry = Self {
            sequence,
            stage,
            actor,
            actor_role,
            action,
            remarks,
            timestamp,
            previous_hash,
            hash: String::new(),
        };
        entry.hash = entry.compute_hash();
        entry
    }

    /// Recompute the hash over every field except `hash` itself
    pub fn compute_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.sequence.to_le_bytes());
        update_field(&mut hasher, self.stage.as_str());
        update_field(&mut hasher, self.actor.as_str());
        update_field(&mut hasher, self.actor_role.as_str());
        update_field(&mut hasher, self.action.as_str());
        update_field(&mut hasher, self.remarks.as_deref().unwrap_or(""));
        update_field(&mut hasher, &self.timestamp.to_rfc3339());
        update_field(&mut hasher, self.previous_hash.as_deref().unwrap_or(""));
        hasher.finalize().to_hex().to_string()
    }
}

// Length-prefix every field so adjacent fields cannot run together.
fn update_field(hasher: &mut blake3::Hasher, value: &str) {
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// Verify sequence numbers and hash links of a history
pub fn verify_chain(entries: &[HistoryEntry]) -> WorkflowResult<()> {
    let mut previous: Option<&str> = None;
    for (index, entry) in entries.iter().enumerate() {
        if entry.sequence != index as u64
            || entry.previous_hash.as_deref() != previous
            || entry.hash != entry.compute_hash()
        {
            return Err(WorkflowError::HistoryTampered(index as u64));
        }
        previous = Some(&entry.hash);
    }
    Ok(())
}
