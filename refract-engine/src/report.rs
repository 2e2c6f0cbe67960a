// SPDX-License-Identifier: MIT OR Apache-2.0

//! The outcome of a change cycle as handed back to the caller.

use refract_core::{Discriminator, EngineError, FocusObject, ItemDelta, Oid};
use serde::{Deserialize, Serialize};

use crate::executor::ExecutionOutcome;
use crate::payload::CollectedPersona;

/// Final status of one projection after all waves ran.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ProjectionStatus {
    /// A delta was executed against the target.
    Applied,
    /// Nothing needed doing.
    NotApplicable,
    /// Given up on for this cycle; the error is on the report entry.
    Broken,
    /// A restart was requested and the wave has not been retried. Only
    /// ever observed transiently; a final report never carries it.
    RestartPending,
}

impl From<ExecutionOutcome> for ProjectionStatus {
    fn from(outcome: ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::Applied => ProjectionStatus::Applied,
            ExecutionOutcome::NotApplicable => ProjectionStatus::NotApplicable,
            ExecutionOutcome::Broken => ProjectionStatus::Broken,
            ExecutionOutcome::RestartRequested => ProjectionStatus::RestartPending,
        }
    }
}

/// Per-projection entry of a [`ChangeReport`].
#[derive(Clone, Debug)]
pub struct ProjectionReport {
    pub discriminator: Discriminator,
    pub status: ProjectionStatus,
    pub error: Option<EngineError>,
}

/// What one change cycle did.
#[derive(Clone, Debug)]
pub struct ChangeReport {
    /// The focus the cycle ran for, when one was known.
    pub focus: Option<Oid>,
    /// The expected new focus state, with secondary deltas, link changes
    /// and identity data folded in.
    pub focus_new: Option<FocusObject>,
    pub projections: Vec<ProjectionReport>,
    /// The focus item deltas the cycle computed and persisted.
    pub focus_deltas: Vec<ItemDelta>,
    /// Persona constructions the policy asked for. Materializing them is
    /// the caller's business; they are reported, not executed.
    pub personas: Vec<CollectedPersona>,
}
