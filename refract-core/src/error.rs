// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine error kinds and their propagation classification.

use thiserror::Error;

use crate::object::Oid;

/// All error kinds surfaced by the engine or its boundaries.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("object not found: {0}")]
    ObjectNotFound(Oid),

    #[error("communication failure: {0}")]
    Communication(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error("security violation: {0}")]
    SecurityViolation(String),

    #[error("expression evaluation failure: {0}")]
    ExpressionEvaluation(String),

    #[error("precondition violation: {0}")]
    PreconditionViolation(String),

    /// The target reports that the object to be created already exists. A
    /// special case: it may be a rename conflict (bad) or a concurrently
    /// discovered object that just needs linking (harmless), so the first
    /// occurrence requests a wave restart instead of failing.
    #[error("object already exists: {0}")]
    ObjectAlreadyExists(String),

    /// A repeated, structurally identical "already exists" conflict. Fatal
    /// for the projection within this cycle, never retried.
    #[error("object already exists (repeated conflict): {0}")]
    ObjectAlreadyExistsRepeated(String),
}

impl EngineError {
    /// Errors which make further policy computation unsafe. When one of
    /// these occurs during graph walking the whole change cycle is aborted.
    pub fn aborts_computation(&self) -> bool {
        matches!(
            self,
            EngineError::SchemaViolation(_)
                | EngineError::Configuration(_)
                | EngineError::SecurityViolation(_)
        )
    }
}

/// How far a connector failure reaches.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Criticality {
    /// Contained to the failed projection; sibling projections continue.
    Partial,
    /// Aborts the whole change cycle, e.g. the target system is offline.
    Fatal,
}
