// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary traits: everything the engine consumes but does not implement.
//!
//! The engine stays agnostic to the implementations behind these traits;
//! in production they are backed by the repository, the connector layer and
//! the system clock, in tests by the in-memory doubles from
//! [`crate::test_utils`].

use std::collections::BTreeSet;

use crate::assignment::PolicyRuleSpec;
use crate::delta::{ItemDelta, ObjectDelta};
use crate::error::{Criticality, EngineError};
use crate::object::{Oid, PolicyObject, ResourceObject};
use crate::resource::{Discriminator, ResourceDef};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Supplies "now" for validity evaluation. Substitutable so that tests run
/// against a manual clock.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Resolves referenced objects: assignment targets (roles, orgs) and
/// resource definitions.
pub trait ObjectResolver {
    fn resolve_policy_object(&self, oid: &Oid) -> Result<PolicyObject, EngineError>;

    fn resolve_resource(&self, oid: &Oid) -> Result<ResourceDef, EngineError>;
}

/// The connector boundary: applies a delta against the target system
/// identified by the discriminator and returns the resulting object state
/// (`None` after a deletion).
///
/// Timeouts are this boundary's responsibility; they surface to the engine
/// as ordinary [`EngineError::Communication`] failures.
pub trait DeltaExecutor {
    fn execute(
        &mut self,
        discriminator: &Discriminator,
        delta: &ObjectDelta,
    ) -> Result<Option<ResourceObject>, EngineError>;

    /// How far a failure from this target reaches. The default treats a
    /// communication failure as fatal for the whole cycle and everything
    /// else as contained to the projection.
    fn criticality(&self, error: &EngineError) -> Criticality {
        match error {
            EngineError::Communication(_) => Criticality::Fatal,
            _ => Criticality::Partial,
        }
    }
}

/// When a reconciliation hook runs relative to delta execution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HookPhase {
    Before,
    After,
}

/// Configuration-driven callbacks around delta execution. Side-effecting
/// but never alters the delta.
pub trait ReconciliationHook {
    fn run(
        &mut self,
        phase: HookPhase,
        discriminator: &Discriminator,
        delta: Option<&ObjectDelta>,
    ) -> Result<(), EngineError>;
}

/// No-op hook for deployments without reconciliation scripts.
impl ReconciliationHook for () {
    fn run(
        &mut self,
        _phase: HookPhase,
        _discriminator: &Discriminator,
        _delta: Option<&ObjectDelta>,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Scope with which a collected policy rule applies.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuleScope {
    /// Scoped to the focus object itself.
    Object,
    /// Scoped to the target of the direct assignment.
    DirectTarget,
    /// Scoped to a target reached through a longer chain.
    IndirectTarget,
}

/// Accepts collected policy rules for downstream approval and SoD
/// processing, which happens outside this engine.
pub trait PolicyRuleSink {
    fn collect(&mut self, rule: &PolicyRuleSpec, scope: RuleScope, source: &Oid);
}

/// A link change to be persisted on the focus object.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LinkChange {
    Link(Oid),
    Unlink(Oid),
}

/// Persists the outcome of a change cycle: the final focus delta and the
/// focus-to-projection link changes. Writes to one focus object's reference
/// collection are serialized by the implementation.
pub trait FocusRepository {
    fn apply_focus_deltas(&mut self, focus: &Oid, deltas: &[ItemDelta])
    -> Result<(), EngineError>;

    fn update_link(&mut self, focus: &Oid, change: LinkChange) -> Result<(), EngineError>;
}

/// Convenience for expressing multi-valued items in tests and builders.
pub fn values<I, V>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = V>,
    V: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}
