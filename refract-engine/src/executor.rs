// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution of one projection context within one wave.
//!
//! A [`ProjectionExecution`] is created per context per wave pass and used
//! once. It refines the executable delta (empty-to-delete conversion,
//! higher-order deduplication, broken-context filtering), offers the result
//! to the connector and classifies the outcome. Failures never panic out of
//! the wave loop; they surface as an [`ExecutionOutcome`] or, for fatal
//! criticality, as an error aborting the cycle.

use refract_core::{
    Criticality, DeltaExecutor, EngineError, FocusRepository, HookPhase, ObjectDelta,
    ReconciliationHook, ResourceObject, equivalent_deltas,
};
use tracing::{debug, trace, warn};

use crate::context::{ChangeCycle, ProjectionContext, SyncDecision, SyncIntent};
use crate::link;

/// What happened to one projection context during one wave pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutionOutcome {
    /// A delta was executed against the target.
    Applied,
    /// Nothing to do: no delta, not eligible, or deduplicated away.
    NotApplicable,
    /// The projection failed and is given up on for this cycle.
    Broken,
    /// An ambiguous "already exists" conflict; the wave should be retried
    /// after re-deriving the executable delta.
    RestartRequested,
}

/// One execution attempt for the projection context at `index`.
pub(crate) struct ProjectionExecution<'a, X, H, P> {
    cycle: &'a mut ChangeCycle,
    index: usize,
    connector: &'a mut X,
    hooks: &'a mut H,
    repository: &'a mut P,
    delta: Option<ObjectDelta>,
}

impl<'a, X, H, P> ProjectionExecution<'a, X, H, P>
where
    X: DeltaExecutor,
    H: ReconciliationHook,
    P: FocusRepository,
{
    pub(crate) fn new(
        cycle: &'a mut ChangeCycle,
        index: usize,
        connector: &'a mut X,
        hooks: &'a mut H,
        repository: &'a mut P,
    ) -> Self {
        Self {
            cycle,
            index,
            connector,
            hooks,
            repository,
            delta: None,
        }
    }

    fn ctx(&self) -> &ProjectionContext {
        self.cycle.projection(self.index)
    }

    fn ctx_mut(&mut self) -> &mut ProjectionContext {
        self.cycle.projection_mut(self.index)
    }

    pub(crate) fn run(mut self) -> Result<ExecutionOutcome, EngineError> {
        if !self.should_execute() {
            return Ok(ExecutionOutcome::NotApplicable);
        }
        let discriminator = self.ctx().discriminator.clone();

        let before = self.ctx().executable_delta().cloned();
        if let Err(error) = self
            .hooks
            .run(HookPhase::Before, &discriminator, before.as_ref())
        {
            return self.fail(error);
        }

        self.delta = self.ctx_mut().take_executable_delta();
        self.convert_empty_to_delete();

        if self.is_deduplicated_higher_order_delete() {
            debug!(
                discriminator = %discriminator,
                "lower-order context already deleted the object, nothing left to do"
            );
            self.ctx_mut().completed = true;
            return Ok(ExecutionOutcome::NotApplicable);
        }

        let skip = if self.ctx().is_broken() && !self.delta.as_ref().is_some_and(ObjectDelta::is_delete)
        {
            trace!(
                discriminator = %discriminator,
                "context is broken, only delete deltas go through"
            );
            true
        } else {
            self.delta.as_ref().is_none_or(ObjectDelta::is_empty)
        };

        let mut applied = false;
        if !skip
            && let Some(delta) = self.delta.clone()
        {
            self.ctx_mut().record_executed(delta.clone());
            match self.connector.execute(&discriminator, &delta) {
                Ok(after) => {
                    applied = true;
                    self.absorb_result(&delta, after);
                }
                Err(error) => return self.fail(error),
            }
        }

        self.update_links()?;

        if let Err(error) = self
            .hooks
            .run(HookPhase::After, &discriminator, self.delta.as_ref())
        {
            return self.fail(error);
        }

        self.ctx_mut().completed = true;
        if applied {
            Ok(ExecutionOutcome::Applied)
        } else if self.ctx().is_broken() {
            Ok(ExecutionOutcome::Broken)
        } else {
            Ok(ExecutionOutcome::NotApplicable)
        }
    }

    fn should_execute(&self) -> bool {
        let ctx = self.ctx();
        if ctx.wave() != Some(self.cycle.execution_wave) {
            trace!(discriminator = %ctx.discriminator, "not this context's wave");
            return false;
        }
        if ctx.completed {
            trace!(discriminator = %ctx.discriminator, "already completed");
            return false;
        }
        if !ctx.can_project {
            trace!(discriminator = %ctx.discriminator, "changes may not propagate here");
            return false;
        }
        if ctx.decision == SyncDecision::Ignore {
            trace!(discriminator = %ctx.discriminator, "ignored by policy decision");
            return false;
        }
        true
    }

    /// A projection that is to go away but whose computed delta came out
    /// empty still needs an explicit delete offered to the connector.
    fn convert_empty_to_delete(&mut self) {
        if self.delta.as_ref().is_some_and(|delta| !delta.is_empty()) {
            return;
        }
        let ctx = self.ctx();
        let delete_wanted =
            ctx.intent == SyncIntent::Delete || ctx.decision == SyncDecision::Delete;
        let broken_forced = ctx.is_broken() && self.cycle.options.force_focus_delete;
        if !(delete_wanted || broken_forced) {
            return;
        }
        let Some(oid) = ctx.oid().cloned() else {
            trace!(
                discriminator = %ctx.discriminator,
                "deprovisioning wanted but no object to delete"
            );
            return;
        };
        trace!(discriminator = %ctx.discriminator, %oid, "converting empty delta to delete");
        self.delta = Some(ObjectDelta::Delete { oid });
    }

    /// A higher-order context deleting an object that its lower-order
    /// sibling has already deleted (or is deleting) would fail on the
    /// target; the delete is deduplicated instead.
    fn is_deduplicated_higher_order_delete(&self) -> bool {
        if !self.delta.as_ref().is_some_and(ObjectDelta::is_delete) {
            return false;
        }
        let ctx = self.ctx();
        if !ctx.is_higher_order() {
            return false;
        }
        self.cycle
            .lower_order_sibling(&ctx.discriminator)
            .is_some_and(|lower| {
                lower.intent == SyncIntent::Delete
                    || lower.executed.iter().any(ObjectDelta::is_delete)
            })
    }

    /// Fold the connector's view of the object after execution back into
    /// the context.
    fn absorb_result(&mut self, delta: &ObjectDelta, after: Option<ResourceObject>) {
        let ctx = self.ctx_mut();
        match delta {
            ObjectDelta::Add { .. } => {
                ctx.exists = true;
                ctx.object_new = after.clone();
                if after.as_ref().is_some_and(|object| object.oid.is_some()) {
                    ctx.current_object = after;
                }
            }
            ObjectDelta::Modify { .. } => {
                if after.is_some() {
                    ctx.current_object = after;
                }
            }
            ObjectDelta::Delete { .. } => {
                ctx.exists = false;
                if let Some(current) = &mut ctx.current_object {
                    current.dead = true;
                }
            }
        }
    }

    fn update_links(&mut self) -> Result<(), EngineError> {
        let (focus, ctx) = self.cycle.focus_and_projection_mut(self.index);
        link::update_links(focus, ctx, self.repository)
    }

    /// Classify a failure. A first "already exists" conflict requests a
    /// wave restart: the conflicting object may be a concurrently created
    /// twin that a re-derived delta can simply link to. A second,
    /// structurally identical conflict breaks the projection instead of
    /// looping forever.
    fn fail(mut self, error: EngineError) -> Result<ExecutionOutcome, EngineError> {
        if matches!(error, EngineError::ObjectAlreadyExists(_)) {
            if self.is_repeated_conflict() {
                let repeated = EngineError::ObjectAlreadyExistsRepeated(error.to_string());
                warn!(
                    discriminator = %self.ctx().discriminator,
                    error = %repeated,
                    "repeated conflict, giving up on this projection"
                );
                let ctx = self.ctx_mut();
                ctx.decision = SyncDecision::Broken;
                ctx.last_error = Some(repeated);
                ctx.completed = true;
                return Ok(ExecutionOutcome::Broken);
            }
            debug!(
                discriminator = %self.ctx().discriminator,
                "object already exists on target, requesting wave restart"
            );
            self.ctx_mut().reset_for_restart();
            return Ok(ExecutionOutcome::RestartRequested);
        }

        warn!(
            discriminator = %self.ctx().discriminator,
            error = %error,
            "projection execution failed"
        );
        {
            let ctx = self.ctx_mut();
            ctx.decision = SyncDecision::Broken;
            ctx.last_error = Some(error.clone());
            ctx.completed = true;
        }
        // Link state is still brought up to date for the broken context;
        // a failure here must not mask the original one.
        if let Err(link_error) = self.update_links() {
            warn!(
                discriminator = %self.ctx().discriminator,
                error = %link_error,
                "link update failed on a broken context"
            );
        }
        match self.connector.criticality(&error) {
            Criticality::Fatal => Err(error),
            Criticality::Partial => Ok(ExecutionOutcome::Broken),
        }
    }

    /// True when the just-failed attempt structurally repeats the attempt
    /// immediately before it. Only the last two attempts are compared: a
    /// conflict with a different payload than the previous one means the
    /// restarted computation changed something, so retrying may still
    /// converge. The failed delta is already on the executed list.
    fn is_repeated_conflict(&self) -> bool {
        let executed = &self.ctx().executed;
        let len = executed.len();
        if len < 2 {
            return false;
        }
        equivalent_deltas(&executed[len - 2], &executed[len - 1])
    }
}
