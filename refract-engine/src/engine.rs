// SPDX-License-Identifier: MIT OR Apache-2.0

//! The change engine facade: one call runs one full change cycle.
//!
//! The caller supplies the old and new focus state plus the known
//! projections; the engine walks the assignment graph, consolidates inbound
//! and outbound mappings, schedules waves, executes projection deltas and
//! persists the focus outcome. Everything external enters through the
//! boundary traits held by the engine.

use refract_core::{
    Clock, DeltaExecutor, Discriminator, EngineError, FocusObject, FocusRepository,
    ObjectResolver, PolicyRuleSink, ReconciliationHook, ResourceObject,
};
use tracing::{debug, trace};

use crate::consolidate::{consolidate_constructions, evaluate_focus_mappings};
use crate::context::{ChangeCycle, CycleOptions, FocusContext, SyncDecision, SyncIntent};
use crate::inbound::process_inbound;
use crate::report::{ChangeReport, ProjectionReport, ProjectionStatus};
use crate::walker::GraphWalker;
use crate::waves::{assign_waves, run_waves};

/// A projection known before the cycle starts: its identity and the last
/// known object state on the target.
#[derive(Clone, Debug)]
pub struct ProjectionSeed {
    pub discriminator: Discriminator,
    pub object: Option<ResourceObject>,
    /// The object is known to be gone from the target; the context takes
    /// part in link bookkeeping but receives no further changes.
    pub gone: bool,
    /// Synchronization decision made by the host before the cycle starts.
    /// `Ignore` blocks execution on the context, `Delete` forces the
    /// computed change into a delete.
    pub decision: SyncDecision,
}

impl ProjectionSeed {
    pub fn new(discriminator: Discriminator) -> Self {
        Self {
            discriminator,
            object: None,
            gone: false,
            decision: SyncDecision::Keep,
        }
    }

    pub fn with_object(mut self, object: ResourceObject) -> Self {
        self.object = Some(object);
        self
    }

    pub fn gone(mut self) -> Self {
        self.gone = true;
        self
    }

    pub fn with_decision(mut self, decision: SyncDecision) -> Self {
        self.decision = decision;
        self
    }
}

/// Input of one change cycle.
#[derive(Clone, Debug, Default)]
pub struct ChangeRequest {
    /// Focus state before the requested change; `None` when the focus is
    /// being created.
    pub focus_old: Option<FocusObject>,
    /// Focus state the requested change wants; `None` when the focus is
    /// being deleted.
    pub focus_new: Option<FocusObject>,
    pub projections: Vec<ProjectionSeed>,
    pub options: CycleOptions,
}

/// Runs change cycles against a fixed set of boundaries.
pub struct ChangeEngine<R, C, X, H, S, P> {
    resolver: R,
    clock: C,
    connector: X,
    hooks: H,
    rules: S,
    repository: P,
}

impl<R, C, X, H, S, P> ChangeEngine<R, C, X, H, S, P>
where
    R: ObjectResolver,
    C: Clock,
    X: DeltaExecutor,
    H: ReconciliationHook,
    S: PolicyRuleSink,
    P: FocusRepository,
{
    pub fn new(resolver: R, clock: C, connector: X, hooks: H, rules: S, repository: P) -> Self {
        Self {
            resolver,
            clock,
            connector,
            hooks,
            rules,
            repository,
        }
    }

    pub fn connector(&self) -> &X {
        &self.connector
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn rules(&self) -> &S {
        &self.rules
    }

    pub fn repository(&self) -> &P {
        &self.repository
    }

    /// Run one change cycle to completion.
    ///
    /// Computation first: graph walking, rule forwarding, focus mappings,
    /// inbound consolidation, construction consolidation, wave assignment.
    /// Then execution wave by wave, and finally persistence of the focus
    /// outcome. An error return means the cycle was aborted; per-projection
    /// failures are reported, not returned.
    pub fn run(&mut self, request: ChangeRequest) -> Result<ChangeReport, EngineError> {
        let now = self.clock.now();
        let mut cycle = ChangeCycle::new(
            request.options,
            FocusContext::new(request.focus_old, request.focus_new),
        );
        for seed in request.projections {
            let ctx = cycle.ensure_projection(&seed.discriminator);
            ctx.exists = seed.object.as_ref().is_some_and(|object| !object.dead);
            ctx.gone = seed.gone;
            ctx.decision = seed.decision;
            ctx.current_object = seed.object;
        }
        debug!(
            focus = ?cycle.focus.oid(),
            projections = cycle.projection_count(),
            "change cycle starting"
        );

        let walker = GraphWalker::new(&self.resolver, &cycle.options, now);
        let evaluated = walker.evaluate_all(&cycle.focus)?;
        trace!(assignments = evaluated.len(), "assignment graph evaluated");

        for assignment in &evaluated {
            for rule in &assignment.object_rules {
                self.rules.collect(&rule.rule, rule.scope, &rule.source);
            }
            for rule in &assignment.target_rules {
                self.rules.collect(&rule.rule, rule.scope, &rule.source);
            }
        }

        evaluate_focus_mappings(&mut cycle, &evaluated);
        process_inbound(&mut cycle, &self.resolver)?;
        consolidate_constructions(&mut cycle, &evaluated)?;

        if cycle.options.force_focus_delete {
            for ctx in cycle.projections_mut() {
                ctx.intent = SyncIntent::Delete;
            }
        }

        assign_waves(&mut cycle, &self.resolver)?;
        let statuses = run_waves(
            &mut cycle,
            &mut self.connector,
            &mut self.hooks,
            &mut self.repository,
        )?;

        if let Some(oid) = cycle.focus.oid().cloned()
            && !cycle.focus.secondary_delta.is_empty()
        {
            self.repository
                .apply_focus_deltas(&oid, &cycle.focus.secondary_delta)?;
        }

        let projections = cycle
            .projections()
            .map(|ctx| ProjectionReport {
                discriminator: ctx.discriminator.clone(),
                status: statuses
                    .get(&ctx.discriminator)
                    .copied()
                    .unwrap_or(ProjectionStatus::NotApplicable),
                error: ctx.last_error.clone(),
            })
            .collect();
        let personas = evaluated
            .into_iter()
            .flat_map(|assignment| assignment.personas)
            .filter(|persona| persona.valid)
            .collect();

        Ok(ChangeReport {
            focus: cycle.focus.oid().cloned(),
            focus_new: cycle.focus.new.clone(),
            projections,
            focus_deltas: cycle.focus.secondary_delta.clone(),
            personas,
        })
    }
}
