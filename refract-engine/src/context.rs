// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change cycle state: the focus context and the projection contexts.
//!
//! A change cycle is the unit of work for one focus object. It owns one
//! focus context and any number of projection contexts, lives for a single
//! computation-and-execution pass and is discarded afterwards. All engine
//! functions receive the cycle explicitly; there is no ambient state.

use refract_core::{
    Discriminator, EngineError, FocusKind, FocusObject, ItemDelta, ObjectDelta, Oid,
    ResourceObject,
};
use tracing::trace;

/// Options of one change cycle.
#[derive(Clone, Debug, Default)]
pub struct CycleOptions {
    /// In login mode only authorization-relevant data in roles matters;
    /// payload evaluation is skipped entirely.
    pub login_mode: bool,
    /// The focus object is being deleted; projections are deprovisioned
    /// even where their deltas came out empty.
    pub force_focus_delete: bool,
    /// When set, changes may propagate only from (and to) this resource;
    /// all other projections have `can_project` unset.
    pub triggering_resource: Option<Oid>,
    /// Identity data derivation runs only when this is present.
    pub identity_config: Option<IdentityConfig>,
}

/// Which focus items have identity data recorded for them.
#[derive(Clone, Debug)]
pub struct IdentityConfig {
    pub items: Vec<String>,
}

/// Current and target state of the focus object, plus the secondary delta
/// accumulator which both focus-mapping evaluation and inbound
/// consolidation append to.
#[derive(Clone, Debug)]
pub struct FocusContext {
    pub old: Option<FocusObject>,
    pub new: Option<FocusObject>,
    pub secondary_delta: Vec<ItemDelta>,
}

impl FocusContext {
    pub fn new(old: Option<FocusObject>, new: Option<FocusObject>) -> Self {
        Self {
            old,
            new,
            secondary_delta: Vec::new(),
        }
    }

    /// The current state when there is one, the target state otherwise.
    pub fn current_or_new(&self) -> Option<&FocusObject> {
        self.old.as_ref().or(self.new.as_ref())
    }

    pub fn oid(&self) -> Option<&Oid> {
        self.current_or_new().map(|focus| &focus.oid)
    }

    pub fn kind(&self) -> Option<FocusKind> {
        self.current_or_new().map(|focus| focus.kind)
    }

    /// Append item deltas to the secondary delta and apply them to the new
    /// state immediately, so later computation steps observe them.
    pub fn swallow_to_secondary_delta(&mut self, deltas: impl IntoIterator<Item = ItemDelta>) {
        for delta in deltas {
            if delta.is_empty() {
                continue;
            }
            if let Some(new) = &mut self.new {
                delta.apply_to(&mut new.items);
            }
            self.secondary_delta.push(delta);
        }
    }
}

/// Synchronization intent of a projection: what the policy wants to happen
/// to it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SyncIntent {
    #[default]
    Keep,
    Delete,
}

/// Synchronization policy decision: how the projection is treated for the
/// rest of the cycle.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SyncDecision {
    #[default]
    Keep,
    Delete,
    /// Unrecoverable for the remainder of this cycle; only delete deltas
    /// are still allowed through.
    Broken,
    /// Excluded from execution entirely.
    Ignore,
}

/// Per-target-system state within one change cycle.
#[derive(Clone, Debug)]
pub struct ProjectionContext {
    pub discriminator: Discriminator,
    /// Last known state of the object on the target.
    pub current_object: Option<ResourceObject>,
    /// The delta as computed from policy; kept pristine so the executable
    /// delta can be re-derived after a restart.
    pub intended_delta: Option<ObjectDelta>,
    /// The delta to be executed, gradually refined by the executor.
    executable_delta: Option<ObjectDelta>,
    /// Expected object state after execution; reset on restart.
    pub object_new: Option<ResourceObject>,
    wave: Option<u32>,
    pub intent: SyncIntent,
    pub decision: SyncDecision,
    /// Deltas offered to the connector for this projection, including
    /// failed attempts. Consulted to detect repeated ambiguous conflicts.
    pub executed: Vec<ObjectDelta>,
    pub exists: bool,
    pub gone: bool,
    pub completed: bool,
    pub can_project: bool,
    pub last_error: Option<EngineError>,
}

impl ProjectionContext {
    pub fn new(discriminator: Discriminator) -> Self {
        Self {
            discriminator,
            current_object: None,
            intended_delta: None,
            executable_delta: None,
            object_new: None,
            wave: None,
            intent: SyncIntent::default(),
            decision: SyncDecision::default(),
            executed: Vec::new(),
            exists: false,
            gone: false,
            completed: false,
            can_project: true,
            last_error: None,
        }
    }

    /// A higher-order context represents a secondary aspect of a target
    /// already represented by a lower-order context.
    pub fn is_higher_order(&self) -> bool {
        self.discriminator.order > 0
    }

    pub fn is_broken(&self) -> bool {
        self.decision == SyncDecision::Broken
    }

    pub fn oid(&self) -> Option<&Oid> {
        self.current_object
            .as_ref()
            .and_then(|object| object.oid.as_ref())
            .or_else(|| {
                self.object_new
                    .as_ref()
                    .and_then(|object| object.oid.as_ref())
            })
    }

    pub fn wave(&self) -> Option<u32> {
        self.wave
    }

    /// A wave never decreases once assigned.
    pub fn set_wave(&mut self, wave: u32) {
        match self.wave {
            Some(current) if wave < current => {
                trace!(
                    discriminator = %self.discriminator,
                    current, wave, "ignoring wave decrease"
                );
            }
            _ => self.wave = Some(wave),
        }
    }

    pub fn set_deltas(&mut self, delta: Option<ObjectDelta>) {
        self.intended_delta = delta.clone();
        self.executable_delta = delta;
    }

    pub fn executable_delta(&self) -> Option<&ObjectDelta> {
        self.executable_delta.as_ref()
    }

    pub fn take_executable_delta(&mut self) -> Option<ObjectDelta> {
        self.executable_delta.take()
    }

    /// Reset after a requested restart: the executable delta is re-derived
    /// from the intended one and the expected-object cache is dropped, so
    /// the retried wave computes from a clean slate.
    pub fn reset_for_restart(&mut self) {
        self.executable_delta = self.intended_delta.clone();
        self.object_new = None;
        self.completed = false;
    }

    pub fn record_executed(&mut self, delta: ObjectDelta) {
        self.executed.push(delta);
    }
}

/// The top-level unit of work for one focus object.
#[derive(Debug)]
pub struct ChangeCycle {
    pub options: CycleOptions,
    pub focus: FocusContext,
    projections: Vec<ProjectionContext>,
    pub execution_wave: u32,
}

impl ChangeCycle {
    pub fn new(options: CycleOptions, focus: FocusContext) -> Self {
        Self {
            options,
            focus,
            projections: Vec::new(),
            execution_wave: 0,
        }
    }

    pub fn projections(&self) -> impl Iterator<Item = &ProjectionContext> {
        self.projections.iter()
    }

    pub fn projections_mut(&mut self) -> impl Iterator<Item = &mut ProjectionContext> {
        self.projections.iter_mut()
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    pub fn projection(&self, index: usize) -> &ProjectionContext {
        &self.projections[index]
    }

    pub fn projection_mut(&mut self, index: usize) -> &mut ProjectionContext {
        &mut self.projections[index]
    }

    pub fn find_projection(&self, discriminator: &Discriminator) -> Option<&ProjectionContext> {
        self.projections
            .iter()
            .find(|ctx| ctx.discriminator == *discriminator)
    }

    /// The context for the discriminator, created on first use. At most one
    /// context exists per (resource, tag, order) triple.
    pub fn ensure_projection(&mut self, discriminator: &Discriminator) -> &mut ProjectionContext {
        if let Some(index) = self
            .projections
            .iter()
            .position(|ctx| ctx.discriminator == *discriminator)
        {
            return &mut self.projections[index];
        }
        let mut ctx = ProjectionContext::new(discriminator.clone());
        ctx.can_project = self
            .options
            .triggering_resource
            .as_ref()
            .is_none_or(|resource| *resource == discriminator.resource);
        self.projections.push(ctx);
        self.projections
            .last_mut()
            .unwrap_or_else(|| unreachable!("just pushed"))
    }

    /// The lower-order sibling of a higher-order context: same resource and
    /// tag, smaller order.
    pub fn lower_order_sibling(
        &self,
        discriminator: &Discriminator,
    ) -> Option<&ProjectionContext> {
        self.projections.iter().find(|ctx| {
            ctx.discriminator.resource == discriminator.resource
                && ctx.discriminator.tag == discriminator.tag
                && ctx.discriminator.order < discriminator.order
        })
    }

    /// Split borrow used by the link updater: the focus context mutably,
    /// one projection context immutably.
    pub fn focus_and_projection_mut(
        &mut self,
        index: usize,
    ) -> (&mut FocusContext, &ProjectionContext) {
        (&mut self.focus, &self.projections[index])
    }

    /// The highest wave assigned to any projection, if any.
    pub fn max_wave(&self) -> Option<u32> {
        self.projections.iter().filter_map(|ctx| ctx.wave()).max()
    }
}
