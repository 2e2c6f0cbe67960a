// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assignment graph walker.
//!
//! Walks, in deterministic pre-order, every segment reachable from the
//! focus object's direct assignments: the assignments themselves, targets
//! induced through them, and metaroles assigned to those targets. Payload
//! is collected per segment as the walk proceeds.

use refract_core::{Assignment, EngineError, ObjectResolver, Oid, Timestamp};
use tracing::{debug, trace, warn};

use crate::context::{CycleOptions, FocusContext};
use crate::path::{AssignmentPath, EvaluationOrder, PathStep};
use crate::payload::{EvaluatedAssignment, collect_payload};
use crate::rel::{ConditionState, Relativity};

/// One edge of the assignment graph, reached through a concrete path.
/// Ephemeral: created during one walk and not retained afterwards.
#[derive(Debug)]
pub struct Segment {
    /// The object holding the assignment.
    pub source: Oid,
    pub assignment: Assignment,
    /// The path from the focus up to and including this segment.
    pub path: AssignmentPath,
    pub order: EvaluationOrder,
    /// Conjunction of the direct assignment's presence and every condition
    /// along the path, old and new truth tracked independently.
    pub overall: ConditionState,
    /// Composition of the factor relativities along the path; `None` when
    /// some factor holds in neither state.
    pub relative: Option<Relativity>,
    /// Validity of this assignment itself at "now".
    pub active: bool,
    /// Conjunction of `active` over the whole path.
    pub full_path_active: bool,
    /// Assigned directly on the focus.
    pub direct: bool,
}

/// Walks the assignment graph of one focus object.
pub struct GraphWalker<'a, R> {
    resolver: &'a R,
    options: &'a CycleOptions,
    now: Timestamp,
}

impl<'a, R: ObjectResolver> GraphWalker<'a, R> {
    pub fn new(resolver: &'a R, options: &'a CycleOptions, now: Timestamp) -> Self {
        Self {
            resolver,
            options,
            now,
        }
    }

    /// Evaluate every direct assignment of the focus, old and new state
    /// combined: assignments present only in the new state are being
    /// added, those present only in the old state are being removed.
    pub fn evaluate_all(
        &self,
        focus: &FocusContext,
    ) -> Result<Vec<EvaluatedAssignment>, EngineError> {
        let Some(focus_oid) = focus.oid().cloned() else {
            return Ok(Vec::new());
        };
        let old_assignments: Vec<&Assignment> = focus
            .old
            .as_ref()
            .map(|f| f.assignments.iter().collect())
            .unwrap_or_default();
        let new_assignments: Vec<&Assignment> = focus
            .new
            .as_ref()
            .map(|f| f.assignments.iter().collect())
            .unwrap_or_default();

        let mut evaluated = Vec::new();

        // New-state assignments first (in declaration order), then the
        // old-only ones: deterministic pre-order overall.
        for assignment in &new_assignments {
            let in_old = old_assignments.iter().any(|a| a.id == assignment.id);
            let presence = if in_old {
                ConditionState::BOTH
            } else {
                ConditionState::ADDED
            };
            evaluated.push(self.evaluate_direct(focus, &focus_oid, assignment, presence)?);
        }
        for assignment in &old_assignments {
            if new_assignments.iter().any(|a| a.id == assignment.id) {
                continue;
            }
            evaluated.push(self.evaluate_direct(
                focus,
                &focus_oid,
                assignment,
                ConditionState::REMOVED,
            )?);
        }

        debug!(
            focus = %focus_oid,
            count = evaluated.len(),
            "assignment graph walk finished"
        );
        Ok(evaluated)
    }

    fn evaluate_direct(
        &self,
        focus: &FocusContext,
        focus_oid: &Oid,
        assignment: &Assignment,
        presence: ConditionState,
    ) -> Result<EvaluatedAssignment, EngineError> {
        let mut eval = EvaluatedAssignment::new(assignment.id, assignment.target.clone());
        self.evaluate_segment(
            focus,
            focus_oid.clone(),
            assignment,
            AssignmentPath::root(),
            EvaluationOrder::DIRECT,
            presence,
            presence.relativity(),
            true,
            true,
            &mut eval,
        )?;
        Ok(eval)
    }

    #[expect(clippy::too_many_arguments)]
    fn evaluate_segment(
        &self,
        focus: &FocusContext,
        source: Oid,
        assignment: &Assignment,
        parent_path: AssignmentPath,
        order: EvaluationOrder,
        parent_overall: ConditionState,
        parent_relative: Option<Relativity>,
        parent_active: bool,
        direct: bool,
        eval: &mut EvaluatedAssignment,
    ) -> Result<(), EngineError> {
        let condition = ConditionState::evaluate(
            assignment.condition.as_ref(),
            focus.old.as_ref(),
            focus.new.as_ref(),
        );
        let overall = parent_overall.and(condition);
        if !overall.is_not_all_false() {
            trace!(
                assignment = assignment.id,
                source = %source,
                "skipping segment: condition holds in neither state"
            );
            return Ok(());
        }
        let relative = compose(parent_relative, condition.relativity());

        let active = assignment.is_active_at(self.now);
        let full_path_active = parent_active && active;

        let path = parent_path.push(PathStep {
            source: source.clone(),
            assignment_id: assignment.id,
            target: assignment.target.clone(),
            order,
        });

        let segment = Segment {
            source,
            assignment: assignment.clone(),
            path: path.clone(),
            order,
            overall,
            relative,
            active,
            full_path_active,
            direct,
        };
        collect_payload(&segment, self.options, eval);

        // Descend into the target: its own assignments (metaroles) and its
        // inducements.
        let Some(target_oid) = &assignment.target else {
            return Ok(());
        };
        if path.contains_source(target_oid) {
            return Err(EngineError::PolicyViolation(format!(
                "assignment cycle: {target_oid} is already on the evaluation path"
            )));
        }
        // Unresolvable targets do not sink the whole cycle unless the
        // failure makes further computation unsafe.
        let target = match self.resolver.resolve_policy_object(target_oid) {
            Ok(target) => target,
            Err(error) if error.aborts_computation() => return Err(error),
            Err(error) => {
                warn!(
                    target = %target_oid,
                    %error,
                    "assignment target cannot be resolved, skipping its sub-graph"
                );
                return Ok(());
            }
        };
        let target_condition = ConditionState::evaluate(
            target.condition.as_ref(),
            focus.old.as_ref(),
            focus.new.as_ref(),
        );
        let child_overall = overall.and(target_condition);
        if !child_overall.is_not_all_false() {
            trace!(
                target = %target_oid,
                "not descending into target: its condition holds in neither state"
            );
            return Ok(());
        }
        let child_relative = compose(relative, target_condition.relativity());

        for child in &target.assignments {
            self.evaluate_segment(
                focus,
                target.oid.clone(),
                child,
                path.clone(),
                order.for_assignment_edge(),
                child_overall,
                child_relative,
                full_path_active,
                false,
                eval,
            )?;
        }
        for inducement in &target.inducements {
            self.evaluate_segment(
                focus,
                target.oid.clone(),
                inducement,
                path.clone(),
                order.for_inducement(inducement.order),
                child_overall,
                child_relative,
                full_path_active,
                false,
                eval,
            )?;
        }
        Ok(())
    }
}

/// Compose factor relativities along a path; an undefined factor makes the
/// whole composition undefined.
fn compose(parent: Option<Relativity>, own: Option<Relativity>) -> Option<Relativity> {
    match (parent, own) {
        (Some(parent), Some(own)) => Some(parent.compose(own)),
        _ => None,
    }
}
