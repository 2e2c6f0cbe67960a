// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payload collection: constructions, focus mappings and policy rules
//! gathered from the segments of one direct assignment's sub-graph.

use refract_core::{
    AssignmentId, Construction, MappingSpec, Oid, PersonaConstruction, PolicyRuleSpec,
    ResourceConstruction, RuleScope,
};
use tracing::trace;

use crate::context::CycleOptions;
use crate::rel::Relativity;
use crate::walker::Segment;

/// Accumulator bound to one direct assignment. Populated across the whole
/// sub-graph reachable through that assignment, consumed once by delta
/// computation, then discarded.
#[derive(Debug)]
pub struct EvaluatedAssignment {
    pub assignment_id: AssignmentId,
    pub target: Option<Oid>,
    pub constructions: Vec<CollectedConstruction>,
    pub personas: Vec<CollectedPersona>,
    pub focus_mapping_requests: Vec<FocusMappingRequest>,
    pub object_rules: Vec<CollectedRule>,
    pub target_rules: Vec<CollectedRule>,
}

impl EvaluatedAssignment {
    pub fn new(assignment_id: AssignmentId, target: Option<Oid>) -> Self {
        Self {
            assignment_id,
            target,
            constructions: Vec::new(),
            personas: Vec::new(),
            focus_mapping_requests: Vec::new(),
            object_rules: Vec::new(),
            target_rules: Vec::new(),
        }
    }
}

/// A resource object construction, tagged with the absolute relativity of
/// the full path it was reached through. The tag determines whether the
/// construction is later treated as "to add" or "to remove".
#[derive(Clone, Debug)]
pub struct CollectedConstruction {
    pub construction: ResourceConstruction,
    pub relativity: Relativity,
    /// Valid only when the full path is active and the composed condition
    /// holds in the new state. Invalid constructions are collected (they
    /// may come from invalid direct assignments) but never applied.
    pub valid: bool,
    pub source: Oid,
}

/// A persona construction, collected the same way but not executed as a
/// projection; the caller materializes personas in follow-up operations.
#[derive(Clone, Debug)]
pub struct CollectedPersona {
    pub construction: PersonaConstruction,
    pub relativity: Relativity,
    pub valid: bool,
}

/// Request to evaluate one focus mapping, carrying the relative relativity
/// mode of its segment.
#[derive(Clone, Debug)]
pub struct FocusMappingRequest {
    pub mapping: MappingSpec,
    pub relativity: Relativity,
    pub source: Oid,
}

/// A policy rule together with the scope it was collected with and the
/// object carrying it.
#[derive(Clone, Debug)]
pub struct CollectedRule {
    pub rule: PolicyRuleSpec,
    pub scope: RuleScope,
    pub source: Oid,
}

/// Collect one segment's payload into the evaluated assignment.
///
/// Mirrors the asymmetries of the policy semantics: constructions are
/// collected even from invalid direct assignments (marked invalid), focus
/// mappings only from fully active paths, object policy rules from invalid
/// direct assignments too but only with non-negative relative relativity.
pub fn collect_payload(
    segment: &Segment,
    options: &CycleOptions,
    eval: &mut EvaluatedAssignment,
) {
    if options.login_mode {
        trace!(
            assignment = segment.assignment.id,
            "skipping payload: login mode"
        );
        return;
    }
    if !segment.active && !segment.direct {
        trace!(
            assignment = segment.assignment.id,
            "skipping payload: not active and not directly assigned"
        );
        return;
    }

    // Directly assigned assignments are visited even when inactive.

    if segment.order.is_matching() {
        collect_construction(segment, eval);
        if segment.full_path_active {
            collect_focus_mappings(segment, eval);
        }
        if non_negative(segment.relative) {
            collect_object_rule(segment, eval);
        }
    }

    if segment.order.is_matching_for_target() && non_negative(segment.relative) {
        collect_target_rule(segment, eval);
    }
}

fn non_negative(relativity: Option<Relativity>) -> bool {
    relativity.is_some_and(Relativity::is_non_negative)
}

fn collect_construction(segment: &Segment, eval: &mut EvaluatedAssignment) {
    let Some(construction) = &segment.assignment.construction else {
        return;
    };
    let Some(absolute) = segment.overall.relativity() else {
        // All-false segments are skipped by the walker already.
        return;
    };
    let valid = segment.full_path_active && segment.overall.new;
    match construction {
        Construction::Resource(construction) => {
            trace!(
                resource = %construction.resource,
                source = %segment.source,
                valid,
                "collecting resource object construction"
            );
            eval.constructions.push(CollectedConstruction {
                construction: construction.clone(),
                relativity: absolute,
                valid,
                source: segment.source.clone(),
            });
        }
        Construction::Persona(construction) => {
            trace!(
                archetype = %construction.archetype,
                source = %segment.source,
                valid,
                "collecting persona construction"
            );
            eval.personas.push(CollectedPersona {
                construction: construction.clone(),
                relativity: absolute,
                valid,
            });
        }
    }
}

fn collect_focus_mappings(segment: &Segment, eval: &mut EvaluatedAssignment) {
    if segment.assignment.focus_mappings.is_empty() {
        return;
    }
    let Some(relativity) = segment.relative else {
        // The overall condition state can be "true,false to false", which
        // makes the relative state false-to-false: the mappings contribute
        // nothing. Not an error.
        trace!(
            assignment = segment.assignment.id,
            "focus mappings contribute nothing: relative relativity is undefined"
        );
        return;
    };
    for mapping in &segment.assignment.focus_mappings {
        eval.focus_mapping_requests.push(FocusMappingRequest {
            mapping: mapping.clone(),
            relativity,
            source: segment.source.clone(),
        });
    }
}

fn collect_object_rule(segment: &Segment, eval: &mut EvaluatedAssignment) {
    if let Some(rule) = &segment.assignment.policy_rule {
        trace!(rule = %rule.name, source = %segment.source, "collecting object policy rule");
        eval.object_rules.push(CollectedRule {
            rule: rule.clone(),
            scope: RuleScope::Object,
            source: segment.source.clone(),
        });
    }
}

fn collect_target_rule(segment: &Segment, eval: &mut EvaluatedAssignment) {
    let Some(rule) = &segment.assignment.policy_rule else {
        return;
    };
    // The rule applies directly to the evaluated assignment's target when
    // exactly one segment along the path has target order zero. A chain
    // like focus -> captain -> sailor has two such segments: rules carried
    // by the sailor edge apply to the focus only indirectly.
    let applies_directly = segment.path.zero_target_order_count() == 1;
    let scope = if applies_directly {
        RuleScope::DirectTarget
    } else {
        RuleScope::IndirectTarget
    };
    trace!(
        rule = %rule.name,
        source = %segment.source,
        applies_directly,
        "collecting target policy rule"
    );
    eval.target_rules.push(CollectedRule {
        rule: rule.clone(),
        scope,
        source: segment.source.clone(),
    });
}
