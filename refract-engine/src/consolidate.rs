// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consolidation of the collected payload: merges constructions from all
//! evaluated assignments into projection contexts and their deltas, and
//! turns focus mapping requests into focus item deltas.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use refract_core::{
    Discriminator, EngineError, ItemDelta, ObjectDelta, ResourceObject, delta::ATTRIBUTE_PREFIX,
};
use tracing::{debug, trace};

use crate::context::{ChangeCycle, SyncIntent};
use crate::payload::{CollectedConstruction, EvaluatedAssignment};
use crate::rel::Relativity;

/// Merge the collected constructions into projection contexts.
///
/// Constructions are grouped per discriminator so that several assignments
/// contributing to the same projection produce one context (and one delta).
/// A discriminator with at least one valid, non-removed construction is
/// wanted; one reached only through removed paths is deprovisioned.
pub fn consolidate_constructions(
    cycle: &mut ChangeCycle,
    evaluated: &[EvaluatedAssignment],
) -> Result<(), EngineError> {
    let mut groups: BTreeMap<Discriminator, Vec<&CollectedConstruction>> = BTreeMap::new();
    for assignment in evaluated {
        for collected in &assignment.constructions {
            let discriminator = Discriminator {
                resource: collected.construction.resource.clone(),
                tag: collected.construction.tag.clone(),
                order: collected.construction.order,
            };
            groups.entry(discriminator).or_default().push(collected);
        }
    }

    for (discriminator, group) in groups {
        let wanted: Vec<&&CollectedConstruction> = group
            .iter()
            .filter(|c| c.valid && c.relativity != Relativity::Removed)
            .collect();

        if wanted.is_empty() {
            // Only invalid or removed constructions: deprovision if a
            // projection is there, otherwise nothing to do.
            let any_removed = group.iter().any(|c| c.relativity == Relativity::Removed);
            if !any_removed {
                trace!(%discriminator, "only invalid constructions, nothing to apply");
                continue;
            }
            let ctx = cycle.ensure_projection(&discriminator);
            ctx.intent = SyncIntent::Delete;
            debug!(%discriminator, "projection no longer wanted, intent set to delete");
            continue;
        }

        // Evaluate the attribute mappings of every wanted construction
        // against the (already updated) new focus state, merging values
        // per attribute.
        let mut attributes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        {
            let focus_new = cycle.focus.new.as_ref();
            for collected in &wanted {
                for mapping in &collected.construction.attributes {
                    let values = mapping.expr.evaluate(focus_new);
                    attributes
                        .entry(mapping.attribute.clone())
                        .or_default()
                        .extend(values);
                }
            }
        }

        let ctx = cycle.ensure_projection(&discriminator);
        ctx.intent = SyncIntent::Keep;
        let delta = match &ctx.current_object {
            None => {
                let mut object = ResourceObject::new(discriminator.resource.clone());
                object.attributes = attributes;
                Some(ObjectDelta::Add { object })
            }
            Some(current) => {
                let oid = current.oid.clone().ok_or_else(|| {
                    EngineError::SchemaViolation(format!(
                        "projection {discriminator} has an object without an identifier"
                    ))
                })?;
                let mut modifications = Vec::new();
                for (attribute, values) in attributes {
                    let current_values = current.attribute(&attribute);
                    if current_values != Some(&values) {
                        modifications.push(ItemDelta::replace_values(
                            format!("{ATTRIBUTE_PREFIX}{attribute}"),
                            values,
                        ));
                    }
                }
                if modifications.is_empty() {
                    None
                } else {
                    Some(ObjectDelta::Modify { oid, modifications })
                }
            }
        };
        trace!(%discriminator, delta = ?delta, "consolidated projection delta");
        ctx.set_deltas(delta);
    }

    Ok(())
}

/// Evaluate the collected focus mapping requests and swallow the resulting
/// item deltas into the focus secondary delta.
///
/// Requests with added or unchanged relativity contribute values computed
/// from the new state; requests with removed relativity retract the values
/// they contributed, computed from the old state.
pub fn evaluate_focus_mappings(cycle: &mut ChangeCycle, evaluated: &[EvaluatedAssignment]) {
    let mut deltas = Vec::new();
    for assignment in evaluated {
        for request in &assignment.focus_mapping_requests {
            let delta = match request.relativity {
                Relativity::Added | Relativity::Unchanged => {
                    let values = request.mapping.expr.evaluate(cycle.focus.new.as_ref());
                    if values.is_empty() {
                        continue;
                    }
                    ItemDelta::add_values(request.mapping.target_item.clone(), values)
                }
                Relativity::Removed => {
                    let values = request.mapping.expr.evaluate(cycle.focus.old.as_ref());
                    if values.is_empty() {
                        continue;
                    }
                    ItemDelta::delete_values(request.mapping.target_item.clone(), values)
                }
            };
            trace!(
                mapping = %request.mapping.name,
                source = %request.source,
                "focus mapping evaluated"
            );
            deltas.push(delta);
        }
    }
    cycle.focus.swallow_to_secondary_delta(deltas);
}
