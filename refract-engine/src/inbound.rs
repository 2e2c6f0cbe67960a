// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound consolidation: attribute values flowing from the projections
//! into the focus object.
//!
//! Requests are grouped by target focus item before anything is evaluated,
//! because several projections may feed the same item and the combining
//! rule must see all sources at once, not sequentially.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use refract_core::{EngineError, InboundCombiner, ItemDelta, ObjectResolver, Oid};
use tracing::{debug, trace};

use crate::context::ChangeCycle;

#[derive(Debug)]
struct InboundRequest {
    combiner: InboundCombiner,
    values: BTreeSet<String>,
    source: Oid,
}

/// Collect and evaluate inbound mappings from all projections, swallowing
/// the results into the focus secondary delta, then derive identity data
/// when configured.
pub fn process_inbound<R: ObjectResolver>(
    cycle: &mut ChangeCycle,
    resolver: &R,
) -> Result<(), EngineError> {
    let requests = collect_requests(cycle, resolver)?;

    let mut deltas = Vec::new();
    for (item, group) in &requests {
        let combined = combine(group);
        if combined.is_empty() {
            // No source produced anything; inbound never erases focus data
            // on its own.
            continue;
        }
        let current = cycle
            .focus
            .new
            .as_ref()
            .and_then(|focus| focus.item_values(item));
        if current == Some(&combined) {
            continue;
        }
        trace!(item, values = combined.len(), "inbound consolidation produced a delta");
        deltas.push(ItemDelta::replace_values(item.clone(), combined));
    }
    cycle.focus.swallow_to_secondary_delta(deltas);

    update_identity_data(cycle, &requests);
    Ok(())
}

/// Gather inbound mapping requests from every non-gone, in-scope
/// projection, keyed by target focus item.
fn collect_requests<R: ObjectResolver>(
    cycle: &ChangeCycle,
    resolver: &R,
) -> Result<BTreeMap<String, Vec<InboundRequest>>, EngineError> {
    let mut requests: BTreeMap<String, Vec<InboundRequest>> = BTreeMap::new();
    for ctx in cycle.projections() {
        if ctx.gone {
            trace!(discriminator = %ctx.discriminator, "skipping inbound: projection is gone");
            continue;
        }
        if !ctx.can_project {
            // Propagation is limited to the triggering resource; checked
            // before any further work on this projection.
            trace!(
                discriminator = %ctx.discriminator,
                "skipping inbound: changes must not propagate from this resource"
            );
            continue;
        }
        let definition = resolver.resolve_resource(&ctx.discriminator.resource)?;
        if definition.inbound.is_empty() {
            continue;
        }
        let Some(object) = ctx.current_object.as_ref().or(ctx.object_new.as_ref()) else {
            continue;
        };
        for mapping in &definition.inbound {
            let values = object
                .attribute(&mapping.source_attribute)
                .cloned()
                .unwrap_or_default();
            requests
                .entry(mapping.target_item.clone())
                .or_default()
                .push(InboundRequest {
                    combiner: mapping.combiner,
                    values,
                    source: ctx.discriminator.resource.clone(),
                });
        }
    }
    Ok(requests)
}

fn combine(group: &[InboundRequest]) -> BTreeSet<String> {
    // All mappings feeding one item are expected to agree on the combiner;
    // the first one decides.
    let combiner = group
        .first()
        .map(|request| request.combiner)
        .unwrap_or(InboundCombiner::Union);
    match combiner {
        InboundCombiner::FirstNonEmpty => group
            .iter()
            .map(|request| request.values.clone())
            .find(|values| !values.is_empty())
            .unwrap_or_default(),
        InboundCombiner::Union => group
            .iter()
            .flat_map(|request| request.values.iter().cloned())
            .collect(),
    }
}

/// Derive identity data from the inbound results: per configured item and
/// per source, the present values become the current record and any
/// previous current record is demoted to history.
///
/// An independent sub-step: skipped entirely, without failing the pass,
/// when no identity-management configuration is present.
fn update_identity_data(
    cycle: &mut ChangeCycle,
    requests: &BTreeMap<String, Vec<InboundRequest>>,
) {
    let Some(config) = cycle.options.identity_config.clone() else {
        trace!("no identity management configuration; identity data not updated");
        return;
    };
    let Some(focus) = cycle.focus.new.as_mut() else {
        return;
    };
    let mut updated = 0;
    for item in &config.items {
        let Some(group) = requests.get(item) else {
            continue;
        };
        for request in group {
            if request.values.is_empty() {
                continue;
            }
            let unchanged = focus.identities.iter().any(|record| {
                record.current
                    && record.item == *item
                    && record.source == request.source
                    && record.values == request.values
            });
            if unchanged {
                continue;
            }
            for record in focus.identities.iter_mut() {
                if record.current && record.item == *item && record.source == request.source {
                    record.current = false;
                }
            }
            focus.identities.push(refract_core::IdentityRecord {
                item: item.clone(),
                values: request.values.clone(),
                source: request.source.clone(),
                current: true,
            });
            updated += 1;
        }
    }
    debug!(records = updated, "identity data updated from inbound results");
}
