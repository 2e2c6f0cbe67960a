// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wave assignment and the wave scheduler.
//!
//! Projections are partitioned into waves so that a projection is executed
//! only after everything it depends on: resource dependencies first, then
//! lower-order contexts before higher-order ones on the same target. Wave
//! numbers come from a topological sort of the dependency graph; a cycle in
//! resource dependencies is a configuration error.

use std::collections::BTreeMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use refract_core::{
    DeltaExecutor, Discriminator, EngineError, FocusRepository, ObjectResolver, ReconciliationHook,
};
use tracing::{debug, trace, warn};

use crate::context::{ChangeCycle, SyncDecision};
use crate::executor::{ExecutionOutcome, ProjectionExecution};
use crate::report::ProjectionStatus;

/// How many times one wave may be restarted before its remaining contexts
/// are given up on. Restarts are driven by "already exists" conflicts and
/// the executor breaks a repeated conflict after the second attempt, so
/// this limit is only ever reached with several independently conflicting
/// projections in one wave.
const WAVE_RESTART_LIMIT: u32 = 4;

/// Assign a wave to every projection context.
///
/// Edges run from prerequisite to dependent; the wave of a context is one
/// more than the highest wave among its prerequisites, zero without any.
pub(crate) fn assign_waves<R: ObjectResolver>(
    cycle: &mut ChangeCycle,
    resolver: &R,
) -> Result<(), EngineError> {
    let count = cycle.projection_count();
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for index in 0..count {
        graph.add_node(index);
    }

    for index in 0..count {
        let discriminator = cycle.projection(index).discriminator.clone();
        let definition = resolver.resolve_resource(&discriminator.resource)?;
        for dependency in &definition.dependencies {
            for other in 0..count {
                if other != index && cycle.projection(other).discriminator.resource == *dependency {
                    graph.add_edge(other, index, ());
                }
            }
        }
        // A higher-order context materializes only after its lower-order
        // siblings on the same target.
        for other in 0..count {
            let sibling = &cycle.projection(other).discriminator;
            if sibling.resource == discriminator.resource
                && sibling.tag == discriminator.tag
                && sibling.order < discriminator.order
            {
                graph.add_edge(other, index, ());
            }
        }
    }

    let sorted = toposort(&graph, None).map_err(|cycle_node| {
        let discriminator = cycle.projection(cycle_node.node_id()).discriminator.clone();
        EngineError::Configuration(format!(
            "dependency cycle among projections involving {discriminator}"
        ))
    })?;

    let mut waves = vec![0u32; count];
    for node in sorted {
        let wave = graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|prerequisite| waves[prerequisite] + 1)
            .max()
            .unwrap_or(0);
        waves[node] = wave;
        trace!(
            discriminator = %cycle.projection(node).discriminator,
            wave,
            "wave assigned"
        );
    }
    for index in 0..count {
        cycle.projection_mut(index).set_wave(waves[index]);
    }
    Ok(())
}

/// Run all waves to completion.
///
/// Waves execute in ascending order. When any context in a wave requests a
/// restart the whole wave is retried; contexts completed in earlier passes
/// stay untouched because completion is checked per context.
pub(crate) fn run_waves<X, H, P>(
    cycle: &mut ChangeCycle,
    connector: &mut X,
    hooks: &mut H,
    repository: &mut P,
) -> Result<BTreeMap<Discriminator, ProjectionStatus>, EngineError>
where
    X: DeltaExecutor,
    H: ReconciliationHook,
    P: FocusRepository,
{
    let mut statuses = BTreeMap::new();
    let mut restarts = 0u32;
    loop {
        let wave = cycle.execution_wave;
        let eligible: Vec<usize> = (0..cycle.projection_count())
            .filter(|&index| {
                let ctx = cycle.projection(index);
                ctx.wave() == Some(wave) && !ctx.completed
            })
            .collect();

        let mut restart_requested = false;
        if !eligible.is_empty() {
            debug!(wave, contexts = eligible.len(), "executing wave");
            for index in eligible {
                let discriminator = cycle.projection(index).discriminator.clone();
                let outcome =
                    ProjectionExecution::new(cycle, index, connector, hooks, repository).run()?;
                trace!(discriminator = %discriminator, ?outcome, "projection executed");
                statuses.insert(discriminator, ProjectionStatus::from(outcome));
                if outcome == ExecutionOutcome::RestartRequested {
                    restart_requested = true;
                }
            }
        }

        if restart_requested {
            restarts += 1;
            if restarts > WAVE_RESTART_LIMIT {
                warn!(wave, restarts, "wave restart limit reached, breaking pending contexts");
                break_pending_contexts(cycle, wave, &mut statuses);
            }
            continue;
        }

        match cycle.max_wave() {
            Some(max) if max > wave => {
                cycle.execution_wave += 1;
                restarts = 0;
            }
            _ => break,
        }
    }
    Ok(statuses)
}

/// Give up on every context still pending in the wave so the scheduler is
/// guaranteed to make progress.
fn break_pending_contexts(
    cycle: &mut ChangeCycle,
    wave: u32,
    statuses: &mut BTreeMap<Discriminator, ProjectionStatus>,
) {
    for ctx in cycle.projections_mut() {
        if ctx.wave() == Some(wave) && !ctx.completed {
            ctx.decision = SyncDecision::Broken;
            ctx.last_error = Some(EngineError::Configuration(format!(
                "wave {wave} restart limit exceeded"
            )));
            ctx.completed = true;
            statuses.insert(ctx.discriminator.clone(), ProjectionStatus::Broken);
        }
    }
}
