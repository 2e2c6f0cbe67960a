// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maintenance of focus-to-projection links.
//!
//! Runs after every execution attempt of a projection context. Whether a
//! link should exist follows purely from the liveness of the projection
//! object, which makes the update idempotent within a cycle: a second call
//! observing the same liveness finds nothing to change.

use refract_core::{EngineError, FocusRepository, LinkChange, Liveness};
use tracing::{debug, trace};

use crate::context::{FocusContext, ProjectionContext};

/// Bring the link between the focus object and the context's projection
/// object in sync with the object's liveness.
pub(crate) fn update_links<P: FocusRepository>(
    focus: &mut FocusContext,
    ctx: &ProjectionContext,
    repository: &mut P,
) -> Result<(), EngineError> {
    let Some(kind) = focus.kind() else {
        trace!("no focus object, no links to maintain");
        return Ok(());
    };
    if !kind.has_linkage() {
        trace!(?kind, "focus kind carries no links");
        return Ok(());
    }
    // Higher-order contexts describe an aspect of an object that the
    // order-zero context already links.
    if ctx.is_higher_order() {
        trace!(discriminator = %ctx.discriminator, "higher-order context, link untouched");
        return Ok(());
    }
    let Some(focus_oid) = focus.oid().cloned() else {
        return Ok(());
    };
    let Some(object_oid) = ctx.oid().cloned() else {
        trace!(discriminator = %ctx.discriminator, "projection object has no oid yet");
        return Ok(());
    };

    let liveness = Liveness::of(ctx.current_object.as_ref());
    let Some(new) = &mut focus.new else {
        // Focus on its way out; its links go away with it.
        return Ok(());
    };
    match liveness {
        Liveness::Live => {
            if new.links.insert(object_oid.clone()) {
                debug!(focus = %focus_oid, object = %object_oid, "linking projection object");
                repository.update_link(&focus_oid, LinkChange::Link(object_oid))?;
            }
        }
        Liveness::Tombstone | Liveness::Absent => {
            if new.links.remove(&object_oid) {
                debug!(focus = %focus_oid, object = %object_oid, "unlinking projection object");
                repository.update_link(&focus_oid, LinkChange::Unlink(object_oid))?;
            }
        }
    }
    Ok(())
}
