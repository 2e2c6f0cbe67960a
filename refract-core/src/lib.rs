// SPDX-License-Identifier: MIT OR Apache-2.0

//! Object model, deltas and boundary traits for the refract identity engine.
//!
//! A _focus object_ is the canonical identity record (a person, role or
//! similar entity). Its footprint on an external target system is a
//! _projection_, described by a resource object. Policy edges (_assignments_
//! and _inducements_) connect focus objects to roles, orgs and resource
//! object _constructions_.
//!
//! This crate holds the passive parts of the system: the objects themselves,
//! the delta types used to describe changes to them, and the traits behind
//! which the repository, connector, clock and policy-rule consumers live.
//! The change-computation and change-execution engine is in
//! `refract-engine`.

pub mod assignment;
pub mod delta;
pub mod error;
pub mod object;
pub mod resource;
#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;
pub mod traits;

pub use assignment::{
    Assignment, AssignmentId, AttributeMapping, Condition, Construction, MappingExpr, MappingSpec,
    PersonaConstruction, PolicyRuleSpec, ResourceConstruction, ValidityWindow,
};
pub use delta::{
    ItemDelta, ObjectDelta, equivalent_add_deltas, equivalent_deltas, equivalent_modify_deltas,
};
pub use error::{Criticality, EngineError};
pub use object::{
    FocusKind, FocusObject, IdentityRecord, Liveness, Oid, PolicyObject, PolicyObjectKind,
    ResourceObject,
};
pub use resource::{Discriminator, InboundCombiner, InboundMappingSpec, ResourceDef};
pub use traits::{
    Clock, DeltaExecutor, FocusRepository, HookPhase, LinkChange, ObjectResolver, PolicyRuleSink,
    ReconciliationHook, RuleScope, Timestamp, values,
};
