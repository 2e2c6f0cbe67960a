// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change computation and execution for identity governance.
//!
//! The engine takes a requested change to a focus object (a user, role,
//! org or service), evaluates its assignment graph to find out what should
//! exist on which target systems, and executes the resulting deltas in
//! dependency order. Computation is pure relative to the boundary traits
//! in [`refract_core`]; execution talks to targets exclusively through the
//! [`DeltaExecutor`](refract_core::DeltaExecutor) boundary.
//!
//! The main entry point is [`ChangeEngine::run`], which runs one full
//! change cycle: graph walking, payload collection, inbound and outbound
//! consolidation, wave scheduling, projection execution and link
//! bookkeeping.

pub mod consolidate;
pub mod context;
mod engine;
mod executor;
pub mod inbound;
mod link;
pub mod path;
pub mod payload;
pub mod rel;
mod report;
pub mod walker;
mod waves;


pub use engine::{ChangeEngine, ChangeRequest, ProjectionSeed};
pub use executor::ExecutionOutcome;
pub use report::{ChangeReport, ProjectionReport, ProjectionStatus};
