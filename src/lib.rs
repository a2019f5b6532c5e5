// Identifier renumbering for interlinked passages: assigns every node a slot so
// that linked nodes sit close together without landing too close.

#![deny(clippy::all)]

// Internal modules (implementation details)
mod community;
mod placement;
mod refine;
mod repair;
mod utils;
mod zones;

// Public modules (user-facing API)
pub mod cost;
pub mod error;
pub mod graph;
pub mod references;
pub mod renumber;
pub mod slots;
pub mod types;

// JS bindings
#[cfg(feature = "napi")]
pub mod napi_interface;
#[cfg(feature = "wasm")]
pub mod wasm;

// ===== Essential Public API =====
/// Main entry points
pub use renumber::{renumber, renumber_json, renumber_with_rng};

/// Input/output types
pub use types::{
    NodeRecord, RenumberConfig, RenumberOutcome, RenumberReport, RenumberedRecord, StatsSnapshot,
};

/// Configuration and diagnostics
pub use types::{
    parse_locked_list, DistanceRule, DistanceStats, ForcedPlacement, RepairStrategy, Stage,
    Unsatisfiable,
};

pub use error::{RenumberError, Result};

// ===== Advanced Public API =====
/// Graph, slot map and cost helpers for inspecting an assignment
pub use graph::LinkGraph;
pub use slots::SlotMap;
pub use types::{NodeIx, Slot};
