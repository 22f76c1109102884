//! Planning module for convergence.
//!
//! This module compares stored, declared and observed resource state and
//! classifies the difference as a create, update, delete, drift or no-op.

mod collections;
mod diff;

pub use collections::{ListDiff, MapDiff, list_diff, map_diff};
pub use diff::{DiffDetail, DiffEngine, DiffType, ResourceDiff};
