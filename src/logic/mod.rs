//! Logic modules: turn hardware facts and user choices into a kext selection.
//!
//! # Modules
//!
//! - `candidates`: hardware facts to candidate kext names
//! - `compat`: Darwin support windows and the override decision
//! - `selection`: per-run selection state
//! - `resolver`: select / deselect with dependency and conflict rules

pub mod candidates;
pub mod compat;
pub mod resolver;
pub mod selection;
