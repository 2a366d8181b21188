//! kextplan Library
//!
//! Kext selection, conflict resolution and load-order planning for OpenCore
//! EFI builds.

pub mod catalog;
pub mod cli;
pub mod config_file;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod logic;
pub mod planner;
pub mod types;

// Re-export main types for convenience
pub use catalog::{KextCatalog, KextDescriptor};
pub use config_file::PlannerSettings;
pub use error::{KextPlanError, Result};
pub use hardware::HardwareFacts;
pub use planner::{KextPlanner, Resolution};
pub use types::{CyclePolicy, DarwinVersion, VersionBounds};

// Selection logic
pub use logic::compat::{AllowUnsupported, DenyUnsupported, Incompatibility, OverrideDecision};
pub use logic::resolver::DependencyResolver;
pub use logic::selection::SelectionSet;

// Load-order engine
pub use engine::bundle::{BundleOwner, BundleRecord};
pub use engine::load_order::{BoundAdjustment, LoadOrderLinearizer, ManifestEntry, SuppressionRule};
pub use engine::manifest::KernelAddEntry;
pub use engine::variants::{Condition, VariantRule};
