//! Error handling module for kextplan
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Policy decisions that are *not* errors (version-gated skips, dangling
//! dependency names, bundles without an identifier) never surface here; they
//! are logged and skipped by the engine instead.

use thiserror::Error;

/// Main error type for kextplan
#[derive(Error, Debug)]
pub enum KextPlanError {
    /// JSON parse errors (bundle record lists)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A Darwin version string that is not a numeric `major[.minor[.patch]]` triple
    #[error("Invalid Darwin version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    /// Structural problems in a kext catalog (duplicate names, inverted windows)
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// A cycle in declared bundle library dependencies
    #[error("Dependency cycle detected: {chain}")]
    DependencyCycle { chain: String },
}

/// Result type alias for kextplan operations
pub type Result<T> = std::result::Result<T, KextPlanError>;

// Convenient error constructors
impl KextPlanError {
    /// Create an invalid version error
    pub fn invalid_version(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidVersion {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a catalog error
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create a dependency cycle error from the identifiers on the cycle
    pub fn cycle<I, S>(chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let chain: Vec<String> = chain.into_iter().map(|s| s.as_ref().to_string()).collect();
        Self::DependencyCycle {
            chain: chain.join(" -> "),
        }
    }
}
