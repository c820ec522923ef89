//! Core error types for slotwise-core.
//!
//! Expected scheduling shortfalls (impossible deadlines, exhausted capacity,
//! broken dependency chains) are never errors: they are reported through
//! [`crate::SchedulingResult`]. The types here cover what genuinely cannot
//! proceed: unreadable configuration, undecodable context snapshots and
//! explicit graph edits that would break an invariant.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for slotwise-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home/config directory could not be resolved or created
    #[error("Configuration directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    /// Adding the edge would close a dependency loop
    #[error("Adding dependency {source_id} -> {target_id} would create a cycle")]
    DependencyCycle { source_id: String, target_id: String },

    /// A step cannot depend on itself
    #[error("Step '{0}' cannot depend on itself")]
    SelfDependency(String),

    /// Referenced step does not exist in the workflow
    #[error("Unknown step '{step}' in workflow '{workflow}'")]
    UnknownStep { workflow: String, step: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
