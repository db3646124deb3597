//! Error definitions for the mapping module

use thiserror::Error;

/// Error types of the mapping engine
///
/// The `Unknown*`, `MissingField` and `InvalidRepeat` variants describe a single bad
/// configuration entry. They are collected while the binding table is resolved and
/// never abort the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("Unknown input element: {0}")]
    UnknownElement(String),

    #[error("Unknown key: {0}")]
    UnknownKey(String),

    #[error("Unknown modifier: {0}")]
    UnknownModifier(String),

    #[error("Unknown action type: {0}")]
    UnknownActionType(String),

    #[error("Unknown trigger mode: {0}")]
    UnknownTriggerMode(String),

    #[error("Unknown mouse button: {0}")]
    UnknownMouseButton(String),

    /// A field required by the action type is absent
    #[error("Missing field '{field}' for {context}")]
    MissingField { field: &'static str, context: String },

    #[error("Invalid repeat policy: {0}")]
    InvalidRepeat(String),

    /// Error in the configuration of the engine
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error during initialization of the runtime
    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// Error while managing the runtime task
    #[error("Thread error: {0}")]
    ThreadError(String),
}
