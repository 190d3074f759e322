//! Module error types

use std::fmt;

/// Error raised by module code: factories, lifecycle hooks and event accessors
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// Lifecycle hook failed
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Instantiation failed
    #[error("Instantiation failed: {0}")]
    Instantiate(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An output value did not match the event kind's output type
    #[error("Output does not match event '{event}': {reason}")]
    OutputMismatch {
        /// Event name
        event: &'static str,
        /// Why the conversion failed
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Result type for module operations
pub type Result<T> = std::result::Result<T, ModuleError>;

impl ModuleError {
    /// Create a new lifecycle error
    pub fn lifecycle(msg: impl fmt::Display) -> Self {
        Self::Lifecycle(msg.to_string())
    }

    /// Create a new instantiation error
    pub fn instantiate(msg: impl fmt::Display) -> Self {
        Self::Instantiate(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config(msg: impl fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create a new other error
    pub fn other(msg: impl fmt::Display) -> Self {
        Self::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ModuleError::lifecycle("boom");
        assert!(matches!(err, ModuleError::Lifecycle(_)));

        let err = ModuleError::instantiate("no memory");
        assert!(matches!(err, ModuleError::Instantiate(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ModuleError::OutputMismatch {
            event: "chat",
            reason: "missing field `response`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Output does not match event 'chat': missing field `response`"
        );
    }
}
