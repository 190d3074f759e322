//! Host error types

use modulus_api::{ModuleError, ModuleName};
use std::fmt;

/// Host error type
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A module with this name is already registered
    #[error("Module already registered: {0}")]
    DuplicateModule(ModuleName),

    /// A module declares dependencies that are not registered
    #[error("Module {module} is missing dependencies: {}", join(missing))]
    MissingDependency {
        /// Module that cannot load
        module: ModuleName,
        /// Dependencies that are not registered
        missing: Vec<ModuleName>,
    },

    /// No module with this name is registered
    #[error("Unknown module: {0}")]
    UnknownModule(ModuleName),

    /// No event kind with this name is registered
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// An event kind with this name is already registered
    #[error("Event already registered: {0}")]
    DuplicateEvent(String),

    /// Operation not allowed in the module's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A factory or lifecycle hook failed
    #[error("Module {module} failed: {source}")]
    Module {
        /// Failing module
        module: ModuleName,
        /// Error reported by the module
        #[source]
        source: ModuleError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for host operations
pub type Result<T> = std::result::Result<T, HostError>;

fn join(names: &[ModuleName]) -> String {
    names
        .iter()
        .map(ModuleName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl HostError {
    /// Create a new duplicate module error
    pub fn duplicate_module(name: impl Into<ModuleName>) -> Self {
        Self::DuplicateModule(name.into())
    }

    /// Create a new unknown module error
    pub fn unknown_module(name: impl Into<ModuleName>) -> Self {
        Self::UnknownModule(name.into())
    }

    /// Create a new unknown event error
    pub fn unknown_event(name: impl fmt::Display) -> Self {
        Self::UnknownEvent(name.to_string())
    }

    /// Create a new invalid state error
    pub fn invalid_state(msg: impl fmt::Display) -> Self {
        Self::InvalidState(msg.to_string())
    }

    /// Create a new config error
    pub fn config(msg: impl fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Wrap an error reported by a module
    pub fn module(module: impl Into<ModuleName>, source: ModuleError) -> Self {
        Self::Module {
            module: module.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = HostError::duplicate_module("chat");
        assert!(matches!(err, HostError::DuplicateModule(_)));

        let err = HostError::unknown_event("chat.request");
        assert!(matches!(err, HostError::UnknownEvent(_)));
    }

    #[test]
    fn test_error_display() {
        let err = HostError::MissingDependency {
            module: ModuleName::from("chat"),
            missing: vec![ModuleName::from("logger"), ModuleName::from("settings")],
        };
        assert_eq!(
            err.to_string(),
            "Module chat is missing dependencies: logger, settings"
        );

        let err = HostError::module("chat", ModuleError::lifecycle("boom"));
        assert_eq!(err.to_string(), "Module chat failed: Lifecycle error: boom");
    }
}
