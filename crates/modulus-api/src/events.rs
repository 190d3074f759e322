//! Standard events understood by every host
//!
//! The host only routes these; a module must be loaded that handles them.

use crate::descriptor::ModuleName;
use crate::event::{Envelope, EventKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Log severity carried by a [`LoggingEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Usage and analytics records
    Analytics,
    /// Diagnostic detail
    #[default]
    Debug,
    /// Something unexpected that the module recovered from
    Warning,
    /// A failure
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Analytics => write!(f, "analytics"),
            Severity::Debug => write!(f, "debug"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Logging event kind
#[derive(Debug)]
pub struct Logging;

/// Input of a [`LoggingEvent`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingInput {
    /// Severity
    pub severity: Severity,

    /// Module that produced the record, if any
    #[serde(default)]
    pub source: Option<ModuleName>,

    /// Log message
    pub message: String,

    /// Additional structured arguments
    #[serde(default)]
    pub arguments: Vec<Value>,
}

/// Output of a [`LoggingEvent`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingOutput {}

impl EventKind for Logging {
    const NAME: &'static str = "modulus.logging";
    type Input = LoggingInput;
    type Output = LoggingOutput;
}

/// Event asking a logging module to record a message
pub type LoggingEvent = Envelope<Logging>;

impl LoggingEvent {
    /// Create a logging event
    pub fn message(severity: Severity, message: impl Into<String>) -> Self {
        Self::new(LoggingInput {
            severity,
            source: None,
            message: message.into(),
            arguments: Vec::new(),
        })
    }
}

/// Setting lookup event kind
#[derive(Debug)]
pub struct GetSetting;

/// Input of a [`GetSettingEvent`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetSettingInput {
    /// Module whose setting is requested
    pub module: Option<ModuleName>,

    /// Setting name
    pub name: String,
}

/// Output of a [`GetSettingEvent`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetSettingOutput {
    /// Setting value, `Null` when the setting exists without a value
    pub setting: Value,
}

impl EventKind for GetSetting {
    const NAME: &'static str = "modulus.get_setting";
    type Input = GetSettingInput;
    type Output = GetSettingOutput;
}

/// Event asking a settings module for a named setting
pub type GetSettingEvent = Envelope<GetSetting>;

impl GetSettingEvent {
    /// Create a lookup for `name` on behalf of `module`
    pub fn lookup(module: impl Into<ModuleName>, name: impl Into<String>) -> Self {
        Self::new(GetSettingInput {
            module: Some(module.into()),
            name: name.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    #[test]
    fn test_logging_event() {
        let event = LoggingEvent::message(Severity::Warning, "disk almost full");
        assert_eq!(event.name(), "modulus.logging");
        assert_eq!(event.input.severity, Severity::Warning);
        assert_eq!(event.input.message, "disk almost full");
    }

    #[test]
    fn test_get_setting_event() {
        let event = GetSettingEvent::lookup("chat", "greeting");
        assert_eq!(event.name(), "modulus.get_setting");
        assert_eq!(event.input.module, Some(ModuleName::from("chat")));
        assert_eq!(event.input.name, "greeting");
    }

    #[test]
    fn test_severity_serde() {
        assert_eq!(serde_json::to_string(&Severity::Error).unwrap(), "\"error\"");
        assert_eq!(Severity::Analytics.to_string(), "analytics");
    }
}
