//! # Console Logging Module
//!
//! Handles [`LoggingEvent`] by turning each record into a `tracing` event, so
//! module log output ends up wherever the embedding application's subscriber
//! sends it.
//!
//! | Severity    | tracing level |
//! |-------------|---------------|
//! | `analytics` | `INFO`        |
//! | `debug`     | `DEBUG`       |
//! | `warning`   | `WARN`        |
//! | `error`     | `ERROR`       |
//!
//! ## Example
//!
//! ```rust,no_run
//! use modulus_console_logging::{ConsoleLoggingConfig, ConsoleLoggingProvider};
//!
//! let provider = ConsoleLoggingProvider::new(ConsoleLoggingConfig {
//!     analytics: false,
//!     ..Default::default()
//! });
//! # let _ = provider;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

use async_trait::async_trait;
use modulus_api::events::LoggingInput;
use modulus_api::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Module name
pub const NAME: &str = "console-logging";

/// Logging must be reachable before anything else handles an event
pub const HANDLE_PRIORITY: i16 = 0;

/// Module configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleLoggingConfig {
    /// Whether analytics records are emitted
    #[serde(default = "default_analytics")]
    pub analytics: bool,

    /// Whether structured arguments are included in the output
    #[serde(default = "default_include_arguments")]
    pub include_arguments: bool,
}

fn default_analytics() -> bool {
    true
}

fn default_include_arguments() -> bool {
    true
}

impl Default for ConsoleLoggingConfig {
    fn default() -> Self {
        Self {
            analytics: true,
            include_arguments: true,
        }
    }
}

/// Writes logging events through `tracing`
#[derive(Debug)]
pub struct ConsoleLoggingModule {
    config: ConsoleLoggingConfig,
    records: AtomicU64,
}

impl ConsoleLoggingModule {
    /// Static metadata of the console logging module
    pub fn descriptor() -> ModuleDescriptor {
        let version = env!("CARGO_PKG_VERSION")
            .parse()
            .unwrap_or_else(|_| Version::new(0, 1, 0));

        ModuleDescriptor::new(NAME, version)
            .with_description("Writes module log records through tracing")
            .with_handle_priority(HANDLE_PRIORITY)
            .with_load_first(true)
            .with_load_priority(-100)
    }

    /// Create a module with the given configuration
    pub fn new(config: ConsoleLoggingConfig) -> Self {
        Self {
            config,
            records: AtomicU64::new(0),
        }
    }

    /// Number of records written so far
    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    fn write(&self, record: &LoggingInput) -> bool {
        let source = record
            .source
            .as_ref()
            .map_or("host", ModuleName::as_str);
        let message = record.message.as_str();
        let arguments = if self.config.include_arguments && !record.arguments.is_empty() {
            serde_json::Value::from(record.arguments.clone()).to_string()
        } else {
            String::new()
        };

        match record.severity {
            Severity::Analytics if !self.config.analytics => return false,
            Severity::Analytics => {
                info!(target: "modulus::analytics", source, arguments = %arguments, "{message}")
            }
            Severity::Debug => {
                debug!(target: "modulus::module", source, arguments = %arguments, "{message}")
            }
            Severity::Warning => {
                warn!(target: "modulus::module", source, arguments = %arguments, "{message}")
            }
            Severity::Error => {
                error!(target: "modulus::module", source, arguments = %arguments, "{message}")
            }
        }

        self.records.fetch_add(1, Ordering::Relaxed);
        true
    }
}

impl Default for ConsoleLoggingModule {
    fn default() -> Self {
        Self::new(ConsoleLoggingConfig::default())
    }
}

#[async_trait]
impl Module for ConsoleLoggingModule {
    fn can_handle(&self, event: &dyn Event) -> bool {
        event.is::<LoggingEvent>()
    }

    async fn handle(&self, event: &mut dyn Event) {
        let Some(log) = event.downcast_mut::<LoggingEvent>() else {
            return;
        };

        // Suppressed analytics stay unhandled so another module may record them
        if self.write(&log.input) {
            log.set_handled(true);
        }
    }

    async fn on_loading(&self) -> modulus_api::Result<()> {
        debug!(
            analytics = self.config.analytics,
            include_arguments = self.config.include_arguments,
            "Console logging module loading"
        );
        Ok(())
    }

    async fn on_unloaded(&self) -> modulus_api::Result<()> {
        debug!(records = self.records(), "Console logging module unloaded");
        Ok(())
    }
}

/// Provides [`ConsoleLoggingModule`] to a host
#[derive(Debug, Clone, Default)]
pub struct ConsoleLoggingProvider {
    config: ConsoleLoggingConfig,
}

impl ConsoleLoggingProvider {
    /// Create a provider whose modules use `config`
    pub fn new(config: ConsoleLoggingConfig) -> Self {
        Self { config }
    }
}

impl ModuleFactory for ConsoleLoggingProvider {
    fn create(&self, _ctx: &ModuleContext) -> modulus_api::Result<Arc<dyn Module>> {
        Ok(Arc::new(ConsoleLoggingModule::new(self.config.clone())))
    }
}

impl ModuleProvider for ConsoleLoggingProvider {
    fn descriptor(&self) -> ModuleDescriptor {
        ConsoleLoggingModule::descriptor()
    }
}
