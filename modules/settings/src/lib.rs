//! # Settings Module
//!
//! Answers [`GetSettingEvent`] lookups from a per-module settings table,
//! typically the `settings` section of the host configuration.
//!
//! ```yaml
//! settings:
//!   chat:
//!     seed: 42
//! ```
//!
//! Unknown settings are left unhandled so that another settings source with a
//! higher handle priority value can still answer.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

use async_trait::async_trait;
use modulus_api::events::GetSettingOutput;
use modulus_api::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Module name
pub const NAME: &str = "settings";

/// Settings of every module, keyed by module then setting name
pub type SettingsTable = HashMap<ModuleName, HashMap<String, Value>>;

/// Serves settings from an in-memory table
#[derive(Debug, Default)]
pub struct SettingsModule {
    settings: SettingsTable,
}

impl SettingsModule {
    /// Static metadata of the settings module
    ///
    /// Loads first so that other load-first modules can read their settings
    /// while loading.
    pub fn descriptor() -> ModuleDescriptor {
        let version = env!("CARGO_PKG_VERSION")
            .parse()
            .unwrap_or_else(|_| Version::new(0, 1, 0));

        ModuleDescriptor::new(NAME, version)
            .with_description("Serves module settings from host configuration")
            .with_load_first(true)
            .with_load_priority(-50)
    }

    /// Create a module serving `settings`
    pub fn new(settings: SettingsTable) -> Self {
        Self { settings }
    }

    /// Look up one setting
    pub fn get(&self, module: &str, name: &str) -> Option<&Value> {
        self.settings.get(module)?.get(name)
    }
}

#[async_trait]
impl Module for SettingsModule {
    fn can_handle(&self, event: &dyn Event) -> bool {
        event.is::<GetSettingEvent>()
    }

    async fn handle(&self, event: &mut dyn Event) {
        let Some(lookup) = event.downcast_mut::<GetSettingEvent>() else {
            return;
        };
        let Some(module) = lookup.input.module.as_ref() else {
            trace!(setting = %lookup.input.name, "Setting lookup without a module");
            return;
        };

        match self.get(module.as_str(), &lookup.input.name) {
            Some(value) => {
                let setting = value.clone();
                lookup.respond(GetSettingOutput { setting });
            }
            None => {
                trace!(module = %module, setting = %lookup.input.name, "Unknown setting");
            }
        }
    }

    async fn on_loading(&self) -> modulus_api::Result<()> {
        debug!(modules = self.settings.len(), "Settings module loading");
        Ok(())
    }
}

/// Provides [`SettingsModule`] to a host
#[derive(Debug, Clone, Default)]
pub struct SettingsProvider {
    settings: SettingsTable,
}

impl SettingsProvider {
    /// Create a provider whose modules serve `settings`
    pub fn new(settings: SettingsTable) -> Self {
        Self { settings }
    }
}

impl ModuleFactory for SettingsProvider {
    fn create(&self, _ctx: &ModuleContext) -> modulus_api::Result<Arc<dyn Module>> {
        Ok(Arc::new(SettingsModule::new(self.settings.clone())))
    }
}

impl ModuleProvider for SettingsProvider {
    fn descriptor(&self) -> ModuleDescriptor {
        SettingsModule::descriptor()
    }
}
