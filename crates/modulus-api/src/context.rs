//! Host handle and per-module context

use crate::descriptor::{ModuleDescriptor, ModuleName};
use crate::event::Event;
use crate::events::{GetSettingEvent, LoggingEvent, Severity};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

/// The part of a host that modules are allowed to talk to
#[async_trait]
pub trait HostHandle: Send + Sync {
    /// Dispatch an event through the host
    ///
    /// Check [`Event::handled`] afterwards; there is no other failure signal.
    async fn handle(&self, event: &mut dyn Event);

    /// Whether any loaded module can handle the event
    fn can_handle(&self, event: &dyn Event) -> bool;

    /// Name of the embedding application
    fn application_name(&self) -> &str;

    /// Base directory for module resources
    fn working_directory(&self) -> &Path;
}

/// Context handed to a module factory
///
/// Holds a weak reference to the host so that module instances never keep
/// their host alive.
#[derive(Clone)]
pub struct ModuleContext {
    descriptor: ModuleDescriptor,
    host: Option<Weak<dyn HostHandle>>,
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("module", &self.descriptor.name)
            .field("attached", &self.host().is_some())
            .finish()
    }
}

impl ModuleContext {
    /// Create a context attached to a host
    pub fn new(descriptor: ModuleDescriptor, host: Weak<dyn HostHandle>) -> Self {
        Self {
            descriptor,
            host: Some(host),
        }
    }

    /// Create a context without a host, dispatching goes nowhere
    pub fn detached(descriptor: ModuleDescriptor) -> Self {
        Self {
            descriptor,
            host: None,
        }
    }

    /// Descriptor of the module owning this context
    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    /// Name of the module owning this context
    pub fn name(&self) -> &ModuleName {
        &self.descriptor.name
    }

    /// The host, if it is still alive
    pub fn host(&self) -> Option<Arc<dyn HostHandle>> {
        self.host.as_ref().and_then(Weak::upgrade)
    }

    /// Dispatch an event through the host and report whether it was handled
    pub async fn dispatch(&self, event: &mut dyn Event) -> bool {
        match self.host() {
            Some(host) => {
                host.handle(event).await;
                event.handled()
            }
            None => false,
        }
    }

    /// Path of a resource inside this module's directory under the host working directory
    pub fn resource_path(&self, relative: impl AsRef<Path>) -> Option<PathBuf> {
        self.host().map(|host| {
            host.working_directory()
                .join(self.descriptor.name.as_str())
                .join(relative)
        })
    }

    /// Send a [`LoggingEvent`] on behalf of this module
    ///
    /// Fails silently when no logging module is loaded: reporting that failure
    /// through another log event could never succeed either.
    pub async fn log(&self, severity: Severity, message: impl Into<String>) {
        let mut event = LoggingEvent::message(severity, message);
        event.input.source = Some(self.descriptor.name.clone());
        self.dispatch(&mut event).await;
    }

    /// Look up a setting for this module through a [`GetSettingEvent`]
    ///
    /// Returns `default` when no module answers, when the answer is empty or
    /// when it cannot be converted to `T`; each case is logged.
    pub async fn get_setting<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        let mut event = GetSettingEvent::lookup(self.descriptor.name.clone(), name);

        if !self.dispatch(&mut event).await {
            self.log(
                Severity::Error,
                format!(
                    "No module handled {} for setting '{name}'",
                    GetSettingEvent::default().name()
                ),
            )
            .await;
            return default;
        }

        let Some(output) = event.output.take() else {
            self.log(
                Severity::Debug,
                format!("Setting '{name}' was handled without an output"),
            )
            .await;
            return default;
        };

        if output.setting.is_null() {
            self.log(Severity::Debug, format!("Setting '{name}' is null")).await;
            return default;
        }

        match T::deserialize(&output.setting) {
            Ok(value) => value,
            Err(e) => {
                self.log(
                    Severity::Warning,
                    format!(
                        "Setting '{name}' has unexpected type, expected {}: {e}",
                        std::any::type_name::<T>()
                    ),
                )
                .await;
                default
            }
        }
    }
}
