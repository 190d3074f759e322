//! Host facade wiring registry, lifecycle, dispatcher and event catalog

use crate::config::HostConfig;
use crate::dispatcher::{EventDispatcher, InFlightEvent};
use crate::error::Result;
use crate::events::EventRegistry;
use crate::lifecycle::LifecycleManager;
use crate::registry::{ModuleInfo, ModuleRecord, ModuleRegistry};
use async_trait::async_trait;
use modulus_api::{
    Event, GetSettingEvent, HostHandle, LoggingEvent, Module, ModuleDescriptor, ModuleFactory,
    ModuleName, ModuleProvider, Version,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{info, warn};

const DEFAULT_APPLICATION_NAME: &str = "modulus";

type EventRegistration = fn(&EventRegistry) -> Result<()>;

/// Builder for [`Host`]
pub struct HostBuilder {
    config: HostConfig,
    application_name: Option<String>,
    working_directory: Option<PathBuf>,
    modules: Vec<(ModuleDescriptor, Arc<dyn ModuleFactory>)>,
    events: Vec<EventRegistration>,
}

impl fmt::Debug for HostBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBuilder")
            .field("config", &self.config)
            .field("application_name", &self.application_name)
            .field("working_directory", &self.working_directory)
            .field(
                "modules",
                &self.modules.iter().map(|(d, _)| &d.name).collect::<Vec<_>>(),
            )
            .field("events", &self.events.len())
            .finish()
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HostConfig::default(),
            application_name: None,
            working_directory: None,
            modules: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Use this configuration
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the application name
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Override the working directory
    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Add a module descriptor with its factory
    pub fn module<F>(mut self, descriptor: ModuleDescriptor, factory: F) -> Self
    where
        F: ModuleFactory + 'static,
    {
        self.modules.push((descriptor, Arc::new(factory)));
        self
    }

    /// Add a module provider
    pub fn provider<P>(self, provider: P) -> Self
    where
        P: ModuleProvider + 'static,
    {
        let descriptor = provider.descriptor();
        self.module(descriptor, provider)
    }

    /// Register an event kind beyond the standard ones
    pub fn event<E: Event + Default>(mut self) -> Self {
        self.events.push(|events| events.register::<E>());
        self
    }

    /// Build the host
    ///
    /// Fails when two modules or two event kinds share a name. No module is
    /// loaded yet.
    pub fn build(self) -> Result<Host> {
        let HostBuilder {
            config,
            application_name,
            working_directory,
            modules,
            events: extra_events,
        } = self;

        config.validate()?;

        let registry = Arc::new(ModuleRegistry::new());
        for (descriptor, factory) in modules {
            registry.register_arc(descriptor, factory)?;
        }

        let events = EventRegistry::new();
        events.register::<LoggingEvent>()?;
        events.register::<GetSettingEvent>()?;
        for register in extra_events {
            register(&events)?;
        }

        let application_name = application_name
            .or_else(|| config.application_name.clone())
            .unwrap_or_else(default_application_name);

        let working_directory = match working_directory.or_else(|| config.working_directory.clone())
        {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };

        let lifecycle_config = config.lifecycle();
        let shared = Arc::new_cyclic(|weak: &Weak<HostShared>| {
            let handle: Weak<dyn HostHandle> = weak.clone();
            HostShared {
                lifecycle: LifecycleManager::with_host(registry.clone(), lifecycle_config, handle),
                dispatcher: EventDispatcher::new(registry.clone()),
                registry,
                events,
                config,
                application_name,
                working_directory,
            }
        });

        info!(
            application = %shared.application_name,
            modules = shared.registry.len(),
            events = shared.events.len(),
            "Host created"
        );

        Ok(Host { shared })
    }
}

fn default_application_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or_else(|| DEFAULT_APPLICATION_NAME.to_string())
}

/// State shared between the host and the module contexts pointing at it
struct HostShared {
    registry: Arc<ModuleRegistry>,
    lifecycle: LifecycleManager,
    dispatcher: EventDispatcher,
    events: EventRegistry,
    config: HostConfig,
    application_name: String,
    working_directory: PathBuf,
}

#[async_trait]
impl HostHandle for HostShared {
    async fn handle(&self, event: &mut dyn Event) {
        self.dispatcher.dispatch(event).await;
    }

    fn can_handle(&self, event: &dyn Event) -> bool {
        self.dispatcher.can_handle(event)
    }

    fn application_name(&self) -> &str {
        &self.application_name
    }

    fn working_directory(&self) -> &Path {
        &self.working_directory
    }
}

/// Composition root of the module system
///
/// Dropping a host with loaded modules unloads them on a spawned task when a
/// tokio runtime is available. Call [`Host::shutdown`] to unload
/// deterministically.
pub struct Host {
    shared: Arc<HostShared>,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("application_name", &self.shared.application_name)
            .field("working_directory", &self.shared.working_directory)
            .field("modules", &self.shared.registry.names())
            .field("events", &self.shared.events.known_kinds())
            .finish()
    }
}

impl Host {
    /// Start building a host
    pub fn builder() -> HostBuilder {
        HostBuilder::new()
    }

    /// Dispatch an event; check [`Event::handled`] afterwards
    pub async fn handle(&self, event: &mut dyn Event) {
        self.shared.dispatcher.dispatch(event).await;
    }

    /// Whether any loaded module can handle the event
    pub fn can_handle(&self, event: &dyn Event) -> bool {
        self.shared.dispatcher.can_handle(event)
    }

    /// Module management facade
    pub fn modules(&self) -> ModuleManager<'_> {
        ModuleManager {
            shared: &self.shared,
        }
    }

    /// Known event kinds
    pub fn events(&self) -> &EventRegistry {
        &self.shared.events
    }

    /// Module registry
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.shared.registry
    }

    /// Lifecycle manager
    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.shared.lifecycle
    }

    /// Event dispatcher
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.shared.dispatcher
    }

    /// Events currently being dispatched
    pub fn in_flight(&self) -> Vec<InFlightEvent> {
        self.shared.dispatcher.in_flight()
    }

    /// Configuration the host was built with
    pub fn config(&self) -> &HostConfig {
        &self.shared.config
    }

    /// Application name
    pub fn application_name(&self) -> &str {
        &self.shared.application_name
    }

    /// Base directory for module resources
    pub fn working_directory(&self) -> &Path {
        &self.shared.working_directory
    }

    /// A handle to this host as modules see it
    pub fn handle_ref(&self) -> Arc<dyn HostHandle> {
        self.shared.clone()
    }

    /// Unload every loaded module
    pub async fn shutdown(&self) -> Result<Vec<ModuleName>> {
        info!(application = %self.shared.application_name, "Shutting down host");
        self.shared.lifecycle.unload(None).await
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        if self.shared.registry.loaded().is_empty() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let shared = self.shared.clone();
                runtime.spawn(async move {
                    if let Err(e) = shared.lifecycle.unload(None).await {
                        warn!(error = %e, "Unloading modules on host drop failed");
                    }
                });
            }
            Err(_) => {
                warn!(
                    modules = ?self.shared.registry.names(),
                    "Host dropped outside a tokio runtime with modules still loaded"
                );
            }
        }
    }
}

/// Module management view of a [`Host`]
#[derive(Clone, Copy)]
pub struct ModuleManager<'a> {
    shared: &'a HostShared,
}

impl fmt::Debug for ModuleManager<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleManager")
            .field("modules", &self.shared.registry.names())
            .finish()
    }
}

impl ModuleManager<'_> {
    /// Load all modules, or the named subset
    pub async fn load(&self, subset: Option<&[ModuleName]>) -> Result<Vec<ModuleName>> {
        self.shared.lifecycle.load(subset).await
    }

    /// Unload all modules, or the named subset
    pub async fn unload(&self, subset: Option<&[ModuleName]>) -> Result<Vec<ModuleName>> {
        self.shared.lifecycle.unload(subset).await
    }

    /// Reload all modules, or the named subset
    pub async fn reload(&self, subset: Option<&[ModuleName]>) -> Result<Vec<ModuleName>> {
        self.shared.lifecycle.reload(subset).await
    }

    /// Load the modules listed in the host configuration's `autoload`, or all
    pub async fn autoload(&self) -> Result<Vec<ModuleName>> {
        let subset = self.shared.config.autoload.clone();
        self.shared.lifecycle.load(subset.as_deref()).await
    }

    /// Whether a module is registered, optionally within inclusive version bounds
    pub fn has_module(&self, name: &str, min: Option<&Version>, max: Option<&Version>) -> bool {
        self.shared.registry.query(name, min, max)
    }

    /// Loaded modules in registration order
    pub fn get_loaded(&self) -> Vec<Arc<ModuleRecord>> {
        self.shared.registry.loaded()
    }

    /// Loaded instances of the concrete module type `M`, in registration order
    pub fn get_modules_by_type<M: Module>(&self) -> Vec<Arc<M>> {
        self.shared
            .registry
            .loaded()
            .iter()
            .filter_map(|record| record.instance())
            .filter_map(|module| module.downcast_arc::<M>())
            .collect()
    }

    /// Loaded modules able to handle the event, in handling order
    pub fn get_loaded_for(&self, event: &dyn Event) -> Vec<Arc<ModuleRecord>> {
        self.shared.registry.handle_order(event)
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<ModuleName> {
        self.shared.registry.names()
    }

    /// Snapshots of every registered module
    pub fn infos(&self) -> Vec<ModuleInfo> {
        self.shared.registry.infos()
    }

    /// Register a module after the host was built
    pub fn register<F>(&self, descriptor: ModuleDescriptor, factory: F) -> Result<()>
    where
        F: ModuleFactory + 'static,
    {
        self.shared.registry.register(descriptor, factory).map(|_| ())
    }

    /// Register a provider after the host was built
    pub fn register_provider<P>(&self, provider: P) -> Result<()>
    where
        P: ModuleProvider + 'static,
    {
        self.shared.registry.register_provider(provider).map(|_| ())
    }

    /// Unregister a module that is not loaded
    pub fn unregister(&self, name: &str) -> Result<()> {
        self.shared.registry.unregister(name).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use modulus_api::testing::{
        Call, Journal, Probe, ProbeEvent, RecordingBuilder, RecordingModule,
    };
    use modulus_api::{EventKind, Module, ModuleContext, ModuleError, Severity};
    use std::time::Duration;

    fn quick_config() -> HostConfig {
        HostConfig {
            unload_grace: Duration::ZERO,
            ..HostConfig::default()
        }
    }

    #[tokio::test]
    async fn test_build_registers_standard_events() {
        let host = Host::builder()
            .config(quick_config())
            .application_name("test-app")
            .working_directory("/tmp/modulus")
            .build()
            .unwrap();

        assert_eq!(
            host.events().known_kinds(),
            vec!["modulus.logging", "modulus.get_setting"]
        );
        assert_eq!(host.application_name(), "test-app");
        assert_eq!(host.working_directory(), Path::new("/tmp/modulus"));
    }

    #[tokio::test]
    async fn test_build_rejects_duplicate_modules() {
        let journal = Journal::new();
        let result = Host::builder()
            .provider(RecordingBuilder::new("a", &journal).build())
            .provider(RecordingBuilder::new("a", &journal).build())
            .build();

        assert!(matches!(result, Err(HostError::DuplicateModule(_))));
    }

    #[tokio::test]
    async fn test_module_manager_facade() {
        let journal = Journal::new();
        let host = Host::builder()
            .config(quick_config())
            .provider(
                RecordingBuilder::new("a", &journal)
                    .version(Version::new(1, 5, 0))
                    .handles(Probe::NAME)
                    .build(),
            )
            .build()
            .unwrap();

        let modules = host.modules();
        assert!(modules.has_module("a", Some(&Version::new(1, 0, 0)), None));
        assert!(!modules.has_module("a", None, Some(&Version::new(1, 0, 0))));

        modules.load(None).await.unwrap();
        assert_eq!(modules.get_loaded().len(), 1);
        assert!(host.can_handle(&ProbeEvent::default()));

        modules
            .register_provider(RecordingBuilder::new("b", &journal).build())
            .unwrap();
        assert_eq!(
            modules.names(),
            vec![ModuleName::from("a"), ModuleName::from("b")]
        );
        assert!(modules.infos()[0].loaded);

        host.shutdown().await.unwrap();
        assert!(modules.get_loaded().is_empty());
        assert_eq!(journal.count(&Call::Destroyed), 1);
    }

    #[tokio::test]
    async fn test_autoload_subset() {
        let journal = Journal::new();
        let host = Host::builder()
            .config(HostConfig {
                autoload: Some(vec![ModuleName::from("b")]),
                ..quick_config()
            })
            .provider(RecordingBuilder::new("a", &journal).build())
            .provider(RecordingBuilder::new("b", &journal).build())
            .build()
            .unwrap();

        let loaded = host.modules().autoload().await.unwrap();
        assert_eq!(loaded, vec![ModuleName::from("b")]);
        host.shutdown().await.unwrap();
    }

    /// Forwards probes to a logging event through its own context
    #[derive(Debug)]
    struct Relay {
        ctx: ModuleContext,
    }

    #[async_trait]
    impl Module for Relay {
        fn can_handle(&self, event: &dyn Event) -> bool {
            event.is::<ProbeEvent>()
        }

        async fn handle(&self, event: &mut dyn Event) {
            let mut log = LoggingEvent::message(Severity::Debug, "relayed");
            let logged = self.ctx.dispatch(&mut log).await;
            if let Some(probe) = event.downcast_mut::<ProbeEvent>() {
                probe.respond(format!("logged={logged}"));
            }
        }
    }

    #[tokio::test]
    async fn test_reentrant_dispatch() {
        let journal = Journal::new();
        let host = Host::builder()
            .config(quick_config())
            .module(
                ModuleDescriptor::new("relay", Version::new(1, 0, 0)),
                |ctx: &ModuleContext| -> std::result::Result<Arc<dyn Module>, ModuleError> {
                    Ok(Arc::new(Relay { ctx: ctx.clone() }))
                },
            )
            .provider(
                RecordingBuilder::new("logger", &journal)
                    .handles(LoggingEvent::default().name())
                    .build(),
            )
            .build()
            .unwrap();
        host.modules().load(None).await.unwrap();

        let mut probe = ProbeEvent::default();
        host.handle(&mut probe).await;

        assert_eq!(probe.output.as_deref(), Some("logged=true"));
        assert_eq!(journal.count(&Call::Handle("modulus.logging")), 1);
        assert!(host.in_flight().is_empty());
        host.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_get_modules_by_type() {
        let journal = Journal::new();
        let host = Host::builder()
            .config(quick_config())
            .module(
                ModuleDescriptor::new("relay", Version::new(1, 0, 0)),
                |ctx: &ModuleContext| -> std::result::Result<Arc<dyn Module>, ModuleError> {
                    Ok(Arc::new(Relay { ctx: ctx.clone() }))
                },
            )
            .provider(RecordingBuilder::new("a", &journal).build())
            .provider(RecordingBuilder::new("b", &journal).build())
            .build()
            .unwrap();

        assert!(host.modules().get_modules_by_type::<Relay>().is_empty());

        host.modules().load(None).await.unwrap();
        let relays = host.modules().get_modules_by_type::<Relay>();
        assert_eq!(relays.len(), 1);
        assert_eq!(relays[0].ctx.name(), "relay");
        assert_eq!(host.modules().get_modules_by_type::<RecordingModule>().len(), 2);

        host.shutdown().await.unwrap();
        assert!(host.modules().get_modules_by_type::<RecordingModule>().is_empty());
    }

    #[tokio::test]
    async fn test_handle_ref_dispatches() {
        let journal = Journal::new();
        let host = Host::builder()
            .config(quick_config())
            .provider(RecordingBuilder::new("a", &journal).handles(Probe::NAME).build())
            .build()
            .unwrap();
        host.modules().load(None).await.unwrap();

        let handle = host.handle_ref();
        let mut probe = ProbeEvent::default();
        handle.handle(&mut probe).await;
        assert_eq!(probe.output.as_deref(), Some("a"));
        assert_eq!(handle.application_name(), host.application_name());
        host.shutdown().await.unwrap();
    }
}
