//! Module registry: records, orderings and presence queries

use crate::error::{HostError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use modulus_api::{
    Event, Module, ModuleContext, ModuleDescriptor, ModuleFactory, ModuleName, ModuleProvider,
    Version,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle state of a registered module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// Registered, no instance
    Registered,

    /// Factory running
    Initializing,

    /// Instance constructed, not loaded
    Initialized,

    /// `on_loading` running
    Loading,

    /// Loaded and receiving events
    Loaded,

    /// `on_unloading` running or waiting for `on_unloaded`
    Unloading,

    /// Unloaded and instance released
    Unloaded,

    /// A factory or lifecycle hook failed
    Failed(String),
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleState::Registered => write!(f, "registered"),
            ModuleState::Initializing => write!(f, "initializing"),
            ModuleState::Initialized => write!(f, "initialized"),
            ModuleState::Loading => write!(f, "loading"),
            ModuleState::Loaded => write!(f, "loaded"),
            ModuleState::Unloading => write!(f, "unloading"),
            ModuleState::Unloaded => write!(f, "unloaded"),
            ModuleState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Registry entry: descriptor, factory and live instance of one module
///
/// `loaded` is the flag the dispatcher reads; it is flipped by the lifecycle
/// manager independently of `state`, which is informational.
pub struct ModuleRecord {
    descriptor: ModuleDescriptor,
    seq: u64,
    factory: Arc<dyn ModuleFactory>,
    instance: RwLock<Option<Arc<dyn Module>>>,
    loaded: AtomicBool,
    state: RwLock<ModuleState>,
    registered_at: DateTime<Utc>,
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("descriptor", &self.descriptor)
            .field("seq", &self.seq)
            .field("initialized", &self.is_initialized())
            .field("loaded", &self.is_loaded())
            .field("state", &*self.state.read())
            .finish()
    }
}

impl ModuleRecord {
    /// Module descriptor
    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    /// Module name
    pub fn name(&self) -> &ModuleName {
        &self.descriptor.name
    }

    /// Registration sequence number, the tie-break of every ordering
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether an instance has been constructed
    pub fn is_initialized(&self) -> bool {
        self.instance.read().is_some()
    }

    /// Whether the module currently receives events
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ModuleState {
        self.state.read().clone()
    }

    /// When the module was registered
    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// The live instance, if constructed
    pub fn instance(&self) -> Option<Arc<dyn Module>> {
        self.instance.read().clone()
    }

    /// The live instance, only while loaded
    pub(crate) fn loaded_instance(&self) -> Option<Arc<dyn Module>> {
        if self.is_loaded() {
            self.instance()
        } else {
            None
        }
    }

    pub(crate) fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::Release);
    }

    pub(crate) fn set_state(&self, state: ModuleState) {
        *self.state.write() = state;
    }

    /// Construct the instance unless one exists; returns whether the factory ran
    pub(crate) fn initialize(&self, ctx: &ModuleContext) -> Result<bool> {
        if self.is_initialized() {
            return Ok(false);
        }

        self.set_state(ModuleState::Initializing);
        match self.factory.create(ctx) {
            Ok(instance) => {
                *self.instance.write() = Some(instance);
                self.set_state(ModuleState::Initialized);
                debug!(module = %self.name(), "Module instantiated");
                Ok(true)
            }
            Err(e) => {
                self.set_state(ModuleState::Failed(e.to_string()));
                Err(HostError::module(self.name().clone(), e))
            }
        }
    }

    /// Hand the instance back to the factory's destructor
    pub(crate) fn release(&self) {
        let instance = self.instance.write().take();
        if let Some(instance) = instance {
            self.factory.destroy(instance);
            debug!(module = %self.name(), "Module instance released");
        }
    }

    /// Serializable snapshot of this record
    pub fn info(&self) -> ModuleInfo {
        ModuleInfo {
            descriptor: self.descriptor.clone(),
            state: self.state(),
            initialized: self.is_initialized(),
            loaded: self.is_loaded(),
            registered_at: self.registered_at,
        }
    }
}

/// Snapshot of a registered module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Module descriptor
    pub descriptor: ModuleDescriptor,

    /// Lifecycle state
    pub state: ModuleState,

    /// Whether an instance exists
    pub initialized: bool,

    /// Whether the module receives events
    pub loaded: bool,

    /// Registration time
    pub registered_at: DateTime<Utc>,
}

type SortedCache = RwLock<Option<Vec<Arc<ModuleRecord>>>>;

/// Registry of module records
///
/// Records are kept in registration order. Load order and handle order are
/// cached sorts of that list, dropped on every registration change. Every
/// ordering call returns an owned snapshot, so callers iterate safely while
/// other tasks register or unregister modules.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    /// Records in registration order
    records: RwLock<Vec<Arc<ModuleRecord>>>,

    /// Name index
    index: DashMap<ModuleName, Arc<ModuleRecord>>,

    /// Records sorted by load order
    load_sorted: SortedCache,

    /// Records sorted by handle priority
    handle_sorted: SortedCache,

    next_seq: AtomicU64,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module descriptor with its factory
    ///
    /// Fails with [`HostError::DuplicateModule`] when the name is taken; the
    /// registry is left unchanged in that case.
    pub fn register<F>(&self, descriptor: ModuleDescriptor, factory: F) -> Result<Arc<ModuleRecord>>
    where
        F: ModuleFactory + 'static,
    {
        self.register_arc(descriptor, Arc::new(factory))
    }

    /// Register a provider under its own descriptor
    pub fn register_provider<P>(&self, provider: P) -> Result<Arc<ModuleRecord>>
    where
        P: ModuleProvider + 'static,
    {
        let descriptor = provider.descriptor();
        self.register(descriptor, provider)
    }

    /// Register a descriptor with a shared factory
    pub fn register_arc(
        &self,
        descriptor: ModuleDescriptor,
        factory: Arc<dyn ModuleFactory>,
    ) -> Result<Arc<ModuleRecord>> {
        let mut records = self.records.write();

        if self.index.contains_key(&descriptor.name) {
            return Err(HostError::DuplicateModule(descriptor.name));
        }

        let record = Arc::new(ModuleRecord {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            factory,
            instance: RwLock::new(None),
            loaded: AtomicBool::new(false),
            state: RwLock::new(ModuleState::Registered),
            registered_at: Utc::now(),
            descriptor,
        });

        records.push(record.clone());
        self.index.insert(record.name().clone(), record.clone());
        self.invalidate();

        info!(
            module = %record.name(),
            version = %record.descriptor().version,
            "Module registered"
        );

        Ok(record)
    }

    /// Remove a module that holds no instance
    pub fn unregister(&self, name: &str) -> Result<Arc<ModuleRecord>> {
        let mut records = self.records.write();

        let record = self
            .index
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| HostError::unknown_module(name))?;

        if record.is_loaded() || record.is_initialized() {
            return Err(HostError::invalid_state(format!(
                "Module {name} must be unloaded before it is unregistered"
            )));
        }

        records.retain(|r| r.seq != record.seq);
        self.index.remove(name);
        self.invalidate();

        info!(module = %name, "Module unregistered");

        Ok(record)
    }

    /// Check presence and, when bounds are given, an inclusive version range
    pub fn query(&self, name: &str, min: Option<&Version>, max: Option<&Version>) -> bool {
        self.index
            .get(name)
            .map(|record| record.descriptor().version_within(min, max))
            .unwrap_or(false)
    }

    /// Whether a module with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get a record by name
    pub fn get(&self, name: &str) -> Option<Arc<ModuleRecord>> {
        self.index.get(name).map(|entry| entry.value().clone())
    }

    /// All records in registration order
    pub fn records(&self) -> Vec<Arc<ModuleRecord>> {
        self.records.read().clone()
    }

    /// All names in registration order
    pub fn names(&self) -> Vec<ModuleName> {
        self.records
            .read()
            .iter()
            .map(|record| record.name().clone())
            .collect()
    }

    /// Load-first records, then the rest, each ascending by load priority
    pub fn load_order(&self) -> Vec<Arc<ModuleRecord>> {
        self.sorted(&self.load_sorted, |record| {
            let descriptor = record.descriptor();
            (!descriptor.load_first, descriptor.load_priority, record.seq)
        })
    }

    /// Loaded records able to handle the event, ascending by handle priority
    pub fn handle_order(&self, event: &dyn Event) -> Vec<Arc<ModuleRecord>> {
        self.sorted(&self.handle_sorted, |record| {
            (false, record.descriptor().handle_priority, record.seq)
        })
        .into_iter()
        .filter(|record| {
            record
                .loaded_instance()
                .map_or(false, |module| module.can_handle(event))
        })
        .collect()
    }

    /// Loaded records observing the event before handling, in registration order
    pub fn observers_before(&self, event: &dyn Event) -> Vec<Arc<ModuleRecord>> {
        self.loaded_where(|module| module.observes_before(event))
    }

    /// Loaded records observing the event after handling, in registration order
    pub fn observers_after(&self, event: &dyn Event) -> Vec<Arc<ModuleRecord>> {
        self.loaded_where(|module| module.observes_after(event))
    }

    /// Loaded records in registration order
    pub fn loaded(&self) -> Vec<Arc<ModuleRecord>> {
        self.loaded_where(|_| true)
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no module is registered
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Snapshots of every record in registration order
    pub fn infos(&self) -> Vec<ModuleInfo> {
        self.records.read().iter().map(|r| r.info()).collect()
    }

    fn loaded_where(&self, filter: impl Fn(&dyn Module) -> bool) -> Vec<Arc<ModuleRecord>> {
        self.records()
            .into_iter()
            .filter(|record| {
                record
                    .loaded_instance()
                    .map_or(false, |module| filter(module.as_ref()))
            })
            .collect()
    }

    fn sorted<K>(
        &self,
        cache: &SortedCache,
        key: impl Fn(&ModuleRecord) -> K,
    ) -> Vec<Arc<ModuleRecord>>
    where
        K: Ord,
    {
        if let Some(sorted) = cache.read().as_ref() {
            return sorted.clone();
        }

        // Hold the record lock so a concurrent registration cannot be overwritten by a stale sort
        let records = self.records.read();
        let mut sorted = records.clone();
        sorted.sort_by_key(|record| key(record));
        *cache.write() = Some(sorted.clone());
        sorted
    }

    fn invalidate(&self) {
        *self.load_sorted.write() = None;
        *self.handle_sorted.write() = None;
    }
}
