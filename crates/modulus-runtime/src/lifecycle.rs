//! Module lifecycle: validation, two-phase loading, unloading and reloading

use crate::error::{HostError, Result};
use crate::registry::{ModuleRecord, ModuleRegistry, ModuleState};
use modulus_api::{HostHandle, ModuleContext, ModuleError, ModuleName};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info};

/// Default delay between the unloading and unloaded phases
pub const DEFAULT_UNLOAD_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle manager settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Delay between `on_unloading` and `on_unloaded`, letting cross-module
    /// calls started while unloading finish
    #[serde(default = "default_unload_grace", with = "humantime_serde")]
    pub unload_grace: Duration,
}

fn default_unload_grace() -> Duration {
    DEFAULT_UNLOAD_GRACE
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            unload_grace: DEFAULT_UNLOAD_GRACE,
        }
    }
}

/// Drives modules through load, unload and reload
///
/// Calls run inline on the caller's task and hold no lock while a module
/// hook runs, so hooks may dispatch events or query the registry. Concurrent
/// lifecycle calls over overlapping module sets are not coordinated.
pub struct LifecycleManager {
    registry: Arc<ModuleRegistry>,
    config: LifecycleConfig,
    host: Option<Weak<dyn HostHandle>>,
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("modules", &self.registry.len())
            .field("config", &self.config)
            .field("attached", &self.host.is_some())
            .finish()
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Loading,
    Loaded,
    Unloading,
    Unloaded,
}

impl LifecycleManager {
    /// Create a manager whose modules get detached contexts
    pub fn new(registry: Arc<ModuleRegistry>, config: LifecycleConfig) -> Self {
        Self {
            registry,
            config,
            host: None,
        }
    }

    /// Create a manager whose modules get contexts attached to `host`
    pub fn with_host(
        registry: Arc<ModuleRegistry>,
        config: LifecycleConfig,
        host: Weak<dyn HostHandle>,
    ) -> Self {
        Self {
            registry,
            config,
            host: Some(host),
        }
    }

    /// Underlying registry
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Current settings
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Load every registered module, or only the named subset
    ///
    /// Dependencies of every target are validated before anything changes.
    /// Load-first targets then run both phases before the others start, and
    /// each module is marked loaded right after its own `on_loading`, so later
    /// modules and `on_loaded` hooks can already reach it. Targets that are
    /// already loaded are skipped. Returns the modules loaded by this call.
    pub async fn load(&self, subset: Option<&[ModuleName]>) -> Result<Vec<ModuleName>> {
        let targets = self.targets(subset)?;
        self.validate(&targets)?;

        for record in &targets {
            record.initialize(&self.context_for(record))?;
        }

        let (first, rest): (Vec<_>, Vec<_>) = targets
            .into_iter()
            .partition(|record| record.descriptor().load_first);

        let mut loaded = Vec::new();
        for pass in [first, rest] {
            let mut flipped = Vec::new();
            for record in pass {
                if record.is_loaded() {
                    continue;
                }
                record.set_state(ModuleState::Loading);
                self.run(&record, Phase::Loading).await?;
                record.set_loaded(true);
                flipped.push(record);
            }

            for record in flipped {
                self.run(&record, Phase::Loaded).await?;
                record.set_state(ModuleState::Loaded);
                info!(module = %record.name(), "Module loaded");
                loaded.push(record.name().clone());
            }
        }

        Ok(loaded)
    }

    /// Unload every loaded module, or only the named subset, in reverse load order
    ///
    /// Every target stops receiving events after its `on_unloading`. After the
    /// grace window `on_unloaded` runs in the same order and the instances are
    /// handed back to their factories. Targets left in `Unloading` by an
    /// earlier failed call resume at `on_unloaded`. Returns the modules
    /// unloaded by this call.
    pub async fn unload(&self, subset: Option<&[ModuleName]>) -> Result<Vec<ModuleName>> {
        let mut targets = self.targets(subset)?;
        targets.reverse();

        let mut unloading = Vec::new();
        for record in &targets {
            if record.is_loaded() {
                record.set_state(ModuleState::Unloading);
                self.run(record, Phase::Unloading).await?;
                record.set_loaded(false);
                unloading.push(record.clone());
            } else if record.state() == ModuleState::Unloading {
                debug!(module = %record.name(), "Resuming interrupted unload");
                unloading.push(record.clone());
            }
        }

        if !unloading.is_empty() && !self.config.unload_grace.is_zero() {
            debug!(
                grace = ?self.config.unload_grace,
                modules = unloading.len(),
                "Waiting for unloading modules to settle"
            );
            tokio::time::sleep(self.config.unload_grace).await;
        }

        for record in &unloading {
            self.run(record, Phase::Unloaded).await?;
        }

        for record in &targets {
            if record.is_initialized() && !record.is_loaded() {
                record.release();
                record.set_state(ModuleState::Unloaded);
            }
        }

        for record in &unloading {
            info!(module = %record.name(), "Module unloaded");
        }

        Ok(unloading.iter().map(|r| r.name().clone()).collect())
    }

    /// Unload then load the same modules
    ///
    /// Not atomic: when loading fails the modules stay unloaded.
    pub async fn reload(&self, subset: Option<&[ModuleName]>) -> Result<Vec<ModuleName>> {
        info!(modules = ?subset, "Reloading modules");
        self.unload(subset).await?;
        self.load(subset).await
    }

    /// Records targeted by a call, in load order
    fn targets(&self, subset: Option<&[ModuleName]>) -> Result<Vec<Arc<ModuleRecord>>> {
        let order = self.registry.load_order();

        let Some(subset) = subset else {
            return Ok(order);
        };

        if let Some(unknown) = subset.iter().find(|name| !self.registry.contains(name.as_str())) {
            return Err(HostError::UnknownModule(unknown.clone()));
        }

        Ok(order
            .into_iter()
            .filter(|record| subset.contains(record.name()))
            .collect())
    }

    fn validate(&self, targets: &[Arc<ModuleRecord>]) -> Result<()> {
        for record in targets {
            let missing: Vec<ModuleName> = record
                .descriptor()
                .dependencies
                .iter()
                .filter(|dep| !self.registry.query(dep.as_str(), None, None))
                .cloned()
                .collect();

            if !missing.is_empty() {
                error!(
                    module = %record.name(),
                    missing = ?missing,
                    "Module has missing dependencies"
                );
                return Err(HostError::MissingDependency {
                    module: record.name().clone(),
                    missing,
                });
            }
        }

        Ok(())
    }

    fn context_for(&self, record: &ModuleRecord) -> ModuleContext {
        let descriptor = record.descriptor().clone();
        match &self.host {
            Some(host) => ModuleContext::new(descriptor, host.clone()),
            None => ModuleContext::detached(descriptor),
        }
    }

    async fn run(&self, record: &ModuleRecord, phase: Phase) -> Result<()> {
        let module = record.instance().ok_or_else(|| {
            HostError::invalid_state(format!("Module {} has no instance", record.name()))
        })?;

        let result: std::result::Result<(), ModuleError> = match phase {
            Phase::Loading => module.on_loading().await,
            Phase::Loaded => module.on_loaded().await,
            Phase::Unloading => module.on_unloading().await,
            Phase::Unloaded => module.on_unloaded().await,
        };

        result.map_err(|e| {
            error!(module = %record.name(), error = %e, "Module lifecycle hook failed");
            record.set_state(ModuleState::Failed(e.to_string()));
            HostError::module(record.name().clone(), e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modulus_api::testing::{Call, Hook, Journal, RecordingBuilder};

    fn manager(modules: Vec<RecordingBuilder>) -> LifecycleManager {
        let registry = Arc::new(ModuleRegistry::new());
        for module in modules {
            registry.register_provider(module.build()).unwrap();
        }
        LifecycleManager::new(
            registry,
            LifecycleConfig {
                unload_grace: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn test_load_runs_phases_in_order() {
        let journal = Journal::new();
        let manager = manager(vec![
            RecordingBuilder::new("b", &journal).load_priority(2),
            RecordingBuilder::new("a", &journal).load_priority(1),
        ]);

        let loaded = manager.load(None).await.unwrap();
        assert_eq!(loaded, vec![ModuleName::from("a"), ModuleName::from("b")]);

        let calls: Vec<(String, Call)> = journal
            .entries()
            .into_iter()
            .map(|(name, call)| (name.to_string(), call))
            .collect();
        assert_eq!(
            calls,
            vec![
                ("a".to_string(), Call::Created),
                ("b".to_string(), Call::Created),
                ("a".to_string(), Call::Loading),
                ("b".to_string(), Call::Loading),
                ("a".to_string(), Call::Loaded),
                ("b".to_string(), Call::Loaded),
            ]
        );

        let record = manager.registry().get("a").unwrap();
        assert!(record.is_loaded());
        assert_eq!(record.state(), ModuleState::Loaded);
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let journal = Journal::new();
        let manager = manager(vec![RecordingBuilder::new("a", &journal)]);

        manager.load(None).await.unwrap();
        let again = manager.load(None).await.unwrap();

        assert!(again.is_empty());
        assert_eq!(journal.count(&Call::Loading), 1);
        assert_eq!(journal.count(&Call::Loaded), 1);
        assert_eq!(journal.count(&Call::Created), 1);
    }

    #[tokio::test]
    async fn test_missing_dependency_mutates_nothing() {
        let journal = Journal::new();
        let manager = manager(vec![
            RecordingBuilder::new("ok", &journal),
            RecordingBuilder::new("chat", &journal)
                .dependency("logger")
                .dependency("settings"),
        ]);

        let err = manager.load(None).await.unwrap_err();
        match err {
            HostError::MissingDependency { module, missing } => {
                assert_eq!(module, "chat");
                assert_eq!(
                    missing,
                    vec![ModuleName::from("logger"), ModuleName::from("settings")]
                );
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(journal.is_empty());
        assert!(manager.registry().loaded().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_subset_name() {
        let journal = Journal::new();
        let manager = manager(vec![RecordingBuilder::new("a", &journal)]);

        let subset = [ModuleName::from("a"), ModuleName::from("ghost")];
        assert!(matches!(
            manager.load(Some(&subset[..])).await,
            Err(HostError::UnknownModule(name)) if name == "ghost"
        ));
        assert!(journal.is_empty());
    }

    #[tokio::test]
    async fn test_subset_load_and_unload() {
        let journal = Journal::new();
        let manager = manager(vec![
            RecordingBuilder::new("a", &journal),
            RecordingBuilder::new("b", &journal),
        ]);

        let subset = [ModuleName::from("b")];
        manager.load(Some(&subset[..])).await.unwrap();
        assert!(!manager.registry().get("a").unwrap().is_loaded());
        assert!(manager.registry().get("b").unwrap().is_loaded());

        manager.unload(Some(&subset[..])).await.unwrap();
        let record = manager.registry().get("b").unwrap();
        assert!(!record.is_loaded());
        assert!(!record.is_initialized());
        assert_eq!(record.state(), ModuleState::Unloaded);
        assert_eq!(
            journal.calls_for("b"),
            vec![
                Call::Created,
                Call::Loading,
                Call::Loaded,
                Call::Unloading,
                Call::Unloaded,
                Call::Destroyed,
            ]
        );
    }

    #[tokio::test]
    async fn test_hook_failure_aborts_without_rollback() {
        let journal = Journal::new();
        let manager = manager(vec![
            RecordingBuilder::new("a", &journal).load_priority(0),
            RecordingBuilder::new("b", &journal)
                .load_priority(1)
                .fail_on(Hook::Loading),
            RecordingBuilder::new("c", &journal).load_priority(2),
        ]);

        let err = manager.load(None).await.unwrap_err();
        assert!(matches!(err, HostError::Module { ref module, .. } if module == "b"));

        let registry = manager.registry();
        assert!(registry.get("a").unwrap().is_loaded());
        assert!(!registry.get("b").unwrap().is_loaded());
        assert!(matches!(
            registry.get("b").unwrap().state(),
            ModuleState::Failed(_)
        ));
        assert_eq!(journal.calls_for("c"), vec![Call::Created]);
        assert_eq!(journal.count(&Call::Loaded), 0);
    }

    #[tokio::test]
    async fn test_factory_failure_propagates() {
        let journal = Journal::new();
        let manager = manager(vec![RecordingBuilder::new("a", &journal).fail_on(Hook::Create)]);

        assert!(matches!(
            manager.load(None).await,
            Err(HostError::Module { .. })
        ));
        assert!(!manager.registry().get("a").unwrap().is_initialized());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unload_waits_for_grace_window() {
        let journal = Journal::new();
        let registry = Arc::new(ModuleRegistry::new());
        registry
            .register_provider(RecordingBuilder::new("a", &journal).build())
            .unwrap();
        let manager = LifecycleManager::new(
            registry,
            LifecycleConfig {
                unload_grace: Duration::from_millis(500),
            },
        );

        manager.load(None).await.unwrap();
        let start = tokio::time::Instant::now();
        manager.unload(None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));

        // Nothing left to unload, so no grace window
        let start = tokio::time::Instant::now();
        assert!(manager.unload(None).await.unwrap().is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_reload() {
        let journal = Journal::new();
        let manager = manager(vec![RecordingBuilder::new("a", &journal)]);

        manager.load(None).await.unwrap();
        let reloaded = manager.reload(None).await.unwrap();

        assert_eq!(reloaded, vec![ModuleName::from("a")]);
        assert_eq!(journal.count(&Call::Created), 2);
        assert_eq!(journal.count(&Call::Destroyed), 1);
        assert!(manager.registry().get("a").unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_unload_resumes_after_hook_failure() {
        let journal = Journal::new();
        let manager = manager(vec![
            RecordingBuilder::new("a", &journal)
                .load_priority(1)
                .fail_on(Hook::Unloading),
            RecordingBuilder::new("b", &journal).load_priority(2),
        ]);
        manager.load(None).await.unwrap();

        // b goes first and is left between the two unload phases
        let err = manager.unload(None).await.unwrap_err();
        assert!(matches!(err, HostError::Module { ref module, .. } if module == "a"));
        let b = manager.registry().get("b").unwrap();
        assert!(!b.is_loaded());
        assert_eq!(b.state(), ModuleState::Unloading);

        let subset = [ModuleName::from("b")];
        let unloaded = manager.unload(Some(&subset[..])).await.unwrap();
        assert_eq!(unloaded, vec![ModuleName::from("b")]);
        assert_eq!(b.state(), ModuleState::Unloaded);
        assert!(!b.is_initialized());
        assert_eq!(
            journal.calls_for("b"),
            vec![
                Call::Created,
                Call::Loading,
                Call::Loaded,
                Call::Unloading,
                Call::Unloaded,
                Call::Destroyed,
            ]
        );
    }
}
