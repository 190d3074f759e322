//! Recording mock modules

use crate::context::ModuleContext;
use crate::descriptor::{ModuleDescriptor, ModuleName};
use crate::error::{ModuleError, Result};
use crate::event::Event;
use crate::module::{Module, ModuleFactory, ModuleProvider};
use crate::testing::events::ProbeEvent;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Lifecycle step a recording module can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Factory `create`
    Create,
    /// `on_loading`
    Loading,
    /// `on_loaded`
    Loaded,
    /// `on_unloading`
    Unloading,
    /// `on_unloaded`
    Unloaded,
}

/// One recorded callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Instance constructed by the factory
    Created,
    /// Instance released by the factory
    Destroyed,
    /// `on_loading`
    Loading,
    /// `on_loaded`
    Loaded,
    /// `on_unloading`
    Unloading,
    /// `on_unloaded`
    Unloaded,
    /// `on_before_handle` for the named event
    BeforeHandle(&'static str),
    /// `handle` for the named event
    Handle(&'static str),
    /// `on_handled` for the named event
    Handled(&'static str),
}

/// Shared, ordered log of module callbacks
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<(ModuleName, Call)>>>,
}

impl Journal {
    /// Create an empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(&self, module: &ModuleName, call: Call) {
        self.entries.lock().unwrap().push((module.clone(), call));
    }

    /// All entries in call order
    pub fn entries(&self) -> Vec<(ModuleName, Call)> {
        self.entries.lock().unwrap().clone()
    }

    /// Calls made on one module, in order
    pub fn calls_for(&self, module: &str) -> Vec<Call> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == module)
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Modules that received `call`, in order
    pub fn modules_with(&self, call: &Call) -> Vec<ModuleName> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c == call)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Position of the first matching entry
    pub fn position(&self, module: &str, call: &Call) -> Option<usize> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .position(|(name, c)| name == module && c == call)
    }

    /// Number of entries equal to `call`
    pub fn count(&self, call: &Call) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c == call)
            .count()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the journal is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Module recording every callback into a [`Journal`]
#[derive(Debug)]
pub struct RecordingModule {
    pub(crate) name: ModuleName,
    pub(crate) journal: Journal,
    pub(crate) handles: HashSet<&'static str>,
    pub(crate) marks_handled: bool,
    pub(crate) observes_before: bool,
    pub(crate) observes_after: bool,
    pub(crate) fail_on: HashSet<Hook>,
}

impl RecordingModule {
    fn hook(&self, hook: Hook, call: Call) -> Result<()> {
        self.journal.record(&self.name, call);
        if self.fail_on.contains(&hook) {
            return Err(ModuleError::lifecycle(format!(
                "{} failed on {hook:?}",
                self.name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Module for RecordingModule {
    fn can_handle(&self, event: &dyn Event) -> bool {
        self.handles.contains(event.name())
    }

    async fn handle(&self, event: &mut dyn Event) {
        self.journal.record(&self.name, Call::Handle(event.name()));
        if !self.marks_handled {
            return;
        }
        match event.downcast_mut::<ProbeEvent>() {
            Some(probe) => probe.respond(self.name.to_string()),
            None => event.set_handled(true),
        }
    }

    fn observes_before(&self, _event: &dyn Event) -> bool {
        self.observes_before
    }

    async fn on_before_handle(&self, event: &dyn Event) {
        self.journal
            .record(&self.name, Call::BeforeHandle(event.name()));
    }

    fn observes_after(&self, _event: &dyn Event) -> bool {
        self.observes_after
    }

    async fn on_handled(&self, event: &dyn Event) {
        self.journal.record(&self.name, Call::Handled(event.name()));
    }

    async fn on_loading(&self) -> Result<()> {
        self.hook(Hook::Loading, Call::Loading)
    }

    async fn on_loaded(&self) -> Result<()> {
        self.hook(Hook::Loaded, Call::Loaded)
    }

    async fn on_unloading(&self) -> Result<()> {
        self.hook(Hook::Unloading, Call::Unloading)
    }

    async fn on_unloaded(&self) -> Result<()> {
        self.hook(Hook::Unloaded, Call::Unloaded)
    }
}

/// Provider producing [`RecordingModule`] instances
#[derive(Debug, Clone)]
pub struct RecordingProvider {
    pub(crate) descriptor: ModuleDescriptor,
    pub(crate) journal: Journal,
    pub(crate) handles: HashSet<&'static str>,
    pub(crate) marks_handled: bool,
    pub(crate) observes_before: bool,
    pub(crate) observes_after: bool,
    pub(crate) fail_on: HashSet<Hook>,
}

impl RecordingProvider {
    /// Journal shared by every instance of this provider
    pub fn journal(&self) -> &Journal {
        &self.journal
    }
}

impl ModuleFactory for RecordingProvider {
    fn create(&self, _ctx: &ModuleContext) -> Result<Arc<dyn Module>> {
        self.journal.record(&self.descriptor.name, Call::Created);
        if self.fail_on.contains(&Hook::Create) {
            return Err(ModuleError::instantiate(format!(
                "{} refused to instantiate",
                self.descriptor.name
            )));
        }
        Ok(Arc::new(RecordingModule {
            name: self.descriptor.name.clone(),
            journal: self.journal.clone(),
            handles: self.handles.clone(),
            marks_handled: self.marks_handled,
            observes_before: self.observes_before,
            observes_after: self.observes_after,
            fail_on: self.fail_on.clone(),
        }))
    }

    fn destroy(&self, instance: Arc<dyn Module>) {
        self.journal.record(&self.descriptor.name, Call::Destroyed);
        drop(instance);
    }
}

impl ModuleProvider for RecordingProvider {
    fn descriptor(&self) -> ModuleDescriptor {
        self.descriptor.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::events::{Probe, SignalEvent};
    use crate::testing::RecordingBuilder;
    use crate::EventKind;

    #[tokio::test]
    async fn test_recording_module() {
        let journal = Journal::new();
        let provider = RecordingBuilder::new("alpha", &journal)
            .handles(Probe::NAME)
            .observes_before()
            .build();
        let ctx = ModuleContext::detached(provider.descriptor());
        let module = provider.create(&ctx).unwrap();

        let mut probe = ProbeEvent::new("ping".to_string());
        assert!(module.can_handle(&probe));
        assert!(module.observes_before(&probe));
        assert!(!module.observes_after(&probe));
        module.handle(&mut probe).await;
        assert_eq!(probe.output.as_deref(), Some("alpha"));

        let signal = SignalEvent::default();
        assert!(!module.can_handle(&signal));

        assert_eq!(
            journal.calls_for("alpha"),
            vec![Call::Created, Call::Handle(Probe::NAME)]
        );
    }

    #[tokio::test]
    async fn test_failing_hooks() {
        let journal = Journal::new();
        let provider = RecordingBuilder::new("beta", &journal)
            .fail_on(Hook::Loaded)
            .build();
        let module = provider
            .create(&ModuleContext::detached(provider.descriptor()))
            .unwrap();

        assert!(module.on_loading().await.is_ok());
        assert!(matches!(
            module.on_loaded().await,
            Err(ModuleError::Lifecycle(_))
        ));
        assert_eq!(journal.count(&Call::Loaded), 1);

        let refusing = RecordingBuilder::new("gamma", &journal)
            .fail_on(Hook::Create)
            .build();
        assert!(refusing
            .create(&ModuleContext::detached(refusing.descriptor()))
            .is_err());
    }

    #[test]
    fn test_journal_queries() {
        let journal = Journal::new();
        let a = ModuleName::from("a");
        let b = ModuleName::from("b");
        journal.record(&a, Call::Loading);
        journal.record(&b, Call::Loading);
        journal.record(&a, Call::Loaded);

        assert_eq!(journal.modules_with(&Call::Loading), vec![a.clone(), b]);
        assert_eq!(journal.position("a", &Call::Loaded), Some(2));
        assert_eq!(journal.len(), 3);
        journal.clear();
        assert!(journal.is_empty());
    }
}
