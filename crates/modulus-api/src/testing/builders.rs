//! Builder for recording test modules

use crate::descriptor::{ModuleDescriptor, ModuleName};
use crate::testing::mocks::{Hook, Journal, RecordingProvider};
use semver::Version;
use std::collections::HashSet;

/// Builder for a [`RecordingProvider`] and its descriptor
#[derive(Debug, Clone)]
pub struct RecordingBuilder {
    descriptor: ModuleDescriptor,
    journal: Journal,
    handles: HashSet<&'static str>,
    marks_handled: bool,
    observes_before: bool,
    observes_after: bool,
    fail_on: HashSet<Hook>,
}

impl RecordingBuilder {
    /// Start a module at version 1.0.0 writing into `journal`
    pub fn new(name: impl Into<ModuleName>, journal: &Journal) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(name, Version::new(1, 0, 0)),
            journal: journal.clone(),
            handles: HashSet::new(),
            marks_handled: true,
            observes_before: false,
            observes_after: false,
            fail_on: HashSet::new(),
        }
    }

    /// Set the version
    pub fn version(mut self, version: Version) -> Self {
        self.descriptor.version = version;
        self
    }

    /// Add a dependency
    pub fn dependency(mut self, name: impl Into<ModuleName>) -> Self {
        self.descriptor.dependencies.push(name.into());
        self
    }

    /// Set the load priority
    pub fn load_priority(mut self, priority: i16) -> Self {
        self.descriptor.load_priority = priority;
        self
    }

    /// Set the handle priority
    pub fn handle_priority(mut self, priority: i16) -> Self {
        self.descriptor.handle_priority = priority;
        self
    }

    /// Mark the module load-first
    pub fn load_first(mut self) -> Self {
        self.descriptor.load_first = true;
        self
    }

    /// Handle events with this name
    pub fn handles(mut self, event: &'static str) -> Self {
        self.handles.insert(event);
        self
    }

    /// Look at events without marking them handled
    pub fn passes(mut self) -> Self {
        self.marks_handled = false;
        self
    }

    /// Observe every event before the handling pass
    pub fn observes_before(mut self) -> Self {
        self.observes_before = true;
        self
    }

    /// Observe every event after the handling pass
    pub fn observes_after(mut self) -> Self {
        self.observes_after = true;
        self
    }

    /// Fail the given lifecycle step
    pub fn fail_on(mut self, hook: Hook) -> Self {
        self.fail_on.insert(hook);
        self
    }

    /// The descriptor built so far
    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    /// Build the provider
    pub fn build(self) -> RecordingProvider {
        RecordingProvider {
            descriptor: self.descriptor,
            journal: self.journal,
            handles: self.handles,
            marks_handled: self.marks_handled,
            observes_before: self.observes_before,
            observes_after: self.observes_after,
            fail_on: self.fail_on,
        }
    }
}
