//! Catalog of known event kinds

use crate::error::{HostError, Result};
use modulus_api::Event;
use parking_lot::RwLock;
use serde::Serialize;
use std::any::TypeId;
use tracing::debug;

/// Description of a registered event kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventKindInfo {
    /// Event name
    pub name: &'static str,

    /// Rust type implementing the event
    pub type_name: &'static str,
}

struct Entry {
    info: EventKindInfo,
    type_id: TypeId,
    blank: fn() -> Box<dyn Event>,
}

fn blank<E: Event + Default>() -> Box<dyn Event> {
    Box::new(E::default())
}

/// Registry of event kinds that can be created blank by name or type
#[derive(Default)]
pub struct EventRegistry {
    entries: RwLock<Vec<Entry>>,
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("kinds", &self.known_kinds())
            .finish()
    }
}

impl EventRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register event type `E`
    ///
    /// Fails with [`HostError::DuplicateEvent`] when the name or the type is
    /// already registered.
    pub fn register<E: Event + Default>(&self) -> Result<()> {
        let name = E::default().name();
        let type_id = TypeId::of::<E>();

        let mut entries = self.entries.write();
        if entries
            .iter()
            .any(|entry| entry.info.name == name || entry.type_id == type_id)
        {
            return Err(HostError::DuplicateEvent(name.to_string()));
        }

        entries.push(Entry {
            info: EventKindInfo {
                name,
                type_name: std::any::type_name::<E>(),
            },
            type_id,
            blank: blank::<E>,
        });

        debug!(event = name, "Event kind registered");
        Ok(())
    }

    /// Create a blank event of the kind registered under `name`
    pub fn lookup(&self, name: &str) -> Result<Box<dyn Event>> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.info.name == name)
            .map(|entry| (entry.blank)())
            .ok_or_else(|| HostError::unknown_event(name))
    }

    /// Create a blank event of registered type `E`
    pub fn lookup_type<E: Event>(&self) -> Result<Box<dyn Event>> {
        self.lookup_type_id(TypeId::of::<E>())
            .map_err(|_| HostError::unknown_event(std::any::type_name::<E>()))
    }

    /// Create a blank event of the registered type with this id
    pub fn lookup_type_id(&self, type_id: TypeId) -> Result<Box<dyn Event>> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.type_id == type_id)
            .map(|entry| (entry.blank)())
            .ok_or_else(|| HostError::unknown_event(format!("{type_id:?}")))
    }

    /// Registered event names in registration order
    pub fn known_kinds(&self) -> Vec<&'static str> {
        self.entries.read().iter().map(|entry| entry.info.name).collect()
    }

    /// Registered event kinds in registration order
    pub fn kinds(&self) -> Vec<EventKindInfo> {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// Whether an event kind with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().iter().any(|entry| entry.info.name == name)
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no kind is registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modulus_api::{GetSettingEvent, LoggingEvent, Severity};

    #[test]
    fn test_lookup_returns_blank_instances() {
        let events = EventRegistry::new();
        events.register::<LoggingEvent>().unwrap();

        let mut first = events.lookup("modulus.logging").unwrap();
        first.set_handled(true);
        first
            .downcast_mut::<LoggingEvent>()
            .unwrap()
            .input
            .severity = Severity::Error;

        let second = events.lookup("modulus.logging").unwrap();
        assert!(!second.handled());
        assert_eq!(
            second.downcast_ref::<LoggingEvent>().unwrap().input.severity,
            Severity::Debug
        );
    }

    #[test]
    fn test_lookup_by_type() {
        let events = EventRegistry::new();
        events.register::<GetSettingEvent>().unwrap();

        let event = events.lookup_type::<GetSettingEvent>().unwrap();
        assert!(event.is::<GetSettingEvent>());
        assert!(matches!(
            events.lookup_type::<LoggingEvent>(),
            Err(HostError::UnknownEvent(_))
        ));
    }

    #[test]
    fn test_unknown_and_duplicate() {
        let events = EventRegistry::new();
        events.register::<LoggingEvent>().unwrap();

        assert!(matches!(
            events.lookup("chat.request"),
            Err(HostError::UnknownEvent(name)) if name == "chat.request"
        ));
        assert!(matches!(
            events.register::<LoggingEvent>(),
            Err(HostError::DuplicateEvent(_))
        ));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_known_kinds_in_registration_order() {
        let events = EventRegistry::new();
        events.register::<LoggingEvent>().unwrap();
        events.register::<GetSettingEvent>().unwrap();

        assert_eq!(
            events.known_kinds(),
            vec!["modulus.logging", "modulus.get_setting"]
        );
        assert!(events.contains("modulus.get_setting"));
        assert_eq!(events.kinds()[1].name, "modulus.get_setting");
    }
}
