//! Event dispatch through capable, loaded modules

use crate::registry::ModuleRegistry;
use chrono::{DateTime, Utc};
use modulus_api::Event;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, debug_span, trace, Instrument};
use uuid::Uuid;

/// Meta key holding the dispatch correlation id
pub const META_ID: &str = "id";

/// Meta key holding per-module handle timings in microseconds
pub const META_HANDLERS: &str = "handlers";

/// An event currently being dispatched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InFlightEvent {
    /// Correlation id, also written to the event meta
    pub id: Uuid,

    /// Event kind name
    pub name: &'static str,

    /// When dispatch started
    pub started_at: DateTime<Utc>,
}

type InFlightTable = Mutex<HashMap<Uuid, InFlightEvent>>;

/// Removes an in-flight entry when dispatch ends, including on cancellation or panic
struct InFlightGuard<'a> {
    table: &'a InFlightTable,
    id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.table.lock().remove(&self.id);
    }
}

/// Routes events to loaded modules
///
/// Handlers run one at a time in ascending handle priority until one marks
/// the event handled. Observers run before and after in registration order.
/// The in-flight table lock is held only to insert and to remove an entry.
#[derive(Debug)]
pub struct EventDispatcher {
    registry: Arc<ModuleRegistry>,
    in_flight: InFlightTable,
}

impl EventDispatcher {
    /// Create a dispatcher over a registry
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self {
            registry,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Whether any loaded module can handle the event
    pub fn can_handle(&self, event: &dyn Event) -> bool {
        !self.registry.handle_order(event).is_empty()
    }

    /// Dispatch an event
    ///
    /// Never fails: check [`Event::handled`] afterwards. An event no module
    /// handled and an event handled without output are different outcomes.
    pub async fn dispatch(&self, event: &mut dyn Event) {
        let id = Uuid::new_v4();
        event.meta_mut().insert(META_ID, id.simple().to_string());

        self.in_flight.lock().insert(
            id,
            InFlightEvent {
                id,
                name: event.name(),
                started_at: Utc::now(),
            },
        );
        let _guard = InFlightGuard {
            table: &self.in_flight,
            id,
        };

        let span = debug_span!("dispatch", event = event.name(), id = %id.simple());
        self.run(event).instrument(span).await;
    }

    async fn run(&self, event: &mut dyn Event) {
        for record in self.registry.observers_before(&*event) {
            if let Some(module) = record.loaded_instance() {
                trace!(module = %record.name(), "Before handle");
                module.on_before_handle(&*event).await;
            }
        }

        let mut timings = Map::new();
        for record in self.registry.handle_order(&*event) {
            let Some(module) = record.loaded_instance() else {
                continue;
            };

            trace!(module = %record.name(), "Handling event");
            let started = Instant::now();
            module.handle(event).await;
            let elapsed = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
            timings.insert(record.name().to_string(), Value::from(elapsed));

            if event.handled() {
                debug!(module = %record.name(), "Event handled");
                break;
            }
        }
        event.meta_mut().insert(META_HANDLERS, Value::Object(timings));

        if !event.handled() {
            debug!("Event not handled");
        }

        for record in self.registry.observers_after(&*event) {
            if let Some(module) = record.loaded_instance() {
                trace!(module = %record.name(), "After handle");
                module.on_handled(&*event).await;
            }
        }
    }

    /// Snapshot of the events currently being dispatched
    pub fn in_flight(&self) -> Vec<InFlightEvent> {
        let mut events: Vec<InFlightEvent> = self.in_flight.lock().values().cloned().collect();
        events.sort_by_key(|event| event.started_at);
        events
    }

    /// Number of events currently being dispatched
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }
}
