//! Event trait, typed envelopes and event metadata

use crate::error::{ModuleError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// A typed, mutable message routed through the host to capable modules
///
/// The accessors returning [`serde_json::Value`] let generic modules (caches,
/// recorders, bridges) inspect events whose concrete type they do not know.
pub trait Event: Any + Send + Sync + fmt::Debug {
    /// Event kind identity
    fn name(&self) -> &'static str;

    /// Event metadata
    fn meta(&self) -> &EventMeta;

    /// Mutable event metadata
    fn meta_mut(&mut self) -> &mut EventMeta;

    /// Whether a module has handled this event
    fn handled(&self) -> bool;

    /// Mark the event handled
    ///
    /// Once true the flag never goes back to false.
    fn set_handled(&mut self, handled: bool);

    /// Input payload as a JSON value
    fn input_value(&self) -> Result<Value>;

    /// Output payload as a JSON value, `None` when no output was produced
    fn output_value(&self) -> Result<Option<Value>>;

    /// Replace the output payload from a JSON value
    fn set_output_value(&mut self, value: Value) -> Result<()>;

    /// Upcast for downcasting to the concrete event type
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete event type
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<'a> dyn Event + 'a {
    /// Check whether the event is of concrete type `E`
    pub fn is<E: Event>(&self) -> bool {
        self.as_any().is::<E>()
    }

    /// Downcast to a concrete event type
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    /// Downcast to a mutable concrete event type
    pub fn downcast_mut<E: Event>(&mut self) -> Option<&mut E> {
        self.as_any_mut().downcast_mut::<E>()
    }
}

/// Static description of an event kind: its name and payload types
pub trait EventKind: 'static {
    /// Unique event name
    const NAME: &'static str;

    /// Input payload, filled in by the requester
    type Input: Default + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Output payload, filled in by the handling module
    type Output: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
}

/// Concrete event carrying the payloads of an [`EventKind`]
pub struct Envelope<K: EventKind> {
    /// Input payload
    pub input: K::Input,

    /// Output payload, `None` until a module produces one
    pub output: Option<K::Output>,

    meta: EventMeta,
    handled: bool,
    kind: PhantomData<fn() -> K>,
}

impl<K: EventKind> Envelope<K> {
    /// Create an event with the given input
    pub fn new(input: K::Input) -> Self {
        Self {
            input,
            output: None,
            meta: EventMeta::default(),
            handled: false,
            kind: PhantomData,
        }
    }

    /// Set the output and mark the event handled
    pub fn respond(&mut self, output: K::Output) {
        self.output = Some(output);
        self.set_handled(true);
    }
}

impl<K: EventKind> Default for Envelope<K> {
    fn default() -> Self {
        Self::new(K::Input::default())
    }
}

impl<K: EventKind> Clone for Envelope<K> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            output: self.output.clone(),
            meta: self.meta.clone(),
            handled: self.handled,
            kind: PhantomData,
        }
    }
}

impl<K: EventKind> fmt::Debug for Envelope<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("name", &K::NAME)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("meta", &self.meta)
            .field("handled", &self.handled)
            .finish()
    }
}

impl<K: EventKind> Event for Envelope<K> {
    fn name(&self) -> &'static str {
        K::NAME
    }

    fn meta(&self) -> &EventMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EventMeta {
        &mut self.meta
    }

    fn handled(&self) -> bool {
        self.handled
    }

    fn set_handled(&mut self, handled: bool) {
        if self.handled && !handled {
            tracing::trace!(event = K::NAME, "Ignoring attempt to reset handled flag");
            return;
        }
        self.handled = handled;
    }

    fn input_value(&self) -> Result<Value> {
        serde_json::to_value(&self.input).map_err(Into::into)
    }

    fn output_value(&self) -> Result<Option<Value>> {
        self.output
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(Into::into)
    }

    fn set_output_value(&mut self, value: Value) -> Result<()> {
        let output = serde_json::from_value(value).map_err(|e| ModuleError::OutputMismatch {
            event: K::NAME,
            reason: e.to_string(),
        })?;
        self.output = Some(output);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Free-form metadata attached to an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMeta(HashMap<String, Value>);

impl EventMeta {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Set a value only if the key is absent
    ///
    /// Returns false when the key already existed.
    pub fn try_insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        match self.0.entry(key.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(value.into());
                true
            }
        }
    }

    /// Get a raw value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a value converted to `T`, `None` when absent or of another shape
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|value| T::deserialize(value).ok())
    }

    /// Check whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}
