//! Testing utilities for module and host developers
//!
//! Recording modules write every callback into a shared [`Journal`], which
//! makes ordering properties of a host directly observable.

pub mod builders;
pub mod events;
pub mod mocks;

pub use builders::RecordingBuilder;
pub use events::{Probe, ProbeEvent, Signal, SignalEvent};
pub use mocks::{Call, Hook, Journal, RecordingModule, RecordingProvider};
