//! Event kinds for tests

use crate::event::{Envelope, EventKind};

/// Probe event kind; a handling recording module answers with its own name
#[derive(Debug)]
pub struct Probe;

impl EventKind for Probe {
    const NAME: &'static str = "testing.probe";
    type Input = String;
    type Output = String;
}

/// Probe event
pub type ProbeEvent = Envelope<Probe>;

/// Signal event kind without output
#[derive(Debug)]
pub struct Signal;

impl EventKind for Signal {
    const NAME: &'static str = "testing.signal";
    type Input = String;
    type Output = ();
}

/// Signal event
pub type SignalEvent = Envelope<Signal>;
