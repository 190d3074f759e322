//! # Modulus Module API
//!
//! This crate provides the SDK for writing modules hosted by the Modulus runtime.
//!
//! ## Building blocks
//!
//! - **Modules**: units with lifecycle hooks that declare which events they handle
//! - **Descriptors**: static metadata (name, version, dependencies, priorities)
//! - **Events**: typed, mutable messages routed to capable modules
//! - **Context**: the handle a module uses to talk back to its host
//!
//! ## Example
//!
//! ```rust,no_run
//! use modulus_api::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct Echo;
//!
//! #[async_trait]
//! impl Module for Echo {
//!     fn can_handle(&self, event: &dyn Event) -> bool {
//!         event.name() == "example.echo"
//!     }
//!
//!     async fn handle(&self, event: &mut dyn Event) {
//!         event.set_handled(true);
//!     }
//! }
//!
//! let descriptor = ModuleDescriptor::new("echo", Version::new(1, 0, 0)).with_handle_priority(5);
//! let factory = |_ctx: &ModuleContext| -> Result<Arc<dyn Module>, ModuleError> {
//!     Ok(Arc::new(Echo))
//! };
//! # let _ = (descriptor, factory);
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod context;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod events;
pub mod module;

#[cfg(feature = "testing")]
pub mod testing;

pub use context::{HostHandle, ModuleContext};
pub use descriptor::{ModuleDescriptor, ModuleName};
pub use error::{ModuleError, Result};
pub use event::{Envelope, Event, EventKind, EventMeta};
pub use events::{GetSettingEvent, LoggingEvent, Severity};
pub use module::{AsAny, Module, ModuleFactory, ModuleProvider};
pub use semver::Version;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::context::{HostHandle, ModuleContext};
    pub use crate::descriptor::{ModuleDescriptor, ModuleName};
    pub use crate::error::ModuleError;
    pub use crate::event::{Envelope, Event, EventKind, EventMeta};
    pub use crate::events::{GetSettingEvent, LoggingEvent, Severity};
    pub use crate::module::{Module, ModuleFactory, ModuleProvider};
    pub use async_trait::async_trait;
    pub use semver::Version;
}
