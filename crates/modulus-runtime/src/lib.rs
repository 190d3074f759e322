//! # Modulus Runtime
//!
//! Registry, lifecycle and event dispatch for Modulus modules.
//!
//! ## Features
//!
//! - **Module Registry**: descriptors, factories and derived load/handle orderings
//! - **Lifecycle Management**: dependency validation, two-phase load-first loading,
//!   unload with a grace window, reload
//! - **Event Dispatch**: priority ordered, first responder wins, with before/after
//!   observers and an in-flight table
//! - **Event Catalog**: blank event construction by name or type
//!
//! ## Example
//!
//! ```rust,no_run
//! use modulus_runtime::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let host = Host::builder().application_name("demo").build()?;
//!
//! // Providers are usually added on the builder
//! // let host = Host::builder().provider(MyProvider).build()?;
//!
//! host.modules().load(None).await?;
//!
//! let mut event = LoggingEvent::message(Severity::Debug, "hello");
//! host.handle(&mut event).await;
//! if !event.handled() {
//!     println!("no logging module loaded");
//! }
//!
//! host.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod host;
pub mod lifecycle;
pub mod registry;

pub use config::{ConfigFormat, HostConfig, LogFormat, LoggingConfig};
pub use dispatcher::{EventDispatcher, InFlightEvent, META_HANDLERS, META_ID};
pub use error::{HostError, Result};
pub use events::{EventKindInfo, EventRegistry};
pub use host::{Host, HostBuilder, ModuleManager};
pub use lifecycle::{LifecycleConfig, LifecycleManager, DEFAULT_UNLOAD_GRACE};
pub use registry::{ModuleInfo, ModuleRecord, ModuleRegistry, ModuleState};

// Re-export module API types for convenience
pub use modulus_api;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::config::HostConfig;
    pub use crate::error::{HostError, Result};
    pub use crate::host::{Host, HostBuilder};
    pub use crate::registry::{ModuleInfo, ModuleState};
    pub use modulus_api::prelude::*;
}
