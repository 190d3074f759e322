//! # Chat Module
//!
//! A small keyword-matching chat bot, hosted as a Modulus module.
//!
//! The module handles [`ChatEvent`]: the request text is reduced to a set of
//! words, the phrase sharing the most words with it is picked and one of its
//! responses is returned at random. `{time}`, `{today}` and `{todayday}` in a
//! response are replaced with the local time, date and weekday.
//!
//! ## Settings
//!
//! - `seed`: fixes the random response choice (read once while loading)
//!
//! ## Example
//!
//! ```rust,no_run
//! use modulus_chat::{ChatEvent, ChatModule, ChatRequest};
//! use modulus_api::prelude::*;
//!
//! # async fn example() {
//! let module = ChatModule::with_seed(ChatModule::descriptor(), 7);
//!
//! let mut event = ChatEvent::request("hello there");
//! module.handle(&mut event).await;
//! assert!(event.handled());
//! println!("{}", event.output.unwrap().response);
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod phrases;

use async_trait::async_trait;
use chrono::Local;
use modulus_api::prelude::*;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// Module name
pub const NAME: &str = "chat";

/// Handle priority; logging and other infrastructure modules go first
pub const HANDLE_PRIORITY: i16 = 10;

/// Chat event kind
#[derive(Debug)]
pub struct Chat;

/// Input of a [`ChatEvent`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInput {
    /// What the user said
    pub request: String,
}

/// Output of a [`ChatEvent`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOutput {
    /// What the bot replies
    pub response: String,
}

impl EventKind for Chat {
    const NAME: &'static str = "chat.message";
    type Input = ChatInput;
    type Output = ChatOutput;
}

/// A line of conversation for the chat module
pub type ChatEvent = Envelope<Chat>;

/// Constructor for chat requests
pub trait ChatRequest {
    /// Create a chat event carrying `request`
    fn request(request: impl Into<String>) -> Self;
}

impl ChatRequest for ChatEvent {
    fn request(request: impl Into<String>) -> Self {
        Self::new(ChatInput {
            request: request.into(),
        })
    }
}

/// Keyword matching chat bot
#[derive(Debug)]
pub struct ChatModule {
    ctx: ModuleContext,
    rng: Mutex<StdRng>,
}

impl ChatModule {
    /// Static metadata of the chat module
    pub fn descriptor() -> ModuleDescriptor {
        let version = env!("CARGO_PKG_VERSION")
            .parse()
            .unwrap_or_else(|_| Version::new(0, 1, 0));

        ModuleDescriptor::new(NAME, version)
            .with_description("Keyword matching chat bot")
            .with_handle_priority(HANDLE_PRIORITY)
            .with_load_first(true)
    }

    /// Create a chat module with random responses
    pub fn new(ctx: ModuleContext) -> Self {
        Self {
            ctx,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a detached chat module whose response choice is reproducible
    pub fn with_seed(descriptor: ModuleDescriptor, seed: u64) -> Self {
        Self {
            ctx: ModuleContext::detached(descriptor),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Reply to a single request
    pub fn respond(&self, request: &str) -> String {
        phrases::respond(request, Local::now(), &mut *self.rng.lock())
    }
}

/// A random line to start a conversation with
pub fn opener() -> &'static str {
    phrases::opener(&mut rand::thread_rng())
}

#[async_trait]
impl Module for ChatModule {
    fn can_handle(&self, event: &dyn Event) -> bool {
        event.is::<ChatEvent>()
    }

    async fn handle(&self, event: &mut dyn Event) {
        let Some(chat) = event.downcast_mut::<ChatEvent>() else {
            return;
        };

        let response = self.respond(&chat.input.request);
        debug!(request = %chat.input.request, response = %response, "Chat response");
        chat.respond(ChatOutput { response });
    }

    fn observes_before(&self, event: &dyn Event) -> bool {
        event.is::<ChatEvent>()
    }

    async fn on_before_handle(&self, event: &dyn Event) {
        trace!(event = event.name(), "Chat request received");
    }

    fn observes_after(&self, event: &dyn Event) -> bool {
        event.is::<ChatEvent>()
    }

    async fn on_handled(&self, event: &dyn Event) {
        trace!(
            event = event.name(),
            handled = event.handled(),
            "Chat request finished"
        );
    }

    async fn on_loading(&self) -> modulus_api::Result<()> {
        let seed: Option<u64> = self.ctx.get_setting("seed", None).await;
        if let Some(seed) = seed {
            *self.rng.lock() = StdRng::seed_from_u64(seed);
            debug!(seed, "Chat responses seeded");
        }
        Ok(())
    }

    async fn on_loaded(&self) -> modulus_api::Result<()> {
        self.ctx.log(Severity::Debug, "Chat module ready").await;
        Ok(())
    }
}

/// Provides [`ChatModule`] to a host
#[derive(Debug, Default, Clone, Copy)]
pub struct ChatProvider;

impl ModuleFactory for ChatProvider {
    fn create(&self, ctx: &ModuleContext) -> modulus_api::Result<Arc<dyn Module>> {
        Ok(Arc::new(ChatModule::new(ctx.clone())))
    }
}

impl ModuleProvider for ChatProvider {
    fn descriptor(&self) -> ModuleDescriptor {
        ChatModule::descriptor()
    }
}
