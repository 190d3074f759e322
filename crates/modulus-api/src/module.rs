//! Core module trait, factories and providers

use crate::context::ModuleContext;
use crate::descriptor::ModuleDescriptor;
use crate::error::Result;
use crate::event::Event;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Upcasts for downcasting a module to its concrete type
///
/// Implemented for every sized `Send + Sync + 'static` type.
pub trait AsAny: Any + Send + Sync {
    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;

    /// Convert a shared instance into a shared `Any`
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Live implementation of a module
///
/// Instances are shared by the host as `Arc<dyn Module>` and every callback
/// takes `&self`: a module's `handle` may dispatch further events through its
/// [`ModuleContext`], which can reach the same instance again. Keep mutable
/// state behind interior mutability and never hold a lock across a dispatch.
///
/// A module calling another module's `handle` directly bypasses the host: the
/// event is then invisible to the in-flight table and to observers. Always go
/// through [`ModuleContext::dispatch`].
#[async_trait]
pub trait Module: AsAny + fmt::Debug {
    /// Whether this module can handle the event
    fn can_handle(&self, event: &dyn Event) -> bool;

    /// Handle the event
    ///
    /// Set `handled` on the event to stop lower priority modules from seeing it.
    async fn handle(&self, event: &mut dyn Event);

    /// Whether this module observes the event before the handling pass
    fn observes_before(&self, _event: &dyn Event) -> bool {
        false
    }

    /// Called before the handling pass when [`Module::observes_before`] is true
    async fn on_before_handle(&self, _event: &dyn Event) {}

    /// Whether this module observes the event after the handling pass
    fn observes_after(&self, _event: &dyn Event) -> bool {
        false
    }

    /// Called after the handling pass when [`Module::observes_after`] is true
    async fn on_handled(&self, _event: &dyn Event) {}

    /// First load phase
    ///
    /// The module is marked loaded right after this returns, so modules loading
    /// later can already send it events.
    async fn on_loading(&self) -> Result<()> {
        Ok(())
    }

    /// Second load phase, called once every module of the pass is loading
    async fn on_loaded(&self) -> Result<()> {
        Ok(())
    }

    /// First unload phase; the module stops receiving events after this returns
    async fn on_unloading(&self) -> Result<()> {
        Ok(())
    }

    /// Second unload phase, called after the unload grace window
    async fn on_unloaded(&self) -> Result<()> {
        Ok(())
    }
}

impl dyn Module {
    /// Check whether the instance is of concrete type `M`
    pub fn is<M: Module>(&self) -> bool {
        AsAny::as_any(self).is::<M>()
    }

    /// Downcast to a concrete module type
    pub fn downcast_ref<M: Module>(&self) -> Option<&M> {
        AsAny::as_any(self).downcast_ref::<M>()
    }

    /// Downcast a shared instance to a concrete module type
    pub fn downcast_arc<M: Module>(self: Arc<Self>) -> Option<Arc<M>> {
        AsAny::into_any_arc(self).downcast::<M>().ok()
    }
}

/// Factory and destructor pair for one module
pub trait ModuleFactory: Send + Sync {
    /// Construct the module instance
    fn create(&self, ctx: &ModuleContext) -> Result<Arc<dyn Module>>;

    /// Release the module instance
    fn destroy(&self, instance: Arc<dyn Module>) {
        drop(instance);
    }
}

impl<F> ModuleFactory for F
where
    F: Fn(&ModuleContext) -> Result<Arc<dyn Module>> + Send + Sync,
{
    fn create(&self, ctx: &ModuleContext) -> Result<Arc<dyn Module>> {
        self(ctx)
    }
}

/// A module as delivered by discovery: its descriptor plus a factory
pub trait ModuleProvider: ModuleFactory {
    /// Static metadata of the provided module
    fn descriptor(&self) -> ModuleDescriptor;
}
