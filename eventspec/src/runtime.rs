//! The runtime collaborator boundary and its lifecycle.
//!
//! The event-sourcing runtime that actually applies commands to aggregates
//! is external to this crate; the harness consumes it through the
//! [`Runtime`] trait and owns exactly one instance per scenario, created
//! lazily from its accumulated configuration by [`ContextCell`].

use crate::command::CommandEnvelope;
use crate::errors::{Fault, HarnessError, HarnessResult};
use crate::event::EventEnvelope;
use crate::types::TypeTag;

/// The external domain runtime the harness drives.
pub trait Runtime: Sized {
    /// Configuration the runtime is created from. Mutated through
    /// [`ContextCell::configure`] before first use.
    type Config: Default;

    /// Builds the runtime from its finished configuration.
    fn create(config: Self::Config) -> Self;

    /// Persists an already-occurred event against an aggregate type.
    fn save(&mut self, aggregate: TypeTag, event: EventEnvelope) -> Result<(), Fault>;

    /// Processes a command, returning the events it produced or a fault.
    fn dispatch(&mut self, command: CommandEnvelope) -> Result<Vec<EventEnvelope>, Fault>;
}

/// Lazy, at-most-once holder of the runtime context.
pub struct ContextCell<R: Runtime> {
    config: R::Config,
    context: Option<R>,
}

impl<R: Runtime> ContextCell<R> {
    /// Creates an empty cell with the default pending configuration.
    pub fn new() -> Self {
        Self {
            config: R::Config::default(),
            context: None,
        }
    }

    /// Whether the context has been created yet.
    pub const fn is_created(&self) -> bool {
        self.context.is_some()
    }

    /// Applies a mutation to the pending configuration.
    ///
    /// Fails with [`HarnessError::LateConfiguration`] once any given/when
    /// step has forced the context into existence.
    pub fn configure(&mut self, mutator: impl FnOnce(&mut R::Config)) -> HarnessResult<()> {
        if self.is_created() {
            return Err(HarnessError::LateConfiguration);
        }
        mutator(&mut self.config);
        Ok(())
    }

    /// Returns the context, creating it from the configuration on first call.
    pub fn get_or_create(&mut self) -> &mut R {
        if self.context.is_none() {
            let config = std::mem::take(&mut self.config);
            self.context = Some(R::create(config));
        }
        self.context
            .as_mut()
            .expect("context exists after creation")
    }
}

impl<R: Runtime> Default for ContextCell<R> {
    fn default() -> Self {
        Self::new()
    }
}
