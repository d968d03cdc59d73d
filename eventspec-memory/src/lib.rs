//! In-memory runtime for the `eventspec` verification harness
//!
//! This crate provides a synchronous, in-memory implementation of the
//! [`Runtime`] boundary from the eventspec crate, useful for exercising
//! the harness without a real event-sourcing stack. Commands are routed
//! to handlers registered per command type; every saved or produced event
//! lands in an append-only journal the handlers can read.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use eventspec::command::{CommandEnvelope, DomainCommand};
use eventspec::errors::Fault;
use eventspec::event::EventEnvelope;
use eventspec::runtime::Runtime;
use eventspec::types::TypeTag;

/// Faults raised by the in-memory runtime itself.
#[derive(Debug, Error)]
pub enum InMemoryFault {
    /// A command was dispatched with no handler registered for its type.
    #[error("no handler registered for command {0}")]
    UnhandledCommand(String),
}

/// One event recorded in the journal, either saved by a `given` step or
/// produced by a command handler.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    /// The aggregate type the event was recorded against
    pub aggregate: TypeTag,
    /// The recorded event
    pub event: EventEnvelope,
}

type Handler =
    Box<dyn FnMut(&CommandEnvelope, &[JournalEntry]) -> Result<Vec<EventEnvelope>, Fault>>;

/// Pending configuration for the runtime: the command handler registry.
#[derive(Default)]
pub struct InMemoryConfig {
    handlers: HashMap<&'static str, Handler>,
}

impl InMemoryConfig {
    /// Registers a typed handler for commands of type `C`.
    ///
    /// The handler receives the decoded command and a view of the journal,
    /// and returns the events the command produces or a domain fault.
    pub fn handle<C, F>(&mut self, mut handler: F) -> &mut Self
    where
        C: DomainCommand + DeserializeOwned,
        F: FnMut(C, &[JournalEntry]) -> Result<Vec<EventEnvelope>, Fault> + 'static,
    {
        self.handlers.insert(
            C::name(),
            Box::new(move |envelope, journal| {
                let command: C = serde_json::from_value(envelope.payload().clone())?;
                handler(command, journal)
            }),
        );
        self
    }
}

impl fmt::Debug for InMemoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryConfig")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Synchronous in-memory runtime driven entirely by registered handlers.
pub struct InMemoryRuntime {
    handlers: HashMap<&'static str, Handler>,
    journal: Vec<JournalEntry>,
}

impl InMemoryRuntime {
    /// The journal of every event recorded so far, oldest first.
    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }
}

impl fmt::Debug for InMemoryRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRuntime")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("journal", &self.journal)
            .finish()
    }
}

impl Runtime for InMemoryRuntime {
    type Config = InMemoryConfig;

    fn create(config: Self::Config) -> Self {
        Self {
            handlers: config.handlers,
            journal: Vec::new(),
        }
    }

    fn save(&mut self, aggregate: TypeTag, event: EventEnvelope) -> Result<(), Fault> {
        debug!(event = event.display_name(), aggregate = %aggregate, "saving given event");
        self.journal.push(JournalEntry { aggregate, event });
        Ok(())
    }

    fn dispatch(&mut self, command: CommandEnvelope) -> Result<Vec<EventEnvelope>, Fault> {
        let Some(handler) = self.handlers.get_mut(command.name()) else {
            return Err(InMemoryFault::UnhandledCommand(command.display_name().to_string()).into());
        };
        debug!(command = command.display_name(), "dispatching command");
        let events = handler(&command, &self.journal)?;
        for event in &events {
            self.journal.push(JournalEntry {
                aggregate: event.owner(),
                event: event.clone(),
            });
        }
        Ok(events)
    }
}
