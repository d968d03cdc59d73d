//! Commands and their type-erased envelope.
//!
//! Commands cross the runtime boundary in serialized form, mirroring the
//! event envelope: the harness never interprets command semantics, it only
//! renders them into the transcript and hands them to the runtime.

use serde::Serialize;
use serde_json::Value;

use crate::types::short_type_name;

/// A request describing an intended state change, executed against the
/// runtime exactly once per `when` step.
pub trait DomainCommand: Serialize + Sized + 'static {
    /// The full type path of the command, used for handler dispatch.
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A type-erased command: type name plus JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEnvelope {
    name: &'static str,
    payload: Value,
}

impl CommandEnvelope {
    /// Wraps a domain command, serializing its payload.
    pub fn new<C: DomainCommand>(command: &C) -> Result<Self, serde_json::Error> {
        Ok(Self {
            name: C::name(),
            payload: serde_json::to_value(command)?,
        })
    }

    /// The full type path of the wrapped command.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The short command name shown in transcripts.
    pub fn display_name(&self) -> &'static str {
        short_type_name(self.name)
    }

    /// The serialized command payload.
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Single-line rendering for the transcript.
    pub fn render(&self) -> String {
        format!("{}({})", self.display_name(), self.payload)
    }
}
