//! Error types for the verification harness.
//!
//! The structural errors below indicate a malformed test script and abort
//! the current scenario. Faults thrown by the domain runtime are carried as
//! boxed error trait objects so that the embedding test can still match on
//! the concrete fault type via [`std::error::Error::downcast_ref`].
//!
//! Assertion failures are deliberately absent from this taxonomy: they are
//! reported through the transcript and the pluggable failure hook, never
//! raised as errors by the harness itself.

use thiserror::Error;

use crate::types::TypeTag;

/// A fault thrown by the domain runtime while saving an event or processing
/// a command. The harness never inspects faults except in fault checks.
pub type Fault = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the harness for malformed test scripts.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration was attempted after the context had been created.
    #[error("configuration must happen before the first given or when step")]
    LateConfiguration,

    /// A latest-identity lookup found nothing for the requested type.
    #[error("cannot get latest {aggregate} identity, since none exists")]
    NoSuchIdentity {
        /// The aggregate type that has no registered identity
        aggregate: TypeTag,
    },

    /// An indexed identity lookup exceeded the registered count.
    #[error("no {aggregate} identity at recency rank {index} (only {registered} registered)")]
    IndexOutOfRange {
        /// The aggregate type that was looked up
        aggregate: TypeTag,
        /// The 1-based recency rank that was requested
        index: usize,
        /// How many identities of that type are registered
        registered: usize,
    },

    /// An identity string was re-registered under an incompatible type.
    #[error(
        "identity '{value}' already exists for non-compatible type {existing} \
         (attempted to register it for {requested})"
    )]
    ConflictingIdentityType {
        /// The string form of the conflicting identity
        value: String,
        /// The type the identity was first registered for
        existing: TypeTag,
        /// The incompatible type of the attempted re-registration
        requested: TypeTag,
    },

    /// An event was emitted from an aggregate type it is not declared for.
    #[error("event {event} is not emittable from aggregate type {aggregate}")]
    IllegalEmission {
        /// The name of the offending event type
        event: String,
        /// The aggregate type the event was emitted from
        aggregate: TypeTag,
    },

    /// An event or command payload could not be serialized.
    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A fault thrown by the runtime during a plain `when` step, propagated
    /// unmodified to the caller of the scenario.
    #[error("runtime fault: {0}")]
    Runtime(Fault),
}

/// Result alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
