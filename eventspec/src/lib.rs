//! `EventSpec` - Given/When/Then behavior verification for event-sourced domains
//!
//! A scenario is scripted as a sequence of given events, a when command,
//! and then expectations; the harness drives a domain runtime through the
//! [`runtime::Runtime`] boundary, captures what actually happened, and
//! reports pass/fail with a rendered transcript and line diff. The
//! embedding test framework supplies the failure hook, so the harness
//! never decides whether a failed assertion aborts the scenario.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod diff;
pub mod errors;
pub mod event;
pub mod harness;
pub mod identity;
pub mod report;
pub mod runtime;
pub mod types;

/// Prelude module for convenient imports.
///
/// Import everything needed to script a scenario with:
/// ```rust,ignore
/// use eventspec::prelude::*;
/// ```
pub mod prelude {
    pub use crate::command::{CommandEnvelope, DomainCommand};
    pub use crate::errors::{Fault, HarnessError, HarnessResult};
    pub use crate::event::{DomainEvent, EventEnvelope};
    pub use crate::harness::{FailureHook, IdArg, PanicHook, TestHarness};
    pub use crate::identity::IdRegistry;
    pub use crate::report::{ConsoleWriter, StringWriter, TextFormatter, TextWriter};
    pub use crate::runtime::{ContextCell, Runtime};
    pub use crate::types::{Aggregate, Id, TypeTag};
}
