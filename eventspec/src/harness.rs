//! The Given/When/Then scenario harness.
//!
//! A [`TestHarness`] owns everything one scripted scenario needs: the
//! identity registry, the lazily created runtime context, the result stream
//! of the most recent command, and the transcript formatter. Test code
//! drives it in sequence (`given` emissions, a `when` command, `then`
//! expectations), and every expectation funnels through one assertion
//! primitive that renders a pass/fail glyph and, on failure, invokes the
//! pluggable failure hook supplied by the embedding test framework.
//!
//! The harness is fully synchronous and never shared across scenarios.

use std::collections::VecDeque;

use tracing::debug;

use crate::command::{CommandEnvelope, DomainCommand};
use crate::diff;
use crate::errors::{Fault, HarnessError, HarnessResult};
use crate::event::{DomainEvent, EventEnvelope};
use crate::identity::IdRegistry;
use crate::report::{TextFormatter, TextWriter, CHECK_MARK, CROSS_MARK};
use crate::runtime::{ContextCell, Runtime};
use crate::types::{short_type_name, Aggregate, Id};

/// Decides what a failed assertion does: raise, mark, or aggregate.
///
/// The harness invokes the hook exactly once per failing check,
/// synchronously, after the failure has been rendered into the transcript.
pub trait FailureHook {
    /// Called once for each failing check.
    fn on_failure(&mut self);
}

impl<F: FnMut()> FailureHook for F {
    fn on_failure(&mut self) {
        self();
    }
}

/// Hook that panics on the first failing check, aborting the scenario.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicHook;

impl FailureHook for PanicHook {
    fn on_failure(&mut self) {
        panic!("scenario assertion failed; see transcript for details");
    }
}

/// How a step names the aggregate identity it operates on.
#[derive(Debug, Clone)]
pub enum IdArg {
    /// Use the most recently registered identity of the aggregate type.
    Latest,
    /// Parse this string form against the aggregate type.
    Text(String),
    /// Use this identity as-is.
    Resolved(Id),
}

impl From<&str> for IdArg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for IdArg {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Id> for IdArg {
    fn from(value: Id) -> Self {
        Self::Resolved(value)
    }
}

/// One scripted scenario run against a domain runtime `R`, rendering its
/// transcript through writer `W`.
pub struct TestHarness<R: Runtime, W: TextWriter> {
    ids: IdRegistry,
    context: ContextCell<R>,
    results: VecDeque<EventEnvelope>,
    formatter: TextFormatter<W>,
    hook: Box<dyn FailureHook>,
    on_event: Option<Box<dyn FnMut(&EventEnvelope)>>,
    on_command: Option<Box<dyn FnMut(&CommandEnvelope)>>,
}

impl<R: Runtime, W: TextWriter> TestHarness<R, W> {
    /// Begins a scenario with the given transcript writer and failure hook.
    pub fn new(writer: W, hook: impl FailureHook + 'static) -> Self {
        Self {
            ids: IdRegistry::new(),
            context: ContextCell::new(),
            results: VecDeque::new(),
            formatter: TextFormatter::new(writer),
            hook: Box::new(hook),
            on_event: None,
            on_command: None,
        }
    }

    /// Observes every event just before it is handed to the runtime.
    #[must_use]
    pub fn with_on_event(mut self, observer: impl FnMut(&EventEnvelope) + 'static) -> Self {
        self.on_event = Some(Box::new(observer));
        self
    }

    /// Observes every command just before it is dispatched.
    #[must_use]
    pub fn with_on_command(mut self, observer: impl FnMut(&CommandEnvelope) + 'static) -> Self {
        self.on_command = Some(Box::new(observer));
        self
    }

    /// Read access to the transcript writer.
    pub const fn writer(&self) -> &W {
        self.formatter.writer()
    }

    /// Applies a mutation to the pending runtime configuration.
    ///
    /// Must be called before the first `given` or `when` step.
    pub fn configure(&mut self, mutator: impl FnOnce(&mut R::Config)) -> HarnessResult<()> {
        self.context.configure(mutator)
    }

    /// Generates a new identity for the aggregate type and registers it.
    pub fn new_id<A: Aggregate>(&mut self, args: &[&str]) -> HarnessResult<Id> {
        let id = Id::generate::<A>(args);
        self.ids.register(id.clone())?;
        Ok(id)
    }

    /// The most recently registered identity of the aggregate type.
    pub fn latest<A: Aggregate>(&self) -> HarnessResult<Id> {
        self.ids.latest(A::tag()).map(Clone::clone)
    }

    /// Shorthand for [`TestHarness::id_at`] with rank 1.
    pub fn id<A: Aggregate>(&self) -> HarnessResult<Id> {
        self.id_at::<A>(1)
    }

    /// The identity of the aggregate type at the given 1-based recency rank.
    pub fn id_at<A: Aggregate>(&self, index: usize) -> HarnessResult<Id> {
        self.ids.nth(A::tag(), index).map(Clone::clone)
    }

    fn resolve<A: Aggregate>(&self, arg: IdArg) -> HarnessResult<Id> {
        match arg {
            IdArg::Latest => self.latest::<A>(),
            IdArg::Text(text) => Ok(Id::of::<A>(text)),
            IdArg::Resolved(id) => Ok(id),
        }
    }

    /// Emits a given event against the most recent identity of `A`.
    pub fn emit<A, E>(&mut self, event: E) -> HarnessResult<()>
    where
        A: Aggregate,
        E: DomainEvent,
    {
        self.emit_for::<A, E>(IdArg::Latest, event)
    }

    /// Emits a given event against a named identity of `A`.
    ///
    /// Verifies the event is legally emittable from `A`, registers the
    /// identity, stamps the event's metadata with it, persists the event
    /// through the runtime, and records it in the transcript.
    pub fn emit_for<A, E>(&mut self, id: impl Into<IdArg>, event: E) -> HarnessResult<()>
    where
        A: Aggregate,
        E: DomainEvent,
    {
        let id = self.resolve::<A>(id.into())?;

        if !A::lineage().contains(&<E::Owner as Aggregate>::tag()) {
            return Err(HarnessError::IllegalEmission {
                event: short_type_name(E::name()).to_string(),
                aggregate: A::tag(),
            });
        }

        self.ids.register(id.clone())?;

        let mut envelope = EventEnvelope::new(&event)?;
        envelope.set_root_id(&id);
        debug!(event = envelope.display_name(), root = %id, "given");

        if let Some(observer) = self.on_event.as_mut() {
            observer(&envelope);
        }

        self.context
            .get_or_create()
            .save(A::tag(), envelope.clone())
            .map_err(HarnessError::Runtime)?;

        self.formatter
            .block("Given that:")
            .write(&envelope.render())
            .newline()
            .newline();
        Ok(())
    }

    /// Submits a command to the runtime; its events become the new result
    /// stream. A fault propagates to the caller unmodified.
    pub fn when<C: DomainCommand>(&mut self, command: C) -> HarnessResult<()> {
        match self.execute(command)? {
            Ok(events) => {
                self.results = events.into();
                Ok(())
            }
            Err(fault) => Err(HarnessError::Runtime(fault)),
        }
    }

    /// The shared when-step machinery: ensure the context, render the
    /// command, dispatch it, and hand the raw outcome back.
    fn execute<C: DomainCommand>(
        &mut self,
        command: C,
    ) -> HarnessResult<Result<Vec<EventEnvelope>, Fault>> {
        let envelope = CommandEnvelope::new(&command)?;
        debug!(command = envelope.display_name(), "when");

        let _ = self.context.get_or_create();

        if let Some(observer) = self.on_command.as_mut() {
            observer(&envelope);
        }

        self.formatter
            .block("When users:")
            .write(&envelope.render())
            .newline();

        Ok(self.context.get_or_create().dispatch(envelope))
    }

    /// Expects the command to fault with type `F`.
    ///
    /// Re-invokes the when-step machinery but intercepts the fault instead
    /// of propagating it. The result stream ends empty either way, since a
    /// faulted command is defined to have produced nothing.
    pub fn throws<F, C>(&mut self, command: C) -> HarnessResult<()>
    where
        F: std::error::Error + 'static,
        C: DomainCommand,
    {
        let outcome = self.execute(command)?;
        self.formatter.block("Then:");

        let passed = matches!(&outcome, Err(fault) if fault.downcast_ref::<F>().is_some());
        let expected = format!("It throws {}", short_type_name(std::any::type_name::<F>()));
        self.check(
            passed,
            |f| {
                f.write(&expected).newline();
            },
            |f| match &outcome {
                Ok(_) => {
                    f.write("But it did not.");
                }
                Err(fault) => {
                    f.write(&format!("But got {fault:?}")).newline();
                }
            },
        );

        self.results.clear();
        Ok(())
    }

    /// Expects the command to fault with type `F` and exactly this message.
    pub fn throws_with<F, C>(&mut self, message: &str, command: C) -> HarnessResult<()>
    where
        F: std::error::Error + 'static,
        C: DomainCommand,
    {
        let outcome = self.execute(command)?;
        self.formatter.block("Then:");

        let passed = matches!(
            &outcome,
            Err(fault) if fault.downcast_ref::<F>().is_some() && fault.to_string() == message
        );
        let expected = format!("It throws {}", short_type_name(std::any::type_name::<F>()));
        self.check(
            passed,
            |f| {
                f.write(&expected)
                    .newline()
                    .indent()
                    .write(&format!("Message: \"{message}\""))
                    .unindent()
                    .newline();
            },
            |f| match &outcome {
                Ok(_) => {
                    f.write("But it did not.");
                }
                Err(fault) => {
                    f.write(&format!("But got {fault:?}"))
                        .newline()
                        .indent()
                        .write(&format!("Message: \"{fault}\""))
                        .unindent();
                }
            },
        );

        self.results.clear();
        Ok(())
    }

    /// Expects the head of the result stream to be exactly of type `E`.
    ///
    /// Consumes one element on pass or fail, but consumes nothing when the
    /// stream is empty: a missing head is compared as "nothing", not left
    /// in the stream.
    pub fn then_event<E: DomainEvent>(&mut self) {
        let head = self.results.front().cloned();
        self.formatter.block("Then:");

        let passed = head.as_ref().is_some_and(|event| event.is::<E>());
        let expected = short_type_name(E::name());
        self.check(
            passed,
            |f| {
                f.write(expected).newline();
            },
            |f| match &head {
                Some(event) => {
                    f.write(&format!("But we got {}", event.display_name()))
                        .newline();
                }
                None => {
                    f.write("But we got nothing").newline();
                }
            },
        );

        let _ = self.results.pop_front();
    }

    /// Expects the next events in the stream, in order, all owned by the
    /// resolved identity of `A`.
    ///
    /// Each expected event consumes exactly one stream element regardless
    /// of pass or fail. If the stream runs out, the check fails once with
    /// "got nothing" and stops processing the remaining expectations.
    pub fn then<A: Aggregate>(
        &mut self,
        id: impl Into<IdArg>,
        expected: Vec<EventEnvelope>,
    ) -> HarnessResult<()> {
        if expected.is_empty() {
            return Ok(());
        }
        let id = self.resolve::<A>(id.into())?;
        self.formatter.block("Then:");

        for mut expected in expected {
            expected.set_root_id(&id);
            let expected_line = expected.render();

            let Some(actual) = self.results.pop_front() else {
                self.check(
                    false,
                    |f| {
                        f.write(&expected_line).newline();
                    },
                    |f| {
                        f.block("But we got nothing.");
                    },
                );
                return Ok(());
            };

            let passed = actual.root_id() == Some(id.value())
                && actual.name() == expected.name()
                && actual.payload() == expected.payload();

            let actual_line = actual.render();
            let diff_text = diff::render(&diff::line_by_line(
                &actual.render_pretty(),
                &expected.render_pretty(),
            ));
            self.check(
                passed,
                |f| {
                    f.write(&expected_line).newline();
                },
                |f| {
                    f.block("But we got this:")
                        .indent()
                        .write(&actual_line)
                        .unindent()
                        .end_block();
                    f.newline()
                        .newline()
                        .write("Diff:")
                        .newline()
                        .write(&diff_text);
                },
            );
        }
        Ok(())
    }

    /// Convenience form of [`TestHarness::then`] for a single event.
    pub fn then_for<A, E>(&mut self, id: impl Into<IdArg>, event: E) -> HarnessResult<()>
    where
        A: Aggregate,
        E: DomainEvent,
    {
        let envelope = EventEnvelope::new(&event)?;
        self.then::<A>(id, vec![envelope])
    }

    /// Expects no event of type `E` anywhere in the current result stream.
    ///
    /// The stream ends empty regardless of the outcome.
    pub fn then_no<E: DomainEvent>(&mut self) {
        self.formatter.block("Then:");

        let matching: Vec<EventEnvelope> = self
            .results
            .iter()
            .filter(|event| event.is::<E>())
            .cloned()
            .collect();
        let expected = format!("No {} is emitted", short_type_name(E::name()));
        self.check(
            matching.is_empty(),
            |f| {
                f.write(&expected);
            },
            |f| {
                f.block("But we got this:");
                for event in &matching {
                    f.write(&event.render()).newline();
                }
                f.end_block();
            },
        );

        self.results.clear();
    }

    /// Tears the run down with the end-of-run "no leftover events" check.
    ///
    /// Skipped entirely when the run is already in an exceptional state, so
    /// an unrelated fault is not shadowed by a leftover-events failure.
    pub fn end(&mut self, exceptional: bool) {
        if exceptional || self.results.is_empty() {
            return;
        }

        let leftovers: Vec<EventEnvelope> = self.results.iter().cloned().collect();
        self.check(
            false,
            |f| {
                f.write("Expects no more events").newline();
            },
            |f| {
                f.write("But found:").newline().indent();
                for event in &leftovers {
                    f.write(&event.render()).newline();
                }
                f.unindent();
            },
        );
    }

    /// The shared assertion primitive.
    ///
    /// Always renders the glyph and the expected rendering; on failure also
    /// renders the actual rendering and invokes the failure hook exactly
    /// once before returning.
    fn check(
        &mut self,
        condition: bool,
        render_expected: impl FnOnce(&mut TextFormatter<W>),
        render_actual: impl FnOnce(&mut TextFormatter<W>),
    ) {
        let glyph = if condition { CHECK_MARK } else { CROSS_MARK };
        self.formatter.write(glyph).write(" ").indent();
        render_expected(&mut self.formatter);
        self.formatter.unindent().newline();

        if !condition {
            render_actual(&mut self.formatter);
            self.hook.on_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Fault;
    use crate::report::StringWriter;
    use crate::types::TypeTag;
    use serde::{Deserialize, Serialize};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Customer;
    impl Aggregate for Customer {}

    struct Order;
    impl Aggregate for Order {}

    #[derive(Debug, Serialize, Deserialize)]
    struct CustomerCreated {
        name: String,
    }
    impl DomainEvent for CustomerCreated {
        type Owner = Customer;
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct OrderPlaced;
    impl DomainEvent for OrderPlaced {
        type Owner = Order;
    }

    #[derive(Debug, Serialize)]
    struct Noop;
    impl DomainCommand for Noop {}

    /// Runtime that replays a scripted batch of events for every command.
    #[derive(Default)]
    struct Scripted {
        saved: Vec<EventEnvelope>,
        replies: Vec<EventEnvelope>,
    }

    #[derive(Default)]
    struct ScriptedConfig {
        replies: Vec<EventEnvelope>,
    }

    impl Runtime for Scripted {
        type Config = ScriptedConfig;

        fn create(config: Self::Config) -> Self {
            Self {
                saved: Vec::new(),
                replies: config.replies,
            }
        }

        fn save(&mut self, _aggregate: TypeTag, event: EventEnvelope) -> Result<(), Fault> {
            self.saved.push(event);
            Ok(())
        }

        fn dispatch(&mut self, _command: CommandEnvelope) -> Result<Vec<EventEnvelope>, Fault> {
            Ok(self.replies.clone())
        }
    }

    type Harness = TestHarness<Scripted, StringWriter>;

    fn harness_counting(failures: &Rc<Cell<usize>>) -> Harness {
        let failures = Rc::clone(failures);
        TestHarness::new(StringWriter::new(), move || {
            failures.set(failures.get() + 1);
        })
    }

    fn created(name: &str, id: &str) -> EventEnvelope {
        let mut envelope = EventEnvelope::new(&CustomerCreated {
            name: name.to_string(),
        })
        .expect("serializable payload");
        envelope.set_root_id(&Id::of::<Customer>(id));
        envelope
    }

    #[test]
    fn illegal_emission_never_registers_the_identity() {
        let failures = Rc::new(Cell::new(0));
        let mut harness = harness_counting(&failures);

        let err = harness
            .emit_for::<Customer, OrderPlaced>("x", OrderPlaced)
            .expect_err("OrderPlaced is not declared against Customer");
        assert!(matches!(err, HarnessError::IllegalEmission { .. }));
        assert!(harness.latest::<Customer>().is_err());
    }

    #[test]
    fn emit_registers_identity_and_persists_the_event() {
        let failures = Rc::new(Cell::new(0));
        let mut harness = harness_counting(&failures);

        harness
            .emit_for::<Customer, CustomerCreated>(
                "x",
                CustomerCreated {
                    name: "a".to_string(),
                },
            )
            .expect("legal emission");

        assert_eq!(harness.latest::<Customer>().unwrap().value(), "x");
        assert!(harness.writer().as_str().contains("Given that:"));
        assert!(harness.writer().as_str().contains("CustomerCreated"));
        assert_eq!(failures.get(), 0);
    }

    #[test]
    fn emit_defaults_to_the_latest_identity() {
        let failures = Rc::new(Cell::new(0));
        let mut harness = harness_counting(&failures);

        let err = harness
            .emit::<Customer, CustomerCreated>(CustomerCreated {
                name: "a".to_string(),
            })
            .expect_err("nothing registered yet");
        assert!(matches!(err, HarnessError::NoSuchIdentity { .. }));
    }

    #[test]
    fn configure_after_a_step_is_rejected() {
        let failures = Rc::new(Cell::new(0));
        let mut harness = harness_counting(&failures);

        harness
            .emit_for::<Customer, CustomerCreated>(
                "x",
                CustomerCreated {
                    name: "a".to_string(),
                },
            )
            .expect("legal emission");
        let err = harness
            .configure(|config| config.replies.clear())
            .expect_err("context already created");
        assert!(matches!(err, HarnessError::LateConfiguration));
    }

    #[test]
    fn then_event_consumes_one_element_even_on_failure() {
        let failures = Rc::new(Cell::new(0));
        let mut harness = harness_counting(&failures);
        harness
            .configure(|config| {
                config.replies = vec![created("a", "x"), created("b", "x")];
            })
            .expect("fresh harness");
        harness.when(Noop).expect("scripted runtime never faults");

        harness.then_event::<OrderPlaced>();
        assert_eq!(failures.get(), 1);

        // The failed check consumed the head; one event remains.
        harness.then_event::<CustomerCreated>();
        assert_eq!(failures.get(), 1);

        harness.end(false);
        assert_eq!(failures.get(), 1);
    }

    #[test]
    fn then_event_on_empty_stream_consumes_nothing() {
        let failures = Rc::new(Cell::new(0));
        let mut harness = harness_counting(&failures);
        harness.when(Noop).expect("scripted runtime never faults");

        harness.then_event::<CustomerCreated>();
        assert_eq!(failures.get(), 1);
        assert!(harness.writer().as_str().contains("But we got nothing"));
    }

    #[test]
    fn sequence_check_stops_on_exhaustion() {
        let failures = Rc::new(Cell::new(0));
        let mut harness = harness_counting(&failures);
        harness
            .configure(|config| config.replies = vec![created("a", "x")])
            .expect("fresh harness");
        harness.when(Noop).expect("scripted runtime never faults");

        let expected = vec![
            EventEnvelope::new(&CustomerCreated {
                name: "a".to_string(),
            })
            .unwrap(),
            EventEnvelope::new(&CustomerCreated {
                name: "b".to_string(),
            })
            .unwrap(),
            EventEnvelope::new(&CustomerCreated {
                name: "c".to_string(),
            })
            .unwrap(),
        ];
        harness
            .then::<Customer>("x", expected)
            .expect("identity resolves");

        // One pass, then a single "got nothing" failure; the third
        // expectation is never processed.
        assert_eq!(failures.get(), 1);
        assert!(harness.writer().as_str().contains("But we got nothing."));
    }

    #[test]
    fn mismatched_identity_fails_the_sequence_check() {
        let failures = Rc::new(Cell::new(0));
        let mut harness = harness_counting(&failures);
        harness
            .configure(|config| config.replies = vec![created("a", "y")])
            .expect("fresh harness");
        harness.when(Noop).expect("scripted runtime never faults");

        harness
            .then_for::<Customer, CustomerCreated>(
                "x",
                CustomerCreated {
                    name: "a".to_string(),
                },
            )
            .expect("identity resolves");
        assert_eq!(failures.get(), 1);
    }

    #[test]
    fn then_no_empties_the_stream_and_is_trivially_true_afterwards() {
        let failures = Rc::new(Cell::new(0));
        let mut harness = harness_counting(&failures);
        harness
            .configure(|config| config.replies = vec![created("a", "x")])
            .expect("fresh harness");
        harness.when(Noop).expect("scripted runtime never faults");

        harness.then_no::<CustomerCreated>();
        assert_eq!(failures.get(), 1);

        // Nothing left to match: trivial success, no actual items rendered.
        harness.then_no::<CustomerCreated>();
        assert_eq!(failures.get(), 1);

        harness.end(false);
        assert_eq!(failures.get(), 1);
    }

    #[test]
    fn end_reports_leftover_events_by_name() {
        let failures = Rc::new(Cell::new(0));
        let mut harness = harness_counting(&failures);
        harness
            .configure(|config| config.replies = vec![created("a", "x")])
            .expect("fresh harness");
        harness.when(Noop).expect("scripted runtime never faults");

        harness.end(false);
        assert_eq!(failures.get(), 1);
        assert!(harness.writer().as_str().contains("But found:"));
        assert!(harness.writer().as_str().contains("CustomerCreated"));
    }

    #[test]
    fn end_is_skipped_in_an_exceptional_state() {
        let failures = Rc::new(Cell::new(0));
        let mut harness = harness_counting(&failures);
        harness
            .configure(|config| config.replies = vec![created("a", "x")])
            .expect("fresh harness");
        harness.when(Noop).expect("scripted runtime never faults");

        harness.end(true);
        assert_eq!(failures.get(), 0);
    }

    #[test]
    fn observers_see_events_and_commands() {
        let seen = Rc::new(Cell::new((0_usize, 0_usize)));
        let events = Rc::clone(&seen);
        let commands = Rc::clone(&seen);
        let mut harness: Harness = TestHarness::new(StringWriter::new(), || {})
            .with_on_event(move |_| {
                let (e, c) = events.get();
                events.set((e + 1, c));
            })
            .with_on_command(move |_| {
                let (e, c) = commands.get();
                commands.set((e, c + 1));
            });

        harness
            .emit_for::<Customer, CustomerCreated>(
                "x",
                CustomerCreated {
                    name: "a".to_string(),
                },
            )
            .expect("legal emission");
        harness.when(Noop).expect("scripted runtime never faults");

        assert_eq!(seen.get(), (1, 1));
    }
}
