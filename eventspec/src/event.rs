//! Domain events and their type-erased envelope.
//!
//! The harness compares events under a normalized view: the payload
//! serialized to JSON, with the envelope fields and the metadata map
//! excluded. The owning identity is asserted separately through the
//! reserved [`keys::ROOT_ID`] metadata key. This is the explicit
//! serialization contract that replaces reflection-driven property
//! filtering.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::types::{short_type_name, Aggregate, Id, TypeTag};

/// Reserved metadata keys stamped onto event envelopes.
pub mod keys {
    /// The string form of the owning aggregate identity.
    pub const ROOT_ID: &str = "root_id";
    /// RFC 3339 timestamp of when the event entered the harness.
    pub const OCCURRED_AT: &str = "occurred_at";
}

/// A fact that occurred to exactly one aggregate instance.
///
/// Implementors declare the aggregate type the event can legally originate
/// from through the `Owner` associated type; the harness uses it for the
/// emittability check instead of inspecting type hierarchies at runtime.
pub trait DomainEvent: Serialize + Sized + 'static {
    /// The aggregate type this event is declared against.
    type Owner: Aggregate;

    /// The full type path of the event, used for exact-type checks.
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A type-erased domain event: type name, declared owner, JSON payload, and
/// a metadata map. Immutable once handed to the runtime; the harness keeps
/// its own clone only for transcript rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    name: &'static str,
    owner: TypeTag,
    payload: Value,
    meta: BTreeMap<String, String>,
}

impl EventEnvelope {
    /// Wraps a domain event, serializing its payload to the comparison view.
    pub fn new<E: DomainEvent>(event: &E) -> Result<Self, serde_json::Error> {
        let mut meta = BTreeMap::new();
        meta.insert(keys::OCCURRED_AT.to_string(), Utc::now().to_rfc3339());
        Ok(Self {
            name: E::name(),
            owner: E::Owner::tag(),
            payload: serde_json::to_value(event)?,
            meta,
        })
    }

    /// Whether this envelope carries an event of exactly the given type.
    pub fn is<E: DomainEvent>(&self) -> bool {
        self.name == E::name()
    }

    /// The full type path of the wrapped event.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The short event name shown in transcripts.
    pub fn display_name(&self) -> &'static str {
        short_type_name(self.name)
    }

    /// The aggregate type the event is declared against.
    pub const fn owner(&self) -> TypeTag {
        self.owner
    }

    /// The payload in its normalized JSON form.
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// The metadata map. Excluded from structural equality.
    pub const fn meta(&self) -> &BTreeMap<String, String> {
        &self.meta
    }

    /// Stamps the owning identity under the reserved metadata key.
    pub fn set_root_id(&mut self, id: &Id) {
        self.meta
            .insert(keys::ROOT_ID.to_string(), id.value().to_string());
    }

    /// The owning identity's string form, if stamped.
    pub fn root_id(&self) -> Option<&str> {
        self.meta.get(keys::ROOT_ID).map(String::as_str)
    }

    /// Single-line rendering for the transcript.
    pub fn render(&self) -> String {
        format!("{}({})", self.display_name(), self.payload)
    }

    /// Multi-line rendering used as diff input on mismatches.
    pub fn render_pretty(&self) -> String {
        let payload = serde_json::to_string_pretty(&self.payload)
            .unwrap_or_else(|_| self.payload.to_string());
        format!("{} {payload}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    struct Customer;
    impl Aggregate for Customer {}

    #[derive(Debug, Serialize, Deserialize)]
    struct CustomerRenamed {
        name: String,
    }

    impl DomainEvent for CustomerRenamed {
        type Owner = Customer;
    }

    fn renamed(name: &str) -> EventEnvelope {
        EventEnvelope::new(&CustomerRenamed {
            name: name.to_string(),
        })
        .expect("serializable payload")
    }

    #[test]
    fn envelope_captures_name_owner_and_payload() {
        let envelope = renamed("a");
        assert!(envelope.is::<CustomerRenamed>());
        assert_eq!(envelope.display_name(), "CustomerRenamed");
        assert_eq!(envelope.owner(), Customer::tag());
        assert_eq!(envelope.payload()["name"], "a");
    }

    #[test]
    fn root_id_round_trips_through_metadata() {
        let mut envelope = renamed("a");
        assert_eq!(envelope.root_id(), None);
        envelope.set_root_id(&Id::of::<Customer>("x"));
        assert_eq!(envelope.root_id(), Some("x"));
    }

    #[test]
    fn metadata_is_excluded_from_the_comparison_view() {
        let mut a = renamed("a");
        let b = renamed("a");
        a.set_root_id(&Id::of::<Customer>("x"));
        // Same normalized view even though the metadata differs.
        assert_eq!(a.payload(), b.payload());
        assert_ne!(a.meta(), b.meta());
    }

    #[test]
    fn render_is_single_line() {
        let envelope = renamed("a");
        assert_eq!(envelope.render(), r#"CustomerRenamed({"name":"a"})"#);
    }
}
