//! Per-scenario registry of synthetic identities.
//!
//! Identities live in one registration-ordered list; lookups filter by type
//! tag and walk from the most recent end, so later registrations shadow
//! earlier ones for `latest` and rank-1 lookups of the same type.

use tracing::trace;

use crate::errors::{HarnessError, HarnessResult};
use crate::types::{Id, TypeTag};

/// Type-partitioned store of synthetic identities with LIFO recency
/// semantics and duplicate-compatibility checking.
#[derive(Debug, Default)]
pub struct IdRegistry {
    ids: Vec<Id>,
}

impl IdRegistry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self { ids: Vec::new() }
    }

    /// Inserts an identity if its string form is not yet known.
    ///
    /// Re-registering a known string form is a no-op when the new identity's
    /// type is equal to, or a specialization of, the existing one; otherwise
    /// this fails with [`HarnessError::ConflictingIdentityType`]. Reuse never
    /// changes recency order.
    pub fn register(&mut self, id: Id) -> HarnessResult<()> {
        if let Some(existing) = self.ids.iter().find(|known| known.value() == id.value()) {
            if id.lineage().contains(&existing.tag()) {
                return Ok(());
            }
            return Err(HarnessError::ConflictingIdentityType {
                value: id.value().to_string(),
                existing: existing.tag(),
                requested: id.tag(),
            });
        }
        trace!(id = %id, aggregate = %id.tag(), "registering identity");
        self.ids.push(id);
        Ok(())
    }

    /// The most recently registered identity of the given type.
    pub fn latest(&self, aggregate: TypeTag) -> HarnessResult<&Id> {
        self.ids
            .iter()
            .rev()
            .find(|id| id.tag() == aggregate)
            .ok_or(HarnessError::NoSuchIdentity { aggregate })
    }

    /// The identity at the given 1-based recency rank (most recent = 1).
    pub fn nth(&self, aggregate: TypeTag, index: usize) -> HarnessResult<&Id> {
        let of_type: Vec<&Id> = self
            .ids
            .iter()
            .rev()
            .filter(|id| id.tag() == aggregate)
            .collect();
        if index == 0 || index > of_type.len() {
            return Err(HarnessError::IndexOutOfRange {
                aggregate,
                index,
                registered: of_type.len(),
            });
        }
        Ok(of_type[index - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Aggregate;
    use proptest::prelude::*;

    struct Customer;
    impl Aggregate for Customer {}

    struct Order;
    impl Aggregate for Order {}

    struct VipCustomer;
    impl Aggregate for VipCustomer {
        fn lineage() -> Vec<TypeTag> {
            vec![Self::tag(), Customer::tag()]
        }
    }

    #[test]
    fn latest_returns_most_recent_of_type() {
        let mut registry = IdRegistry::new();
        registry.register(Id::of::<Customer>("x")).unwrap();
        registry.register(Id::of::<Order>("o")).unwrap();
        registry.register(Id::of::<Customer>("y")).unwrap();

        assert_eq!(registry.latest(Customer::tag()).unwrap().value(), "y");
        assert_eq!(registry.latest(Order::tag()).unwrap().value(), "o");
    }

    #[test]
    fn latest_fails_when_nothing_is_registered() {
        let registry = IdRegistry::new();
        let err = registry.latest(Customer::tag()).unwrap_err();
        assert!(matches!(err, HarnessError::NoSuchIdentity { .. }));
    }

    #[test]
    fn nth_is_reverse_indexed_and_one_based() {
        let mut registry = IdRegistry::new();
        registry.register(Id::of::<Customer>("x")).unwrap();
        registry.register(Id::of::<Customer>("y")).unwrap();

        assert_eq!(registry.nth(Customer::tag(), 1).unwrap().value(), "y");
        assert_eq!(registry.nth(Customer::tag(), 2).unwrap().value(), "x");
        let err = registry.nth(Customer::tag(), 3).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::IndexOutOfRange {
                index: 3,
                registered: 2,
                ..
            }
        ));
    }

    #[test]
    fn reregistering_the_same_identity_is_a_noop() {
        let mut registry = IdRegistry::new();
        registry.register(Id::of::<Customer>("x")).unwrap();
        registry.register(Id::of::<Customer>("y")).unwrap();
        registry.register(Id::of::<Customer>("x")).unwrap();

        // Reuse neither duplicates nor reorders.
        assert_eq!(registry.latest(Customer::tag()).unwrap().value(), "y");
        assert!(registry.nth(Customer::tag(), 3).is_err());
    }

    #[test]
    fn incompatible_reregistration_is_a_hard_error() {
        let mut registry = IdRegistry::new();
        registry.register(Id::of::<Customer>("x")).unwrap();
        let err = registry.register(Id::of::<Order>("x")).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::ConflictingIdentityType { .. }
        ));
    }

    #[test]
    fn specialized_reregistration_is_accepted() {
        let mut registry = IdRegistry::new();
        registry.register(Id::of::<Customer>("x")).unwrap();
        registry.register(Id::of::<VipCustomer>("x")).unwrap();
        // Still the originally registered identity.
        assert_eq!(registry.latest(Customer::tag()).unwrap().value(), "x");
    }

    proptest! {
        /// After any sequence of registrations, `latest` returns the last
        /// value whose string form had not been seen before.
        #[test]
        fn latest_tracks_the_newest_unseen_value(values in proptest::collection::vec("[a-z]{1,4}", 1..20)) {
            let mut registry = IdRegistry::new();
            let mut seen: Vec<String> = Vec::new();
            for value in &values {
                registry.register(Id::of::<Customer>(value.clone())).unwrap();
                if !seen.contains(value) {
                    seen.push(value.clone());
                }
            }
            let expected = seen.last().expect("at least one value");
            prop_assert_eq!(registry.latest(Customer::tag()).unwrap().value(), expected.as_str());
        }

        /// Rank-n lookup walks distinct registrations newest-first.
        #[test]
        fn nth_walks_distinct_registrations_newest_first(values in proptest::collection::vec("[a-z]{1,4}", 1..20)) {
            let mut registry = IdRegistry::new();
            let mut seen: Vec<String> = Vec::new();
            for value in &values {
                registry.register(Id::of::<Customer>(value.clone())).unwrap();
                if !seen.contains(value) {
                    seen.push(value.clone());
                }
            }
            for (rank, value) in seen.iter().rev().enumerate() {
                prop_assert_eq!(registry.nth(Customer::tag(), rank + 1).unwrap().value(), value.as_str());
            }
            prop_assert!(registry.nth(Customer::tag(), seen.len() + 1).is_err());
        }
    }
}
