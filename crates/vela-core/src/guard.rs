//! # Dependency Guard
//!
//! Deactivating an entity that other live records point at is a correctness
//! hazard: a brand cannot silently vanish while products still reference it.
//! Before any deactivation the guard counts live dependents and classifies
//! the request:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  deactivate(brand 7)                                                │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  count active products where brand_id = 7                           │
//! │       │                                                             │
//! │       ├── 0 dependents ──► Plan::Free (deactivate immediately)      │
//! │       │                                                             │
//! │       └── N dependents ──► Plan::Blocked { counts, strategies }     │
//! │                                 │                                   │
//! │                                 ▼  caller re-invokes with one of:   │
//! │                            cancel | cascade-deactivate-dependents   │
//! │                                   | clear-link                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guard never picks a default. Cascading over an operator's data
//! without an explicit choice is treated as a bug, not a convenience.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entity::EntityKind;

// =============================================================================
// Strategies
// =============================================================================

/// Operator-chosen resolution for live dependents of a record being
/// deactivated (or displaced by a swap).
///
/// A closed enum at the core boundary: transport layers parse their
/// free-form strategy strings once at the edge, so the engine never guards
/// against unknown values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Abort, no change.
    #[serde(rename = "cancel")]
    Cancel,
    /// Deactivate every live dependent, then the target, as one transaction.
    #[serde(rename = "cascade-deactivate-dependents")]
    CascadeDeactivate,
    /// Null out the reference on every live dependent, then deactivate the
    /// target, as one transaction. Only offered where dependents can
    /// meaningfully exist without the link.
    #[serde(rename = "clear-link")]
    ClearLink,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Cancel => "cancel",
            Strategy::CascadeDeactivate => "cascade-deactivate-dependents",
            Strategy::ClearLink => "clear-link",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Plan
// =============================================================================

/// Live-dependent tally for one dependent entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependentCount {
    pub kind: EntityKind,
    /// The reference field on the dependent that points at the target.
    pub fk_field: &'static str,
    /// Number of ACTIVE dependent rows. Inactive dependents never block.
    pub count: i64,
}

/// Verdict for a deactivation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeactivationPlan {
    /// No live dependents; deactivate immediately, no strategy needed.
    Free,
    /// Live dependents exist. The caller must re-invoke with one of the
    /// listed strategies; the payload is complete enough that no re-query
    /// is needed to present the choice.
    Blocked {
        counts: Vec<DependentCount>,
        strategies: Vec<Strategy>,
    },
}

/// Classifies a deactivation given the per-type dependent tallies and the
/// entity's configured strategy set.
///
/// Zero-count tallies are dropped from the blocked payload: the operator is
/// shown only what actually stands in the way.
pub fn classify(counts: Vec<DependentCount>, available: &[Strategy]) -> DeactivationPlan {
    let live: Vec<DependentCount> = counts.into_iter().filter(|c| c.count > 0).collect();

    if live.is_empty() {
        return DeactivationPlan::Free;
    }

    DeactivationPlan::Blocked {
        counts: live,
        strategies: available.to_vec(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn count(kind: EntityKind, fk_field: &'static str, count: i64) -> DependentCount {
        DependentCount { kind, fk_field, count }
    }

    #[test]
    fn test_no_dependents_is_free() {
        let plan = classify(vec![], &[Strategy::Cancel, Strategy::CascadeDeactivate]);
        assert_eq!(plan, DeactivationPlan::Free);
    }

    #[test]
    fn test_zero_counts_are_free() {
        let plan = classify(
            vec![count(EntityKind::Product, "brand_id", 0)],
            &[Strategy::Cancel, Strategy::CascadeDeactivate, Strategy::ClearLink],
        );
        assert_eq!(plan, DeactivationPlan::Free);
    }

    #[test]
    fn test_live_dependents_block() {
        let plan = classify(
            vec![count(EntityKind::PaymentMethod, "account_id", 3)],
            &[Strategy::Cancel, Strategy::CascadeDeactivate],
        );
        match plan {
            DeactivationPlan::Blocked { counts, strategies } => {
                assert_eq!(counts.len(), 1);
                assert_eq!(counts[0].count, 3);
                assert_eq!(strategies, vec![Strategy::Cancel, Strategy::CascadeDeactivate]);
            }
            DeactivationPlan::Free => panic!("expected Blocked"),
        }
    }

    #[test]
    fn test_zero_count_rows_dropped_from_payload() {
        let plan = classify(
            vec![
                count(EntityKind::Product, "brand_id", 2),
                count(EntityKind::Product, "category_id", 0),
            ],
            &[Strategy::Cancel, Strategy::ClearLink],
        );
        match plan {
            DeactivationPlan::Blocked { counts, .. } => {
                assert_eq!(counts.len(), 1);
                assert_eq!(counts[0].fk_field, "brand_id");
            }
            DeactivationPlan::Free => panic!("expected Blocked"),
        }
    }

    #[test]
    fn test_strategy_wire_names() {
        assert_eq!(Strategy::CascadeDeactivate.to_string(), "cascade-deactivate-dependents");
        assert_eq!(Strategy::ClearLink.to_string(), "clear-link");
        assert_eq!(Strategy::Cancel.to_string(), "cancel");

        let parsed: Strategy = serde_json::from_str("\"clear-link\"").unwrap();
        assert_eq!(parsed, Strategy::ClearLink);
    }
}
