//! # Domain Types
//!
//! The generic record shape shared by every lifecycle-managed entity, plus
//! the payload types callers hand to the lifecycle service.
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: store-assigned integer - immutable, used for relations, survives
//!   deactivation and reactivation unchanged
//! - Natural key: (name, number, code, username) - human-meaningful,
//!   mutable, unique among ACTIVE records via its normalized form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entity::{EntityKind, ProtectedPolicy};
use crate::key::NaturalKey;

/// Nullable foreign references keyed by field name (`account_id`,
/// `brand_id`, ...). Only fields listed in the entity's spec are meaningful.
pub type RefMap = BTreeMap<String, Option<i64>>;

// =============================================================================
// Record
// =============================================================================

/// A lifecycle-managed entity row.
///
/// The engine owns the lifecycle columns (`key`, `normalized_key`, `active`,
/// `refs`); everything else about the entity (prices, descriptions, stock
/// figures) rides in `data` as an opaque JSON object the engine stores but
/// never interprets, except for fixed protection policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Surrogate key, assigned by the store, immutable once created.
    pub id: i64,

    /// Entity type this record belongs to.
    pub kind: EntityKind,

    /// User-facing natural key.
    pub key: NaturalKey,

    /// Canonical comparison form of `key`. Derived; recomputed on every key
    /// write, never exposed for direct mutation.
    pub normalized_key: String,

    /// The sole soft-delete flag. No record is ever physically removed.
    pub active: bool,

    /// Foreign references to other lifecycle-managed entities.
    pub refs: RefMap,

    /// Remaining descriptive fields, opaque to the engine.
    pub data: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Whether a fixed protection policy marks this record untouchable
    /// (e.g. the admin user can never be deactivated).
    pub fn is_protected_by(&self, policy: &ProtectedPolicy) -> bool {
        self.data
            .get(policy.field)
            .and_then(|v| v.as_str())
            .map(|v| v == policy.value)
            .unwrap_or(false)
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Payload for `create`: a record minus everything the store assigns.
///
/// Fields arrive already validated and typed; raw form parsing stays
/// upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub key: NaturalKey,
    #[serde(default)]
    pub refs: RefMap,
    #[serde(default = "empty_object")]
    pub data: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Draft {
    pub fn new(key: impl Into<NaturalKey>) -> Self {
        Draft {
            key: key.into(),
            refs: RefMap::new(),
            data: empty_object(),
        }
    }

    /// Sets a foreign reference field.
    pub fn with_ref(mut self, field: impl Into<String>, id: Option<i64>) -> Self {
        self.refs.insert(field.into(), id);
        self
    }

    /// Sets the descriptive field bag.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Payload for `update`: only what changes is present.
///
/// A patch that does not touch the natural key skips conflict checking
/// entirely; one that does re-runs the resolver excluding the patched record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// New natural key, if the key is being changed.
    #[serde(default)]
    pub key: Option<NaturalKey>,

    /// Reference fields to change. Absent fields are left untouched;
    /// a present `None` clears the link.
    #[serde(default)]
    pub refs: RefMap,

    /// Replacement descriptive field bag, if it is being changed.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl Patch {
    pub fn new() -> Self {
        Patch::default()
    }

    pub fn with_key(mut self, key: impl Into<NaturalKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_ref(mut self, field: impl Into<String>, id: Option<i64>) -> Self {
        self.refs.insert(field.into(), id);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Whether this patch writes the natural key.
    pub fn touches_key(&self) -> bool {
        self.key.is_some()
    }

    /// Whether there is anything to write at all.
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.refs.is_empty() && self.data.is_none()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(data: serde_json::Value) -> Record {
        Record {
            id: 1,
            kind: EntityKind::User,
            key: NaturalKey::from("admin"),
            normalized_key: "admin".to_string(),
            active: true,
            refs: RefMap::new(),
            data,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_protection_policy_match() {
        let policy = ProtectedPolicy { field: "role", value: "admin" };

        assert!(record(json!({"role": "admin"})).is_protected_by(&policy));
        assert!(!record(json!({"role": "waiter"})).is_protected_by(&policy));
        assert!(!record(json!({})).is_protected_by(&policy));
        // Non-string role never matches
        assert!(!record(json!({"role": 1})).is_protected_by(&policy));
    }

    #[test]
    fn test_draft_builder() {
        let draft = Draft::new(42)
            .with_ref("brand_id", Some(7))
            .with_ref("provider_id", None)
            .with_data(json!({"price_cents": 250}));

        assert_eq!(draft.key, NaturalKey::Number(42));
        assert_eq!(draft.refs.get("brand_id"), Some(&Some(7)));
        assert_eq!(draft.refs.get("provider_id"), Some(&None));
    }

    #[test]
    fn test_patch_key_detection() {
        assert!(!Patch::new().touches_key());
        assert!(Patch::new().is_empty());

        let patch = Patch::new().with_key("Nike Air");
        assert!(patch.touches_key());
        assert!(!patch.is_empty());

        let patch = Patch::new().with_ref("brand_id", None);
        assert!(!patch.touches_key());
        assert!(!patch.is_empty());
    }
}
