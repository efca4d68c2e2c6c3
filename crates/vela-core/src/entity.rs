//! # Entity Registry
//!
//! Every back-office entity follows the same lifecycle pattern; what differs
//! per entity is configuration, not code. This module is that configuration:
//! one static [`EntitySpec`] per [`EntityKind`] naming the natural key, the
//! foreign references it carries, the entities that depend on it, the
//! deactivation strategies it supports, and any fixed protection policy.
//!
//! ## Registry At A Glance
//! ```text
//! ┌──────────────┬──────────┬────────┬───────────────────┬──────────────────────┐
//! │ Kind         │ Key      │ Shape  │ Dependents        │ Strategies           │
//! ├──────────────┼──────────┼────────┼───────────────────┼──────────────────────┤
//! │ Account      │ name     │ text   │ PaymentMethod     │ cancel, cascade      │
//! │ BarTable     │ number   │ number │ (none)            │ (never blocked)      │
//! │ Brand        │ name     │ text   │ Product           │ cancel, cascade,     │
//! │              │          │        │                   │ clear-link           │
//! │ Category     │ name     │ text   │ Product           │ cancel, cascade,     │
//! │              │          │        │                   │ clear-link           │
//! │ Employee     │ name     │ text   │ (none)            │ (never blocked)      │
//! │ Payment      │ name     │ text   │ (none)            │ (never blocked)      │
//! │ PaymentMethod│ name     │ text   │ (none)            │ (never blocked)      │
//! │ Product      │ code     │ number │ (none)            │ (never blocked)      │
//! │ Provider     │ name     │ text   │ Product           │ cancel, cascade,     │
//! │              │          │        │                   │ clear-link           │
//! │ User         │ username │ text   │ (none)            │ admin is protected   │
//! └──────────────┴──────────┴────────┴───────────────────┴──────────────────────┘
//! ```
//!
//! Products can outlive their brand (clear-link nulls the reference), but a
//! payment method cannot settle into a deactivated account, so Account only
//! offers the cascade.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::guard::Strategy;
use crate::key::KeyShape;

// =============================================================================
// Entity Kind
// =============================================================================

/// The closed set of lifecycle-managed entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    BarTable,
    Brand,
    Category,
    Employee,
    Payment,
    PaymentMethod,
    Product,
    Provider,
    User,
}

impl EntityKind {
    /// All kinds, in registry order.
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Account,
        EntityKind::BarTable,
        EntityKind::Brand,
        EntityKind::Category,
        EntityKind::Employee,
        EntityKind::Payment,
        EntityKind::PaymentMethod,
        EntityKind::Product,
        EntityKind::Provider,
        EntityKind::User,
    ];

    /// Returns the static lifecycle configuration for this kind.
    pub fn spec(self) -> &'static EntitySpec {
        match self {
            EntityKind::Account => &ACCOUNT,
            EntityKind::BarTable => &BAR_TABLE,
            EntityKind::Brand => &BRAND,
            EntityKind::Category => &CATEGORY,
            EntityKind::Employee => &EMPLOYEE,
            EntityKind::Payment => &PAYMENT,
            EntityKind::PaymentMethod => &PAYMENT_METHOD,
            EntityKind::Product => &PRODUCT,
            EntityKind::Provider => &PROVIDER,
            EntityKind::User => &USER,
        }
    }

    /// Upper snake form used in machine-readable error codes
    /// (e.g. `BRAND_EXISTS_INACTIVE`).
    pub fn code(self) -> &'static str {
        match self {
            EntityKind::Account => "ACCOUNT",
            EntityKind::BarTable => "BAR_TABLE",
            EntityKind::Brand => "BRAND",
            EntityKind::Category => "CATEGORY",
            EntityKind::Employee => "EMPLOYEE",
            EntityKind::Payment => "PAYMENT",
            EntityKind::PaymentMethod => "PAYMENT_METHOD",
            EntityKind::Product => "PRODUCT",
            EntityKind::Provider => "PROVIDER",
            EntityKind::User => "USER",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Account => "account",
            EntityKind::BarTable => "bar_table",
            EntityKind::Brand => "brand",
            EntityKind::Category => "category",
            EntityKind::Employee => "employee",
            EntityKind::Payment => "payment",
            EntityKind::PaymentMethod => "payment_method",
            EntityKind::Product => "product",
            EntityKind::Provider => "provider",
            EntityKind::User => "user",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Specs
// =============================================================================

/// Names a related entity type and the foreign-key field on it that points
/// back at the entity being deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DependentSpec {
    /// The dependent entity type (e.g. `PaymentMethod` for `Account`).
    pub kind: EntityKind,
    /// The reference field on the dependent (e.g. `account_id`).
    pub fk_field: &'static str,
}

/// Fixed policy marking records that must never be deactivated.
///
/// This is not a dependency check: it short-circuits before the dependency
/// guard runs and cannot be overridden with a strategy. The only instance
/// today is the administrator user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtectedPolicy {
    /// Field inside the record's `data` object to inspect.
    pub field: &'static str,
    /// Value that marks the record as protected.
    pub value: &'static str,
}

/// Per-kind lifecycle configuration.
///
/// One static instance per [`EntityKind`]; the lifecycle service is generic
/// code driven entirely by this table.
#[derive(Debug, Clone, Copy)]
pub struct EntitySpec {
    pub kind: EntityKind,
    /// Natural-key field name (`name`, `number`, `code`, `username`).
    pub key_field: &'static str,
    /// Whether the key is text (normalized) or numeric (compared by value).
    pub key_shape: KeyShape,
    /// Nullable foreign-reference fields this entity carries.
    pub ref_fields: &'static [&'static str],
    /// Entities that reference this one and block its deactivation.
    pub dependents: &'static [DependentSpec],
    /// Deactivation strategies this entity supports when blocked.
    pub strategies: &'static [Strategy],
    /// Fixed never-deactivate policy, if any.
    pub protected: Option<ProtectedPolicy>,
}

static ACCOUNT: EntitySpec = EntitySpec {
    kind: EntityKind::Account,
    key_field: "name",
    key_shape: KeyShape::Text,
    ref_fields: &[],
    dependents: &[DependentSpec {
        kind: EntityKind::PaymentMethod,
        fk_field: "account_id",
    }],
    // A payment method without an account has nowhere to settle, so
    // clear-link is not offered here.
    strategies: &[Strategy::Cancel, Strategy::CascadeDeactivate],
    protected: None,
};

static BAR_TABLE: EntitySpec = EntitySpec {
    kind: EntityKind::BarTable,
    key_field: "number",
    key_shape: KeyShape::Number,
    ref_fields: &[],
    dependents: &[],
    strategies: &[],
    protected: None,
};

static BRAND: EntitySpec = EntitySpec {
    kind: EntityKind::Brand,
    key_field: "name",
    key_shape: KeyShape::Text,
    ref_fields: &[],
    dependents: &[DependentSpec {
        kind: EntityKind::Product,
        fk_field: "brand_id",
    }],
    strategies: &[Strategy::Cancel, Strategy::CascadeDeactivate, Strategy::ClearLink],
    protected: None,
};

static CATEGORY: EntitySpec = EntitySpec {
    kind: EntityKind::Category,
    key_field: "name",
    key_shape: KeyShape::Text,
    ref_fields: &[],
    dependents: &[DependentSpec {
        kind: EntityKind::Product,
        fk_field: "category_id",
    }],
    strategies: &[Strategy::Cancel, Strategy::CascadeDeactivate, Strategy::ClearLink],
    protected: None,
};

static EMPLOYEE: EntitySpec = EntitySpec {
    kind: EntityKind::Employee,
    key_field: "name",
    key_shape: KeyShape::Text,
    ref_fields: &[],
    dependents: &[],
    strategies: &[],
    protected: None,
};

static PAYMENT: EntitySpec = EntitySpec {
    kind: EntityKind::Payment,
    key_field: "name",
    key_shape: KeyShape::Text,
    ref_fields: &[],
    dependents: &[],
    strategies: &[],
    protected: None,
};

static PAYMENT_METHOD: EntitySpec = EntitySpec {
    kind: EntityKind::PaymentMethod,
    key_field: "name",
    key_shape: KeyShape::Text,
    ref_fields: &["account_id"],
    dependents: &[],
    strategies: &[],
    protected: None,
};

static PRODUCT: EntitySpec = EntitySpec {
    kind: EntityKind::Product,
    key_field: "code",
    key_shape: KeyShape::Number,
    ref_fields: &["brand_id", "category_id", "provider_id"],
    dependents: &[],
    strategies: &[],
    protected: None,
};

static PROVIDER: EntitySpec = EntitySpec {
    kind: EntityKind::Provider,
    key_field: "name",
    key_shape: KeyShape::Text,
    ref_fields: &[],
    dependents: &[DependentSpec {
        kind: EntityKind::Product,
        fk_field: "provider_id",
    }],
    strategies: &[Strategy::Cancel, Strategy::CascadeDeactivate, Strategy::ClearLink],
    protected: None,
};

static USER: EntitySpec = EntitySpec {
    kind: EntityKind::User,
    key_field: "username",
    key_shape: KeyShape::Text,
    ref_fields: &[],
    dependents: &[],
    strategies: &[],
    protected: Some(ProtectedPolicy {
        field: "role",
        value: "admin",
    }),
};

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_spec() {
        for kind in EntityKind::ALL {
            let spec = kind.spec();
            assert_eq!(spec.kind, kind);
            assert!(!spec.key_field.is_empty());
        }
    }

    #[test]
    fn test_account_only_supports_cascade() {
        let spec = EntityKind::Account.spec();
        assert!(spec.strategies.contains(&Strategy::CascadeDeactivate));
        assert!(!spec.strategies.contains(&Strategy::ClearLink));
        assert_eq!(spec.dependents.len(), 1);
        assert_eq!(spec.dependents[0].kind, EntityKind::PaymentMethod);
    }

    #[test]
    fn test_product_parents_support_clear_link() {
        for kind in [EntityKind::Brand, EntityKind::Category, EntityKind::Provider] {
            let spec = kind.spec();
            assert!(spec.strategies.contains(&Strategy::ClearLink), "{kind}");
            assert!(spec.strategies.contains(&Strategy::CascadeDeactivate), "{kind}");
            assert_eq!(spec.dependents[0].kind, EntityKind::Product);
        }
    }

    #[test]
    fn test_numeric_keys() {
        assert_eq!(EntityKind::BarTable.spec().key_shape, KeyShape::Number);
        assert_eq!(EntityKind::Product.spec().key_shape, KeyShape::Number);
        assert_eq!(EntityKind::Brand.spec().key_shape, KeyShape::Text);
    }

    #[test]
    fn test_admin_user_is_protected() {
        let policy = EntityKind::User.spec().protected.expect("user policy");
        assert_eq!(policy.field, "role");
        assert_eq!(policy.value, "admin");
        assert!(EntityKind::Account.spec().protected.is_none());
    }

    #[test]
    fn test_error_code_prefixes() {
        assert_eq!(EntityKind::PaymentMethod.code(), "PAYMENT_METHOD");
        assert_eq!(EntityKind::BarTable.to_string(), "bar_table");
    }
}
