//! # Error Types
//!
//! Domain-specific error types for vela-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  vela-core errors (this file)                                       │
//! │  └── LifecycleError   - Conflict / dependency / policy failures     │
//! │                                                                     │
//! │  vela-db errors (separate crate)                                    │
//! │  ├── DbError          - Database operation failures                 │
//! │  └── ServiceError     - LifecycleError | DbError at the service API │
//! │                                                                     │
//! │  Flow: LifecycleError → ServiceError → caller transport (HTTP,     │
//! │  CLI, IPC) which maps codes to status lines and follow-up actions  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Every conflict/dependency error is ACTIONABLE: it carries exactly the
//!    data (existing id, counts, strategy list) the follow-up call needs,
//!    so the caller never re-queries the store to decide what to do next
//! 2. Errors are enum variants, never strings
//! 3. Input validation failures do not appear here: the engine receives
//!    already-validated, typed payloads (upstream concern)

use thiserror::Error;

use crate::entity::EntityKind;
use crate::guard::{DependentCount, Strategy};

// =============================================================================
// Lifecycle Error
// =============================================================================

/// Lifecycle engine errors.
///
/// Each variant maps to a stable machine code (see [`LifecycleError::code`])
/// of the `<ENTITY>_EXISTS_ACTIVE` family that transport layers key their
/// follow-up UI on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    /// A live record already holds the normalized key.
    ///
    /// ## When This Occurs
    /// - `create` with a key an active record uses
    /// - `update` renaming onto a key an active record uses
    /// - `reactivate` while an active duplicate exists (the caller must use
    ///   `reactivate_swap` instead)
    #[error("{kind} {existing_id} already holds this key and is active")]
    ConflictActive { kind: EntityKind, existing_id: i64 },

    /// A dormant record holds the normalized key.
    ///
    /// Recoverable: the caller is expected to offer reactivation of
    /// `existing_id` instead of silently erroring. The engine never folds
    /// the write into the dormant row on its own.
    #[error("{kind} {existing_id} holds this key but is inactive; offer reactivation")]
    ConflictInactive { kind: EntityKind, existing_id: i64 },

    /// Reactivation requested on a record that is already active.
    ///
    /// Treated as a conflict, not a silent success: it usually indicates
    /// the client acted on stale state.
    #[error("{kind} {id} is already active")]
    AlreadyActive { kind: EntityKind, id: i64 },

    /// Deactivation blocked by live dependents and no strategy was given,
    /// or the given strategy is not supported by this entity type.
    ///
    /// Carries the full plan: per-type counts and the valid strategy set.
    #[error("{kind} {id} has live dependents and requires a strategy")]
    DependencyBlocked {
        kind: EntityKind,
        id: i64,
        counts: Vec<DependentCount>,
        strategies: Vec<Strategy>,
    },

    /// Operation forbidden by fixed policy (e.g. the admin user can never
    /// be deactivated). Never retryable with a strategy.
    #[error("{kind} {id} is protected and cannot be deactivated")]
    Protected { kind: EntityKind, id: i64 },

    /// Swap preconditions no longer hold: the inactive side is not
    /// inactive, or the displaced side is not the active holder of the
    /// contested key. Nothing was changed; the caller should re-read and
    /// retry from fresh state.
    #[error("swap of {kind} {inactive_id} for {current_id} no longer matches stored state")]
    SwapMismatch {
        kind: EntityKind,
        inactive_id: i64,
        current_id: i64,
    },

    /// The id does not resolve to any record, active or inactive.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },
}

impl LifecycleError {
    /// Stable machine code for transport layers, e.g. `BRAND_EXISTS_INACTIVE`.
    pub fn code(&self) -> String {
        match self {
            LifecycleError::ConflictActive { kind, .. } => format!("{}_EXISTS_ACTIVE", kind.code()),
            LifecycleError::ConflictInactive { kind, .. } => {
                format!("{}_EXISTS_INACTIVE", kind.code())
            }
            LifecycleError::AlreadyActive { kind, .. } => format!("{}_ALREADY_ACTIVE", kind.code()),
            LifecycleError::DependencyBlocked { kind, .. } => {
                format!("{}_DEPENDENCY_BLOCKED", kind.code())
            }
            LifecycleError::Protected { kind, .. } => format!("{}_PROTECTED", kind.code()),
            LifecycleError::SwapMismatch { kind, .. } => format!("{}_SWAP_STALE", kind.code()),
            LifecycleError::NotFound { kind, .. } => format!("{}_NOT_FOUND", kind.code()),
        }
    }

    /// The colliding or dormant record id, for conflict variants.
    pub fn existing_id(&self) -> Option<i64> {
        match self {
            LifecycleError::ConflictActive { existing_id, .. }
            | LifecycleError::ConflictInactive { existing_id, .. } => Some(*existing_id),
            _ => None,
        }
    }
}

/// Convenience type alias for Results with LifecycleError.
pub type CoreResult<T> = Result<T, LifecycleError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = LifecycleError::ConflictInactive {
            kind: EntityKind::Brand,
            existing_id: 1,
        };
        assert_eq!(err.code(), "BRAND_EXISTS_INACTIVE");
        assert_eq!(err.existing_id(), Some(1));

        let err = LifecycleError::ConflictActive {
            kind: EntityKind::BarTable,
            existing_id: 2,
        };
        assert_eq!(err.code(), "BAR_TABLE_EXISTS_ACTIVE");

        let err = LifecycleError::Protected {
            kind: EntityKind::User,
            id: 1,
        };
        assert_eq!(err.code(), "USER_PROTECTED");
        assert_eq!(err.existing_id(), None);
    }

    #[test]
    fn test_error_messages() {
        let err = LifecycleError::AlreadyActive {
            kind: EntityKind::Category,
            id: 4,
        };
        assert_eq!(err.to_string(), "category 4 is already active");

        let err = LifecycleError::NotFound {
            kind: EntityKind::Provider,
            id: 77,
        };
        assert_eq!(err.to_string(), "provider 77 not found");
    }

    #[test]
    fn test_blocked_payload_is_actionable() {
        let err = LifecycleError::DependencyBlocked {
            kind: EntityKind::Account,
            id: 5,
            counts: vec![DependentCount {
                kind: EntityKind::PaymentMethod,
                fk_field: "account_id",
                count: 1,
            }],
            strategies: vec![Strategy::Cancel, Strategy::CascadeDeactivate],
        };

        // The payload alone is enough to render the follow-up choice
        if let LifecycleError::DependencyBlocked { counts, strategies, .. } = &err {
            assert_eq!(counts[0].count, 1);
            assert!(strategies.contains(&Strategy::CascadeDeactivate));
        } else {
            panic!("wrong variant");
        }
    }
}
