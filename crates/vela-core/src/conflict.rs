//! # Conflict Resolution
//!
//! Uniqueness-with-history: at most one ACTIVE record per normalized key and
//! entity type, while any number of inactive records may share that key
//! (deactivated history is preserved, never merged). Every write that touches
//! a natural key runs through [`resolve`] to decide what the key collision,
//! if any, means for the operation at hand.
//!
//! ## Decision Table
//! ```text
//! ┌──────────────────┬──────────────────┬───────────────────────────────┐
//! │ Key holder found │ Holder state     │ Outcome                       │
//! ├──────────────────┼──────────────────┼───────────────────────────────┤
//! │ none             │ -                │ Clear                         │
//! │ some             │ active           │ ConflictActive { id }         │
//! │ some             │ active, and IS   │ Clear (it is the swap target, │
//! │                  │ the record being │ not a conflict)               │
//! │                  │ swapped out      │                               │
//! │ some             │ inactive         │ create/update:                │
//! │                  │                  │   ConflictInactive { id }     │
//! │                  │                  │ reactivate/swap: Clear        │
//! └──────────────────┴──────────────────┴───────────────────────────────┘
//! ```
//!
//! `ConflictInactive` is deliberately NOT auto-resolved by create/update.
//! Whether a dormant "Nike" and a newly typed "Nike" are the same thing is a
//! business decision a human confirms; the engine reports the dormant id and
//! waits for an explicit `reactivate` / `reactivate-swap` follow-up.

use serde::Serialize;

// =============================================================================
// Inputs
// =============================================================================

/// The operation whose key write is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Reactivate,
    ReactivateSwap,
}

/// Head of the record currently holding a normalized key, as read from the
/// store (any active state, already excluding the record being updated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyHolder {
    pub id: i64,
    pub active: bool,
}

// =============================================================================
// Outcome
// =============================================================================

/// Verdict for a key write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No blocking collision; proceed with the write.
    Clear,
    /// A live record holds the key. Hard conflict, carrying the colliding id.
    ConflictActive { existing_id: i64 },
    /// A dormant record holds the key. Recoverable: the caller is expected
    /// to offer a reactivation path for `existing_id` rather than erroring
    /// silently.
    ConflictInactive { existing_id: i64 },
}

/// Decides what a key collision means for `op`.
///
/// ## Arguments
/// * `op` - The operation performing the key write
/// * `holder` - The record sharing the candidate normalized key, if any.
///   For updates and reactivations the store lookup must already exclude the
///   record operated on (a record never conflicts with itself).
/// * `swap_current` - For `ReactivateSwap`, the id of the active record being
///   swapped out. Finding exactly that record holding the key is the entire
///   point of the swap, not a conflict.
pub fn resolve(op: Operation, holder: Option<KeyHolder>, swap_current: Option<i64>) -> Outcome {
    match holder {
        None => Outcome::Clear,

        Some(h) if h.active => {
            if matches!(op, Operation::ReactivateSwap) && swap_current == Some(h.id) {
                Outcome::Clear
            } else {
                Outcome::ConflictActive { existing_id: h.id }
            }
        }

        // Inactive holder. Blocks nothing for reactivations: multiple
        // inactive records may legitimately share a key.
        Some(h) => match op {
            Operation::Create | Operation::Update => {
                Outcome::ConflictInactive { existing_id: h.id }
            }
            Operation::Reactivate | Operation::ReactivateSwap => Outcome::Clear,
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
