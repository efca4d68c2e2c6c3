//! # vela-core: Pure Lifecycle Logic for Vela POS
//!
//! This crate is the **heart** of the Vela POS back office. Every business
//! entity (accounts, bar tables, brands, categories, employees, payments,
//! payment methods, products, providers, users) shares one lifecycle: it is
//! never hard-deleted, only marked inactive; it enforces uniqueness on a
//! normalized natural key among ACTIVE records; and collisions against
//! inactive history are resolved through explicit reactivate / swap
//! operations with dependent-record strategies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Vela POS Architecture                          │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │              Callers (HTTP handlers, desktop shell)           │ │
//! │  │   validated, typed payloads in - typed results/errors out    │ │
//! │  └───────────────────────────────┬───────────────────────────────┘ │
//! │                                  │                                 │
//! │  ┌───────────────────────────────▼───────────────────────────────┐ │
//! │  │                 vela-db: LifecycleService                     │ │
//! │  │        transactions, SQL, unique-index race mapping           │ │
//! │  └───────────────────────────────┬───────────────────────────────┘ │
//! │                                  │                                 │
//! │  ┌───────────────────────────────▼───────────────────────────────┐ │
//! │  │               ★ vela-core (THIS CRATE) ★                      │ │
//! │  │                                                               │ │
//! │  │   ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌────────┐ ┌───────┐ │ │
//! │  │   │   key   │ │ conflict │ │  guard  │ │ entity │ │ error │ │ │
//! │  │   │normalize│ │ resolve  │ │classify │ │registry│ │ types │ │ │
//! │  │   └─────────┘ └──────────┘ └─────────┘ └────────┘ └───────┘ │ │
//! │  │                                                               │ │
//! │  │   NO I/O • NO DATABASE • PURE DECISIONS OVER PLAIN VALUES    │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`key`] - Natural keys and the normalization pipeline
//! - [`entity`] - Per-kind lifecycle configuration (the registry)
//! - [`conflict`] - Uniqueness-conflict resolution decisions
//! - [`guard`] - Dependent counting classification and strategies
//! - [`types`] - Record and payload shapes
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every decision is deterministic over its inputs;
//!    vela-db feeds store reads in and executes the verdicts
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Configuration over duplication**: one generic lifecycle, ten entity
//!    configurations, instead of ten drifting copies
//! 4. **Explicit Errors**: all errors are typed and carry the data the
//!    follow-up call needs

// =============================================================================
// Module Declarations
// =============================================================================

pub mod conflict;
pub mod entity;
pub mod error;
pub mod guard;
pub mod key;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use vela_core::EntityKind` instead of
// `use vela_core::entity::EntityKind`

pub use conflict::{resolve, KeyHolder, Operation, Outcome};
pub use entity::{DependentSpec, EntityKind, EntitySpec, ProtectedPolicy};
pub use error::{CoreResult, LifecycleError};
pub use guard::{classify, DeactivationPlan, DependentCount, Strategy};
pub use key::{normalize, KeyShape, NaturalKey};
pub use types::{Draft, Patch, Record, RefMap};
