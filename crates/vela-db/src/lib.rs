//! # vela-db: Database Layer for Vela POS
//!
//! This crate provides persistence and orchestration for the Vela POS
//! lifecycle engine. It uses SQLite for local storage with sqlx for async
//! operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Vela POS Data Flow                            │
//! │                                                                     │
//! │  Caller (HTTP handler, desktop shell, seeding CLI)                  │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                    vela-db (THIS CRATE)                       │ │
//! │  │                                                               │ │
//! │  │  ┌─────────────┐  ┌──────────────────┐  ┌─────────────────┐  │ │
//! │  │  │  Database   │  │ LifecycleService │  │   Migrations    │  │ │
//! │  │  │  (pool.rs)  │  │  (service.rs)    │  │   (embedded)    │  │ │
//! │  │  │             │◄─│                  │  │                 │  │ │
//! │  │  │ SqlitePool  │  │ create/update/   │  │ 001_initial_    │  │ │
//! │  │  │ WAL config  │  │ deactivate/      │  │ schema.sql      │  │ │
//! │  │  │             │  │ reactivate(+swap)│  │                 │  │ │
//! │  │  └─────────────┘  └────────┬─────────┘  └─────────────────┘  │ │
//! │  │                           │                                   │ │
//! │  │                  ┌────────▼─────────┐                         │ │
//! │  │                  │  LifecycleStore  │  one generic repo       │ │
//! │  │                  │   (store.rs)     │  driven by the          │ │
//! │  │                  └──────────────────┘  vela-core registry     │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite Database (one table per entity, partial unique indexes)     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`store`] - Generic lifecycle repository
//! - [`service`] - Lifecycle orchestration per entity kind
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vela_core::{Draft, EntityKind, Strategy};
//! use vela_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/vela.db")).await?;
//!
//! let brands = db.lifecycle(EntityKind::Brand);
//! let nike = brands.create(Draft::new("Nike")).await?;
//! brands.deactivate(nike.id, Some(Strategy::ClearLink)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod service;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use service::{LifecycleService, ServiceError, ServiceResult};
pub use store::LifecycleStore;
