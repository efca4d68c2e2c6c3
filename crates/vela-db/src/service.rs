//! # Lifecycle Service
//!
//! The public surface of the lifecycle engine: one service per entity kind,
//! all running the same generic code driven by the core registry.
//!
//! ## Record Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Record Lifecycle                               │
//! │                                                                     │
//! │          create (Clear)                                             │
//! │   (none) ───────────────────────────────► [ACTIVE]                  │
//! │      │                                       │  ▲                   │
//! │      │ create (ConflictInactive:             │  │ update            │
//! │      │  dormant duplicate reported,          ▼  │                   │
//! │      │  caller offers reactivation)       [ACTIVE]                  │
//! │      ▼                                       │                      │
//! │  dormant sibling                             │ deactivate           │
//! │      ▲                                       │ (Free | strategy)    │
//! │      │                                       ▼                      │
//! │      └──────────────────────────────── [INACTIVE]                   │
//! │               reactivate / reactivate_swap │                        │
//! │                                            ▼                        │
//! │                                        [ACTIVE]  (cycles forever)   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Correctness Model
//! The read-then-decide conflict check is the common-case fast path, not
//! the correctness mechanism. The partial unique index over
//! `(normalized_key) WHERE active = 1` is the real constraint: a writer
//! that loses a race fails at commit time with a `UniqueViolation`, which
//! is mapped back to the same typed conflict the fast path would have
//! produced. Every multi-row write (swap, cascade, clear-link) runs inside
//! a single transaction; a precondition failure aborts with no partial
//! effect.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

use vela_core::conflict::{resolve, Operation, Outcome};
use vela_core::entity::EntityKind;
use vela_core::error::LifecycleError;
use vela_core::guard::{classify, DeactivationPlan, DependentCount, Strategy};
use vela_core::types::{Draft, Patch, Record};

use crate::error::{DbError, DbResult};
use crate::store::LifecycleStore;

// =============================================================================
// Service Error
// =============================================================================

/// Errors surfaced by the lifecycle service.
///
/// Domain outcomes (conflicts, blocked deactivations, policy refusals) stay
/// typed so the caller can present the correct follow-up action. True
/// infrastructure failures pass through as-is; the service adds no retry
/// logic of its own.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl ServiceError {
    /// The domain error, if this is one.
    pub fn lifecycle(&self) -> Option<&LifecycleError> {
        match self {
            ServiceError::Lifecycle(err) => Some(err),
            ServiceError::Db(_) => None,
        }
    }
}

/// Result type for lifecycle service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Lifecycle Service
// =============================================================================

/// Lifecycle operations for one entity kind.
///
/// Request-scoped and stateless between calls: every operation takes
/// exactly its inputs and the pool, nothing ambient.
#[derive(Debug, Clone)]
pub struct LifecycleService {
    pool: SqlitePool,
    kind: EntityKind,
    store: LifecycleStore,
}

impl LifecycleService {
    /// Creates a service for the given entity kind.
    pub fn new(pool: SqlitePool, kind: EntityKind) -> Self {
        LifecycleService {
            pool,
            kind,
            store: LifecycleStore::new(kind),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetches a record by id, regardless of active state.
    pub async fn get(&self, id: i64) -> ServiceResult<Record> {
        self.store
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound { kind: self.kind, id }.into())
    }

    /// Lists records ordered by natural key.
    pub async fn list(&self, active_only: bool) -> ServiceResult<Vec<Record>> {
        Ok(self.store.list(&self.pool, active_only).await?)
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates a new record with `active = true`.
    ///
    /// ## Conflict Behavior
    /// - An active record holding the key fails with `ConflictActive`
    /// - A dormant record holding the key fails with `ConflictInactive`;
    ///   the caller is expected to offer reactivation of the carried id
    ///   rather than silently erroring. The engine never folds the new
    ///   data onto the dormant row on its own.
    pub async fn create(&self, draft: Draft) -> ServiceResult<Record> {
        let normalized_key = draft.key.normalized();
        debug!(kind = %self.kind, key = %normalized_key, "create");

        let holder = self
            .store
            .find_key_holder(&self.pool, &normalized_key, None)
            .await?;
        self.check(resolve(Operation::Create, holder, None))?;

        let id = match self.store.insert(&self.pool, &draft, &normalized_key).await {
            Ok(id) => id,
            Err(err) if err.is_unique_violation() => {
                return Err(self.lost_race(&normalized_key, None).await);
            }
            Err(err) => return Err(err.into()),
        };

        self.get(id).await
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Updates a record.
    ///
    /// A patch that touches the natural key re-runs the conflict check
    /// excluding `id`; non-key patches skip straight to the write and can
    /// never produce a conflict.
    pub async fn update(&self, id: i64, patch: Patch) -> ServiceResult<Record> {
        let current = self.get(id).await?;
        if patch.is_empty() {
            return Ok(current);
        }

        if let Some(key) = &patch.key {
            let normalized_key = key.normalized();
            debug!(kind = %self.kind, id, key = %normalized_key, "update touches natural key");

            let holder = self
                .store
                .find_key_holder(&self.pool, &normalized_key, Some(id))
                .await?;
            self.check(resolve(Operation::Update, holder, None))?;
        }

        match self.store.update_fields(&self.pool, id, &patch).await {
            Ok(()) => {}
            Err(err) if err.is_unique_violation() => {
                // Only a key write can trip the index, so `key` is present.
                let normalized_key = patch
                    .key
                    .as_ref()
                    .map(|k| k.normalized())
                    .unwrap_or_default();
                return Err(self.lost_race(&normalized_key, Some(id)).await);
            }
            Err(err) => return Err(err.into()),
        }

        self.get(id).await
    }

    // =========================================================================
    // Deactivate
    // =========================================================================

    /// Deactivates a record, resolving live dependents via an explicit
    /// strategy.
    ///
    /// ## Behavior
    /// - Already-inactive records are a no-op success, not an error
    ///   (retrying a timed-out deactivation must be safe)
    /// - Protected records (admin user) refuse before any dependent check
    /// - With live dependents and no strategy, fails with the full plan so
    ///   the caller can present the choice without re-querying
    /// - `Cancel` aborts with no change; cascade and clear-link run with
    ///   the target's own flip in one transaction
    pub async fn deactivate(&self, id: i64, strategy: Option<Strategy>) -> ServiceResult<Record> {
        let record = self.get(id).await?;
        if !record.active {
            debug!(kind = %self.kind, id, "deactivate on inactive record is a no-op");
            return Ok(record);
        }

        self.ensure_not_protected(&record)?;

        let counts = self.tally_dependents(id).await?;
        let spec = self.kind.spec();

        match classify(counts, spec.strategies) {
            DeactivationPlan::Free => {
                self.store.set_active(&self.pool, id, false).await?;
                self.get(id).await
            }

            DeactivationPlan::Blocked { counts, strategies } => {
                let chosen = match strategy {
                    Some(s) if strategies.contains(&s) => s,
                    // No strategy, or one this entity type does not support:
                    // hand back the plan. The guard never picks a default.
                    _ => {
                        return Err(LifecycleError::DependencyBlocked {
                            kind: self.kind,
                            id,
                            counts,
                            strategies,
                        }
                        .into());
                    }
                };

                match chosen {
                    Strategy::Cancel => {
                        debug!(kind = %self.kind, id, "deactivation cancelled by operator");
                        Ok(record)
                    }
                    Strategy::CascadeDeactivate | Strategy::ClearLink => {
                        self.deactivate_with_strategy(id, chosen).await
                    }
                }
            }
        }
    }

    /// Executes a cascade or clear-link deactivation as one transaction.
    async fn deactivate_with_strategy(&self, id: i64, strategy: Strategy) -> ServiceResult<Record> {
        debug!(kind = %self.kind, id, %strategy, "deactivating with strategy");

        let spec = self.kind.spec();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        for dep in spec.dependents {
            match strategy {
                Strategy::CascadeDeactivate => {
                    self.store.deactivate_dependents(&mut *tx, dep, id).await?;
                }
                Strategy::ClearLink => {
                    self.store.clear_links(&mut *tx, dep, id).await?;
                }
                Strategy::Cancel => {}
            }
        }
        self.store.set_active(&mut *tx, id, false).await?;

        tx.commit().await.map_err(DbError::from)?;
        self.get(id).await
    }

    // =========================================================================
    // Reactivate
    // =========================================================================

    /// Reactivates an inactive record under its current natural key.
    ///
    /// Refuses with `AlreadyActive` if the record is active (stale client
    /// state) and with `ConflictActive` if a live record now holds the key;
    /// the latter is the cue to use [`LifecycleService::reactivate_swap`].
    pub async fn reactivate(&self, id: i64) -> ServiceResult<Record> {
        let record = self.get(id).await?;
        if record.active {
            return Err(LifecycleError::AlreadyActive { kind: self.kind, id }.into());
        }

        debug!(kind = %self.kind, id, key = %record.normalized_key, "reactivate");

        let holder = self
            .store
            .find_key_holder(&self.pool, &record.normalized_key, Some(id))
            .await?;
        self.check(resolve(Operation::Reactivate, holder, None))?;

        match self.store.set_active(&self.pool, id, true).await {
            Ok(()) => {}
            Err(err) if err.is_unique_violation() => {
                return Err(self.lost_race(&record.normalized_key, Some(id)).await);
            }
            Err(err) => return Err(err.into()),
        }

        self.get(id).await
    }

    /// Atomically reactivates `inactive_id` while deactivating
    /// `current_id`, the active record holding the same key.
    ///
    /// ## Preconditions (verified inside the transaction)
    /// - `inactive_id` exists and is inactive (`AlreadyActive` otherwise)
    /// - `current_id` exists, is active, and holds the contested key
    ///   (`SwapMismatch` otherwise)
    ///
    /// The record being displaced may itself have live dependents, so the
    /// swap runs the same protection check and strategy negotiation as a
    /// plain deactivation of `current_id`. Any failure aborts the whole
    /// operation with no partial effect.
    pub async fn reactivate_swap(
        &self,
        inactive_id: i64,
        current_id: i64,
        strategy: Option<Strategy>,
    ) -> ServiceResult<Record> {
        debug!(kind = %self.kind, inactive_id, current_id, "reactivate swap");

        let spec = self.kind.spec();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let target = self
            .store
            .find_by_id(&mut *tx, inactive_id)
            .await?
            .ok_or(LifecycleError::NotFound {
                kind: self.kind,
                id: inactive_id,
            })?;
        if target.active {
            return Err(LifecycleError::AlreadyActive {
                kind: self.kind,
                id: inactive_id,
            }
            .into());
        }

        let current = self
            .store
            .find_by_id(&mut *tx, current_id)
            .await?
            .ok_or(LifecycleError::NotFound {
                kind: self.kind,
                id: current_id,
            })?;
        // The displaced record must be the live holder of the contested
        // key. Uniqueness-with-history guarantees it is then the only one.
        if !current.active || current.normalized_key != target.normalized_key {
            return Err(LifecycleError::SwapMismatch {
                kind: self.kind,
                inactive_id,
                current_id,
            }
            .into());
        }

        // Displacing `current` is a deactivation like any other.
        self.ensure_not_protected(&current)?;

        let mut counts = Vec::new();
        for dep in spec.dependents {
            let count = self
                .store
                .count_active_dependents(&mut *tx, dep, current_id)
                .await?;
            counts.push(DependentCount {
                kind: dep.kind,
                fk_field: dep.fk_field,
                count,
            });
        }

        match classify(counts, spec.strategies) {
            DeactivationPlan::Free => {}
            DeactivationPlan::Blocked { counts, strategies } => {
                let chosen = match strategy {
                    Some(s) if strategies.contains(&s) => s,
                    _ => {
                        return Err(LifecycleError::DependencyBlocked {
                            kind: self.kind,
                            id: current_id,
                            counts,
                            strategies,
                        }
                        .into());
                    }
                };

                match chosen {
                    Strategy::Cancel => {
                        debug!(kind = %self.kind, inactive_id, current_id, "swap cancelled");
                        return Ok(target);
                    }
                    Strategy::CascadeDeactivate => {
                        for dep in spec.dependents {
                            self.store
                                .deactivate_dependents(&mut *tx, dep, current_id)
                                .await?;
                        }
                    }
                    Strategy::ClearLink => {
                        for dep in spec.dependents {
                            self.store.clear_links(&mut *tx, dep, current_id).await?;
                        }
                    }
                }
            }
        }

        // Order matters against the partial unique index: free the key
        // before taking it.
        self.store.set_active(&mut *tx, current_id, false).await?;
        match self.store.set_active(&mut *tx, inactive_id, true).await {
            Ok(()) => {}
            Err(err) if err.is_unique_violation() => {
                tx.rollback().await.map_err(DbError::from)?;
                return Err(self.lost_race(&target.normalized_key, Some(inactive_id)).await);
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit().await.map_err(DbError::from)?;
        self.get(inactive_id).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Maps a resolver verdict to a service result.
    fn check(&self, outcome: Outcome) -> ServiceResult<()> {
        match outcome {
            Outcome::Clear => Ok(()),
            Outcome::ConflictActive { existing_id } => Err(LifecycleError::ConflictActive {
                kind: self.kind,
                existing_id,
            }
            .into()),
            Outcome::ConflictInactive { existing_id } => Err(LifecycleError::ConflictInactive {
                kind: self.kind,
                existing_id,
            }
            .into()),
        }
    }

    /// Maps a commit-time unique-index violation back to a typed conflict
    /// by re-reading the key holder: this writer lost a race, and the fast
    /// path would have reported the same conflict a moment later.
    async fn lost_race(&self, normalized_key: &str, exclude_id: Option<i64>) -> ServiceError {
        debug!(kind = %self.kind, key = %normalized_key, "lost uniqueness race, re-reading holder");

        match self
            .store
            .find_key_holder(&self.pool, normalized_key, exclude_id)
            .await
        {
            Ok(Some(holder)) if holder.active => LifecycleError::ConflictActive {
                kind: self.kind,
                existing_id: holder.id,
            }
            .into(),
            Ok(Some(holder)) => LifecycleError::ConflictInactive {
                kind: self.kind,
                existing_id: holder.id,
            }
            .into(),
            // The winner vanished again between commit and re-read; surface
            // as a retryable infrastructure failure.
            Ok(None) => {
                DbError::Internal("unique violation with no visible key holder".to_string()).into()
            }
            Err(err) => err.into(),
        }
    }

    fn ensure_not_protected(&self, record: &Record) -> Result<(), LifecycleError> {
        if let Some(policy) = &self.kind.spec().protected {
            if record.is_protected_by(policy) {
                return Err(LifecycleError::Protected {
                    kind: self.kind,
                    id: record.id,
                });
            }
        }
        Ok(())
    }

    async fn tally_dependents(&self, id: i64) -> DbResult<Vec<DependentCount>> {
        let mut counts = Vec::new();
        for dep in self.kind.spec().dependents {
            let count = self
                .store
                .count_active_dependents(&self.pool, dep, id)
                .await?;
            counts.push(DependentCount {
                kind: dep.kind,
                fk_field: dep.fk_field,
                count,
            });
        }
        Ok(counts)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use serde_json::json;
    use std::collections::HashMap;
    use vela_core::key::NaturalKey;

    async fn db() -> Database {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn domain(err: ServiceError) -> LifecycleError {
        match err {
            ServiceError::Lifecycle(err) => err,
            ServiceError::Db(err) => panic!("expected domain error, got: {err}"),
        }
    }

    // -------------------------------------------------------------------------
    // Create
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_assigns_id_and_starts_active() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);

        let nike = brands
            .create(Draft::new("Nike").with_data(json!({"country": "US"})))
            .await
            .unwrap();

        assert!(nike.id > 0);
        assert!(nike.active);
        assert_eq!(nike.normalized_key, "nike");
        assert_eq!(nike.data["country"], "US");
    }

    #[tokio::test]
    async fn test_create_conflicts_with_active_duplicate() {
        let db = db().await;
        let tables = db.lifecycle(EntityKind::BarTable);

        let first = tables.create(Draft::new(3)).await.unwrap();
        let err = domain(tables.create(Draft::new(3)).await.unwrap_err());

        assert_eq!(
            err,
            LifecycleError::ConflictActive {
                kind: EntityKind::BarTable,
                existing_id: first.id,
            }
        );
        assert_eq!(err.code(), "BAR_TABLE_EXISTS_ACTIVE");
    }

    #[tokio::test]
    async fn test_create_reports_dormant_duplicate_instead_of_second_row() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);

        let nike = brands.create(Draft::new("Nike")).await.unwrap();
        brands.deactivate(nike.id, None).await.unwrap();

        let err = domain(brands.create(Draft::new("Nike")).await.unwrap_err());
        assert_eq!(
            err,
            LifecycleError::ConflictInactive {
                kind: EntityKind::Brand,
                existing_id: nike.id,
            }
        );
        assert_eq!(err.existing_id(), Some(nike.id));

        // Reported, not folded and not duplicated
        let store = db.store(EntityKind::Brand);
        assert_eq!(store.count_rows(db.pool()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_normalization_collides_key_variants() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);

        let cafe = brands.create(Draft::new("Café Río")).await.unwrap();
        let err = domain(brands.create(Draft::new("  cafe   RIO ")).await.unwrap_err());

        assert_eq!(
            err,
            LifecycleError::ConflictActive {
                kind: EntityKind::Brand,
                existing_id: cafe.id,
            }
        );
    }

    #[tokio::test]
    async fn test_same_key_in_different_kinds_does_not_collide() {
        let db = db().await;

        db.lifecycle(EntityKind::Brand)
            .create(Draft::new("Estrella"))
            .await
            .unwrap();
        db.lifecycle(EntityKind::Category)
            .create(Draft::new("Estrella"))
            .await
            .unwrap();
    }

    // -------------------------------------------------------------------------
    // Update
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_update_without_key_never_conflicts() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);

        let nike = brands.create(Draft::new("Nike")).await.unwrap();

        let updated = brands
            .update(nike.id, Patch::new().with_data(json!({"country": "US"})))
            .await
            .unwrap();
        assert_eq!(updated.data["country"], "US");
        assert_eq!(updated.normalized_key, "nike");

        // Writing the record's own key back is not a self-conflict
        let same = brands
            .update(nike.id, Patch::new().with_key("NIKE"))
            .await
            .unwrap();
        assert_eq!(same.normalized_key, "nike");
        assert_eq!(same.key, NaturalKey::Text("NIKE".to_string()));
    }

    #[tokio::test]
    async fn test_update_key_reports_both_conflict_shapes() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);

        let nike = brands.create(Draft::new("Nike")).await.unwrap();
        let bud = brands.create(Draft::new("Bud")).await.unwrap();

        let err = domain(
            brands
                .update(bud.id, Patch::new().with_key("nike"))
                .await
                .unwrap_err(),
        );
        assert_eq!(
            err,
            LifecycleError::ConflictActive {
                kind: EntityKind::Brand,
                existing_id: nike.id,
            }
        );

        // Against dormant history the rename is recoverable, never folded
        brands.deactivate(nike.id, None).await.unwrap();
        let err = domain(
            brands
                .update(bud.id, Patch::new().with_key("nike"))
                .await
                .unwrap_err(),
        );
        assert_eq!(
            err,
            LifecycleError::ConflictInactive {
                kind: EntityKind::Brand,
                existing_id: nike.id,
            }
        );
        assert_eq!(
            brands.get(bud.id).await.unwrap().normalized_key,
            "bud",
            "failed rename must leave the record untouched"
        );
    }

    // -------------------------------------------------------------------------
    // Deactivate
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_deactivate_free_and_idempotent() {
        let db = db().await;
        let employees = db.lifecycle(EntityKind::Employee);

        let ana = employees.create(Draft::new("Ana")).await.unwrap();

        let first = employees.deactivate(ana.id, None).await.unwrap();
        assert!(!first.active);

        // Retrying is a no-op success, not an error
        let second = employees.deactivate(ana.id, None).await.unwrap();
        assert!(!second.active);
        assert_eq!(second.updated_at, first.updated_at);

        let store = db.store(EntityKind::Employee);
        assert_eq!(store.count_rows(db.pool()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deactivate_unknown_id_is_not_found() {
        let db = db().await;
        let err = domain(db.lifecycle(EntityKind::Brand).deactivate(99, None).await.unwrap_err());
        assert_eq!(
            err,
            LifecycleError::NotFound {
                kind: EntityKind::Brand,
                id: 99,
            }
        );
    }

    #[tokio::test]
    async fn test_account_blocked_then_cascaded() {
        let db = db().await;
        let accounts = db.lifecycle(EntityKind::Account);
        let methods = db.lifecycle(EntityKind::PaymentMethod);

        let caja = accounts.create(Draft::new("Caja 1")).await.unwrap();
        let visa = methods
            .create(Draft::new("Visa").with_ref("account_id", Some(caja.id)))
            .await
            .unwrap();

        // Without a strategy the full plan comes back as the error payload
        let err = domain(accounts.deactivate(caja.id, None).await.unwrap_err());
        match err {
            LifecycleError::DependencyBlocked { id, counts, strategies, .. } => {
                assert_eq!(id, caja.id);
                assert_eq!(counts.len(), 1);
                assert_eq!(counts[0].kind, EntityKind::PaymentMethod);
                assert_eq!(counts[0].count, 1);
                assert!(strategies.contains(&Strategy::CascadeDeactivate));
                assert!(!strategies.contains(&Strategy::ClearLink));
            }
            other => panic!("expected DependencyBlocked, got: {other}"),
        }

        // Cascade takes the dependents down with the account, atomically
        let caja = accounts
            .deactivate(caja.id, Some(Strategy::CascadeDeactivate))
            .await
            .unwrap();
        assert!(!caja.active);
        assert!(!methods.get(visa.id).await.unwrap().active);
    }

    #[tokio::test]
    async fn test_clear_link_keeps_products_alive() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);
        let products = db.lifecycle(EntityKind::Product);

        let nike = brands.create(Draft::new("Nike")).await.unwrap();
        let shoe = products
            .create(Draft::new(101).with_ref("brand_id", Some(nike.id)))
            .await
            .unwrap();
        let cap = products
            .create(Draft::new(102).with_ref("brand_id", Some(nike.id)))
            .await
            .unwrap();

        let nike = brands
            .deactivate(nike.id, Some(Strategy::ClearLink))
            .await
            .unwrap();
        assert!(!nike.active);

        for id in [shoe.id, cap.id] {
            let product = products.get(id).await.unwrap();
            assert!(product.active, "clear-link must not deactivate dependents");
            assert_eq!(product.refs.get("brand_id"), Some(&None));
        }
    }

    #[tokio::test]
    async fn test_unsupported_strategy_is_rejected_with_plan() {
        let db = db().await;
        let accounts = db.lifecycle(EntityKind::Account);
        let methods = db.lifecycle(EntityKind::PaymentMethod);

        let caja = accounts.create(Draft::new("Caja 1")).await.unwrap();
        methods
            .create(Draft::new("Visa").with_ref("account_id", Some(caja.id)))
            .await
            .unwrap();

        // Accounts do not offer clear-link; the error re-lists what is valid
        let err = domain(
            accounts
                .deactivate(caja.id, Some(Strategy::ClearLink))
                .await
                .unwrap_err(),
        );
        match err {
            LifecycleError::DependencyBlocked { strategies, .. } => {
                assert!(!strategies.contains(&Strategy::ClearLink));
            }
            other => panic!("expected DependencyBlocked, got: {other}"),
        }
        assert!(accounts.get(caja.id).await.unwrap().active);
    }

    #[tokio::test]
    async fn test_cancel_leaves_everything_unchanged() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);
        let products = db.lifecycle(EntityKind::Product);

        let nike = brands.create(Draft::new("Nike")).await.unwrap();
        let shoe = products
            .create(Draft::new(101).with_ref("brand_id", Some(nike.id)))
            .await
            .unwrap();

        let unchanged = brands
            .deactivate(nike.id, Some(Strategy::Cancel))
            .await
            .unwrap();
        assert!(unchanged.active);

        let shoe = products.get(shoe.id).await.unwrap();
        assert!(shoe.active);
        assert_eq!(shoe.refs.get("brand_id"), Some(&Some(nike.id)));
    }

    #[tokio::test]
    async fn test_admin_user_is_protected() {
        let db = db().await;
        let users = db.lifecycle(EntityKind::User);

        let root = users
            .create(Draft::new("root").with_data(json!({"role": "admin"})))
            .await
            .unwrap();
        let waiter = users
            .create(Draft::new("ana").with_data(json!({"role": "waiter"})))
            .await
            .unwrap();

        let err = domain(users.deactivate(root.id, None).await.unwrap_err());
        assert_eq!(
            err,
            LifecycleError::Protected {
                kind: EntityKind::User,
                id: root.id,
            }
        );
        assert!(users.get(root.id).await.unwrap().active);

        // Ordinary users deactivate normally
        assert!(!users.deactivate(waiter.id, None).await.unwrap().active);
    }

    // -------------------------------------------------------------------------
    // Reactivate / Swap
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_reactivate_round_trip_preserves_record() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);

        let nike = brands
            .create(Draft::new("Nike").with_data(json!({"country": "US"})))
            .await
            .unwrap();
        brands.deactivate(nike.id, None).await.unwrap();

        let back = brands.reactivate(nike.id).await.unwrap();
        assert_eq!(back.id, nike.id);
        assert!(back.active);
        assert_eq!(back.key, nike.key);
        assert_eq!(back.normalized_key, nike.normalized_key);
        assert_eq!(back.data, nike.data);
        assert_eq!(back.created_at, nike.created_at);
    }

    #[tokio::test]
    async fn test_reactivate_active_record_is_a_conflict() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);

        let nike = brands.create(Draft::new("Nike")).await.unwrap();
        let err = domain(brands.reactivate(nike.id).await.unwrap_err());
        assert_eq!(
            err,
            LifecycleError::AlreadyActive {
                kind: EntityKind::Brand,
                id: nike.id,
            }
        );
    }

    /// Seeds the swap precondition directly through the store: a dormant
    /// row and a live row sharing one key. The service never creates this
    /// state itself, but concurrent writers and imported legacy data do,
    /// and the swap protocol exists exactly for it.
    async fn seed_key_pair(db: &Database) -> (i64, i64) {
        let store = db.store(EntityKind::Brand);
        let dormant = store
            .insert(db.pool(), &Draft::new("Nike"), "nike")
            .await
            .unwrap();
        store.set_active(db.pool(), dormant, false).await.unwrap();
        let live = store
            .insert(db.pool(), &Draft::new("Nike"), "nike")
            .await
            .unwrap();
        (dormant, live)
    }

    #[tokio::test]
    async fn test_reactivate_refused_when_key_is_held_then_swap() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);
        let (dormant, live) = seed_key_pair(&db).await;

        // Plain reactivation refuses and names the holder to swap against
        let err = domain(brands.reactivate(dormant).await.unwrap_err());
        assert_eq!(
            err,
            LifecycleError::ConflictActive {
                kind: EntityKind::Brand,
                existing_id: live,
            }
        );

        // The swap flips both rows and creates nothing
        let back = brands.reactivate_swap(dormant, live, None).await.unwrap();
        assert_eq!(back.id, dormant);
        assert!(back.active);
        assert!(!brands.get(live).await.unwrap().active);

        let store = db.store(EntityKind::Brand);
        assert_eq!(store.count_rows(db.pool()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_swap_aborts_cleanly_on_stale_preconditions() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);

        let bud = brands.create(Draft::new("Bud")).await.unwrap();
        let nike = brands.create(Draft::new("Nike")).await.unwrap();
        brands.deactivate(nike.id, None).await.unwrap();

        // Bud does not hold Nike's key: nothing may change
        let err = domain(
            brands
                .reactivate_swap(nike.id, bud.id, None)
                .await
                .unwrap_err(),
        );
        assert_eq!(
            err,
            LifecycleError::SwapMismatch {
                kind: EntityKind::Brand,
                inactive_id: nike.id,
                current_id: bud.id,
            }
        );
        assert!(!brands.get(nike.id).await.unwrap().active);
        assert!(brands.get(bud.id).await.unwrap().active);
    }

    #[tokio::test]
    async fn test_swap_negotiates_dependents_of_displaced_record() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);
        let products = db.lifecycle(EntityKind::Product);
        let (dormant, live) = seed_key_pair(&db).await;

        let shoe = products
            .create(Draft::new(101).with_ref("brand_id", Some(live)))
            .await
            .unwrap();

        // The displaced record has a live product: same negotiation as a
        // plain deactivation, and the aborted swap changes nothing
        let err = domain(
            brands
                .reactivate_swap(dormant, live, None)
                .await
                .unwrap_err(),
        );
        match err {
            LifecycleError::DependencyBlocked { id, counts, .. } => {
                assert_eq!(id, live);
                assert_eq!(counts[0].count, 1);
            }
            other => panic!("expected DependencyBlocked, got: {other}"),
        }
        assert!(!brands.get(dormant).await.unwrap().active);
        assert!(brands.get(live).await.unwrap().active);

        let back = brands
            .reactivate_swap(dormant, live, Some(Strategy::ClearLink))
            .await
            .unwrap();
        assert!(back.active);
        assert!(!brands.get(live).await.unwrap().active);

        let shoe = products.get(shoe.id).await.unwrap();
        assert!(shoe.active);
        assert_eq!(shoe.refs.get("brand_id"), Some(&None));
    }

    // -------------------------------------------------------------------------
    // Invariants
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_at_most_one_active_record_per_key() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);
        let (dormant, live) = seed_key_pair(&db).await;

        brands.create(Draft::new("Bud")).await.unwrap();
        brands.reactivate_swap(dormant, live, None).await.unwrap();
        let _ = brands.create(Draft::new("nike")).await;
        let _ = brands.reactivate(live).await;

        let mut active_per_key: HashMap<String, usize> = HashMap::new();
        for record in brands.list(true).await.unwrap() {
            *active_per_key.entry(record.normalized_key).or_default() += 1;
        }
        for (key, count) in active_per_key {
            assert!(count <= 1, "key {key} held by {count} active records");
        }
    }

    #[tokio::test]
    async fn test_row_count_never_decreases() {
        let db = db().await;
        let brands = db.lifecycle(EntityKind::Brand);
        let store = db.store(EntityKind::Brand);

        fn check(count: i64, high_water: &mut i64) {
            assert!(count >= *high_water, "rows disappeared: {count} < {high_water}");
            *high_water = count;
        }
        let mut high_water = 0i64;

        let nike = brands.create(Draft::new("Nike")).await.unwrap();
        check(store.count_rows(db.pool()).await.unwrap(), &mut high_water);

        brands.deactivate(nike.id, None).await.unwrap();
        check(store.count_rows(db.pool()).await.unwrap(), &mut high_water);

        let _ = brands.create(Draft::new("Nike")).await;
        check(store.count_rows(db.pool()).await.unwrap(), &mut high_water);

        brands.reactivate(nike.id).await.unwrap();
        brands.deactivate(nike.id, None).await.unwrap();
        check(store.count_rows(db.pool()).await.unwrap(), &mut high_water);
        assert_eq!(high_water, 1);
    }
}
