//! # Lifecycle Store
//!
//! The generic repository behind every lifecycle-managed entity. The parent
//! application re-implemented this access layer once per entity with
//! copy-paste drift; here a single implementation is driven by the
//! [`EntitySpec`] registry, and only the table/column names differ per kind.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  LifecycleService (service.rs)                                      │
//! │       │                                                             │
//! │       │  store.find_key_holder(&mut *tx, "nike", None)              │
//! │       ▼                                                             │
//! │  LifecycleStore (THIS MODULE)                                       │
//! │  ├── find_by_id / find_key_holder / list                            │
//! │  ├── insert / update_fields / set_active                            │
//! │  └── count_active_dependents / deactivate_dependents / clear_links  │
//! │       │                                                             │
//! │       ▼  SQL against the kind's table (brands, products, ...)       │
//! │  SQLite                                                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every method takes an executor, so the service can run the same calls
//! against the pool or inside a transaction. Table and column names come
//! from the static registry, never from input, so the `format!` SQL
//! assembly stays injection-free.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use tracing::debug;

use vela_core::entity::{DependentSpec, EntityKind, EntitySpec};
use vela_core::key::{KeyShape, NaturalKey};
use vela_core::types::{Draft, Patch, Record, RefMap};
use vela_core::KeyHolder;

use crate::error::{DbError, DbResult};

// =============================================================================
// Table Registry
// =============================================================================

/// Table name for an entity kind. Column names (key field, reference
/// fields) are shared with the core registry; only the table name is a
/// storage concern.
pub(crate) fn table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Account => "accounts",
        EntityKind::BarTable => "bar_tables",
        EntityKind::Brand => "brands",
        EntityKind::Category => "categories",
        EntityKind::Employee => "employees",
        EntityKind::Payment => "payments",
        EntityKind::PaymentMethod => "payment_methods",
        EntityKind::Product => "products",
        EntityKind::Provider => "providers",
        EntityKind::User => "users",
    }
}

// =============================================================================
// Store
// =============================================================================

/// Generic data access for one entity kind.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleStore {
    kind: EntityKind,
}

impl LifecycleStore {
    /// Creates a store for the given entity kind.
    pub fn new(kind: EntityKind) -> Self {
        LifecycleStore { kind }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    fn spec(&self) -> &'static EntitySpec {
        self.kind.spec()
    }

    fn table(&self) -> &'static str {
        table(self.kind)
    }

    /// Column list for SELECTs, in decode order.
    fn select_list(&self) -> String {
        let spec = self.spec();
        let mut cols: Vec<&str> = vec!["id", spec.key_field, "normalized_key", "active"];
        cols.extend_from_slice(spec.ref_fields);
        cols.extend_from_slice(&["data", "created_at", "updated_at"]);
        cols.join(", ")
    }

    fn decode_row(&self, row: &SqliteRow) -> DbResult<Record> {
        let spec = self.spec();

        let key = match spec.key_shape {
            KeyShape::Number => NaturalKey::Number(row.try_get(spec.key_field)?),
            KeyShape::Text => NaturalKey::Text(row.try_get(spec.key_field)?),
        };

        let mut refs = RefMap::new();
        for field in spec.ref_fields {
            refs.insert((*field).to_string(), row.try_get::<Option<i64>, _>(*field)?);
        }

        let raw: String = row.try_get("data")?;
        let data = serde_json::from_str(&raw).map_err(|e| DbError::CorruptRow {
            entity: self.kind.to_string(),
            message: e.to_string(),
        })?;

        Ok(Record {
            id: row.try_get("id")?,
            kind: self.kind,
            key,
            normalized_key: row.try_get("normalized_key")?,
            active: row.try_get("active")?,
            refs,
            data,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetches a record by id, regardless of active state.
    pub async fn find_by_id<'e, E>(&self, ex: E, id: i64) -> DbResult<Option<Record>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            self.select_list(),
            self.table()
        );

        let row = sqlx::query(&sql).bind(id).fetch_optional(ex).await?;
        row.map(|r| self.decode_row(&r)).transpose()
    }

    /// Finds the record holding a normalized key, regardless of active
    /// state, optionally excluding one id (a record must not conflict with
    /// itself).
    ///
    /// Several inactive rows may share a key; an active holder, when one
    /// exists, always wins the lookup so conflicts report the live record.
    pub async fn find_key_holder<'e, E>(
        &self,
        ex: E,
        normalized_key: &str,
        exclude_id: Option<i64>,
    ) -> DbResult<Option<KeyHolder>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = match exclude_id {
            Some(_) => format!(
                "SELECT id, active FROM {} WHERE normalized_key = ? AND id <> ? \
                 ORDER BY active DESC LIMIT 1",
                self.table()
            ),
            None => format!(
                "SELECT id, active FROM {} WHERE normalized_key = ? \
                 ORDER BY active DESC LIMIT 1",
                self.table()
            ),
        };

        let mut query = sqlx::query(&sql).bind(normalized_key.to_string());
        if let Some(id) = exclude_id {
            query = query.bind(id);
        }

        let row = query.fetch_optional(ex).await?;
        row.map(|r| {
            Ok(KeyHolder {
                id: r.try_get("id")?,
                active: r.try_get("active")?,
            })
        })
        .transpose()
    }

    /// Lists records, optionally restricted to active ones, ordered by
    /// natural key.
    pub async fn list<'e, E>(&self, ex: E, active_only: bool) -> DbResult<Vec<Record>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let filter = if active_only { "WHERE active = 1" } else { "" };
        let sql = format!(
            "SELECT {} FROM {} {} ORDER BY {}",
            self.select_list(),
            self.table(),
            filter,
            self.spec().key_field
        );

        let rows = sqlx::query(&sql).fetch_all(ex).await?;
        rows.iter().map(|r| self.decode_row(r)).collect()
    }

    /// Counts all rows for this kind, active or not. Used by diagnostics
    /// and by the no-hard-delete tests.
    pub async fn count_rows<'e, E>(&self, ex: E) -> DbResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table());
        Ok(sqlx::query_scalar(&sql).fetch_one(ex).await?)
    }

    /// Counts ACTIVE rows of the dependent kind whose reference field
    /// points at `id`. Inactive dependents never block a deactivation.
    pub async fn count_active_dependents<'e, E>(
        &self,
        ex: E,
        dep: &DependentSpec,
        id: i64,
    ) -> DbResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ? AND active = 1",
            table(dep.kind),
            dep.fk_field
        );
        Ok(sqlx::query_scalar(&sql).bind(id).fetch_one(ex).await?)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a new active row and returns its store-assigned id.
    pub async fn insert<'e, E>(&self, ex: E, draft: &Draft, normalized_key: &str) -> DbResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let spec = self.spec();
        debug!(kind = %self.kind, key = %normalized_key, "inserting record");

        let mut cols: Vec<&str> = vec![spec.key_field, "normalized_key", "active"];
        cols.extend_from_slice(spec.ref_fields);
        cols.extend_from_slice(&["data", "created_at", "updated_at"]);
        let placeholders = vec!["?"; cols.len()].join(", ");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(),
            cols.join(", "),
            placeholders
        );

        let data = serde_json::to_string(&draft.data)
            .map_err(|e| DbError::Internal(e.to_string()))?;
        let now = Utc::now();

        let mut query = sqlx::query(&sql);
        query = match &draft.key {
            NaturalKey::Text(s) => query.bind(s.clone()),
            NaturalKey::Number(n) => query.bind(*n),
        };
        query = query.bind(normalized_key.to_string()).bind(true);
        for field in spec.ref_fields {
            query = query.bind(draft.refs.get(*field).copied().flatten());
        }
        query = query.bind(data).bind(now).bind(now);

        let result = query.execute(ex).await?;
        Ok(result.last_insert_rowid())
    }

    /// Applies a patch to one row. The normalized key is recomputed here
    /// whenever the natural key changes; nothing else ever writes it.
    pub async fn update_fields<'e, E>(&self, ex: E, id: i64, patch: &Patch) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let spec = self.spec();
        debug!(kind = %self.kind, id, "updating record fields");

        let mut sets: Vec<String> = Vec::new();
        if patch.key.is_some() {
            sets.push(format!("{} = ?", spec.key_field));
            sets.push("normalized_key = ?".to_string());
        }
        for field in patch.refs.keys() {
            if !spec.ref_fields.contains(&field.as_str()) {
                return Err(DbError::Internal(format!(
                    "unknown reference field {} for {}",
                    field, self.kind
                )));
            }
            sets.push(format!("{} = ?", field));
        }
        if patch.data.is_some() {
            sets.push("data = ?".to_string());
        }
        sets.push("updated_at = ?".to_string());

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            self.table(),
            sets.join(", ")
        );

        let mut query = sqlx::query(&sql);
        if let Some(key) = &patch.key {
            query = match key {
                NaturalKey::Text(s) => query.bind(s.clone()),
                NaturalKey::Number(n) => query.bind(*n),
            };
            query = query.bind(key.normalized());
        }
        for value in patch.refs.values() {
            query = query.bind(*value);
        }
        if let Some(data) = &patch.data {
            let raw = serde_json::to_string(data).map_err(|e| DbError::Internal(e.to_string()))?;
            query = query.bind(raw);
        }
        query = query.bind(Utc::now()).bind(id);

        let result = query.execute(ex).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(self.kind.to_string(), id));
        }

        Ok(())
    }

    /// Flips the soft-delete flag on one row.
    ///
    /// Deactivation only ever sets `active = false`; no row is ever
    /// dropped by the lifecycle engine.
    pub async fn set_active<'e, E>(&self, ex: E, id: i64, active: bool) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(kind = %self.kind, id, active, "setting active flag");

        let sql = format!(
            "UPDATE {} SET active = ?, updated_at = ? WHERE id = ?",
            self.table()
        );

        let result = sqlx::query(&sql)
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(ex)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(self.kind.to_string(), id));
        }

        Ok(())
    }

    /// Deactivates every ACTIVE dependent row pointing at `id`. Part of the
    /// cascade strategy; must run inside the same transaction as the
    /// target's own deactivation.
    pub async fn deactivate_dependents<'e, E>(
        &self,
        ex: E,
        dep: &DependentSpec,
        id: i64,
    ) -> DbResult<u64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "UPDATE {} SET active = 0, updated_at = ? WHERE {} = ? AND active = 1",
            table(dep.kind),
            dep.fk_field
        );

        let result = sqlx::query(&sql)
            .bind(Utc::now())
            .bind(id)
            .execute(ex)
            .await?;

        debug!(
            kind = %self.kind, id, dependent = %dep.kind,
            rows = result.rows_affected(),
            "cascade-deactivated dependents"
        );
        Ok(result.rows_affected())
    }

    /// Nulls the reference field on every ACTIVE dependent row pointing at
    /// `id`. Part of the clear-link strategy; must run inside the same
    /// transaction as the target's own deactivation.
    pub async fn clear_links<'e, E>(&self, ex: E, dep: &DependentSpec, id: i64) -> DbResult<u64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "UPDATE {} SET {} = NULL, updated_at = ? WHERE {} = ? AND active = 1",
            table(dep.kind),
            dep.fk_field,
            dep.fk_field
        );

        let result = sqlx::query(&sql)
            .bind(Utc::now())
            .bind(id)
            .execute(ex)
            .await?;

        debug!(
            kind = %self.kind, id, dependent = %dep.kind,
            rows = result.rows_affected(),
            "cleared dependent links"
        );
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
