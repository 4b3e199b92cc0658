//! Postgres-backed ledger store.
//!
//! Persists items, requests and the audit trail in PostgreSQL, with
//! optimistic concurrency enforced at the database level. The DDL for the
//! three tables lives in `schema.sql` next to this crate's `Cargo.toml`.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` / `Duplicate` | Concurrent commit raced on an audit `seq`, or an insert re-used an id |
//! | Database (foreign key violation) | `23503` | `InvalidCommit` | Referential integrity violation (should not occur in our schema) |
//! | Database (check constraint violation) | `23514` | `InvalidCommit` | Invalid data (e.g., version <= 0) |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed | N/A | `Backend` | Connection pool was closed |
//! | RowNotFound | N/A | `Backend` | Unexpected row not found (should not occur) |
//! | Other | N/A | `Backend` | Network errors, connection failures, etc. |
//!
//! ## Optimistic Concurrency
//!
//! Every `UPDATE`/`DELETE` carries `AND version = $expected` and checks
//! `rows_affected`; a miss is probed once more inside the transaction to
//! tell a missing row apart from a stale version. Audit sequence numbers are
//! assigned from `MAX(seq) + 1` inside the same transaction, so two commits
//! racing on the trail collide on the `seq` primary key and exactly one of
//! them observes `Conflict`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{instrument, Span};

use supplyhub_audit::{AuditEntry, AuditFilter, AuditPage, AuditRecord, Pagination};
use supplyhub_core::{DepartmentId, ItemId, RequestId, UserId};
use supplyhub_inventory::{InventoryItem, StockStatus};
use supplyhub_workflows::{LineItem, RequestDetail, RequestStatus, WorkflowKind, WorkflowRequest};

use crate::store::{CommitUnit, ItemWrite, LedgerStore, RequestWrite, StoreError};

/// Postgres-backed implementation of [`LedgerStore`].
///
/// ## Thread Safety
///
/// Uses the SQLx connection pool which is thread-safe (Arc + Send + Sync).
/// All writes go through a single transaction per commit unit.
#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: Arc<PgPool>,
}

impl PostgresLedger {
    /// Create a new PostgresLedger with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    pub async fn fetch_item(&self, item_id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
        let span = Span::current();
        span.record("operation", "fetch_item");

        let row = sqlx::query(
            r#"
            SELECT id, name, quantity, unit, unit_price, min_stock_level,
                   expiry_date, status, version
            FROM inventory_items
            WHERE id = $1
            "#,
        )
        .bind(item_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_item", e))?;

        match row {
            Some(row) => {
                let item_row = ItemRow::from_row(&row)
                    .map_err(|e| StoreError::Backend(format!("failed to decode item row: {e}")))?;
                Ok(Some(item_row.try_into()?))
            }
            None => Ok(None),
        }
    }

    /// Load every item, ordered by id for a stable listing.
    #[instrument(skip(self), err)]
    pub async fn fetch_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let span = Span::current();
        span.record("operation", "fetch_items");

        let rows = sqlx::query(
            r#"
            SELECT id, name, quantity, unit, unit_price, min_stock_level,
                   expiry_date, status, version
            FROM inventory_items
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_items", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let item_row = ItemRow::from_row(&row)
                .map_err(|e| StoreError::Backend(format!("failed to decode item row: {e}")))?;
            items.push(item_row.try_into()?);
        }

        span.record("item_count", items.len());
        Ok(items)
    }

    #[instrument(skip(self), fields(request_id = %request_id), err)]
    pub async fn fetch_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<WorkflowRequest>, StoreError> {
        let span = Span::current();
        span.record("operation", "fetch_request");

        let row = sqlx::query(
            r#"
            SELECT id, kind, requester_id, department_id, status, lines, detail,
                   created_at, decided_at, processed_by, processor_note, version
            FROM workflow_requests
            WHERE id = $1
            "#,
        )
        .bind(request_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_request", e))?;

        match row {
            Some(row) => {
                let request_row = RequestRow::from_row(&row).map_err(|e| {
                    StoreError::Backend(format!("failed to decode request row: {e}"))
                })?;
                Ok(Some(request_row.try_into()?))
            }
            None => Ok(None),
        }
    }

    /// Load requests, optionally restricted to one workflow, in submission
    /// order.
    #[instrument(skip(self), fields(kind = ?kind), err)]
    pub async fn fetch_requests(
        &self,
        kind: Option<WorkflowKind>,
    ) -> Result<Vec<WorkflowRequest>, StoreError> {
        let span = Span::current();
        span.record("operation", "fetch_requests");

        let kind_param: Option<&str> = kind.map(|k| k.as_str());

        let rows = sqlx::query(
            r#"
            SELECT id, kind, requester_id, department_id, status, lines, detail,
                   created_at, decided_at, processed_by, processor_note, version
            FROM workflow_requests
            WHERE ($1::text IS NULL OR kind = $1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(kind_param)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_requests", e))?;

        let mut requests = Vec::with_capacity(rows.len());
        for row in rows {
            let request_row = RequestRow::from_row(&row)
                .map_err(|e| StoreError::Backend(format!("failed to decode request row: {e}")))?;
            requests.push(request_row.try_into()?);
        }

        span.record("request_count", requests.len());
        Ok(requests)
    }

    /// Apply a commit unit atomically.
    ///
    /// This method:
    /// 1. Rejects units that write the same item twice
    /// 2. Starts a transaction
    /// 3. Applies every item write and the request write with version checks
    /// 4. Assigns audit sequence numbers from `MAX(seq) + 1` and inserts
    ///    the trail entries
    /// 5. Commits the transaction
    ///
    /// Any failure rolls the whole transaction back; no partial unit is ever
    /// visible.
    #[instrument(
        skip(self, unit),
        fields(
            item_writes = unit.items.len(),
            request_write = unit.request.is_some(),
            audit_records = unit.audit.len()
        ),
        err
    )]
    pub async fn apply_commit(&self, unit: CommitUnit) -> Result<Vec<AuditEntry>, StoreError> {
        let span = Span::current();
        span.record("operation", "apply_commit");

        // A unit touching one item twice is a caller bug, not a storage race.
        let mut touched: HashSet<ItemId> = HashSet::new();
        for write in &unit.items {
            if !touched.insert(write.item_id()) {
                return Err(StoreError::InvalidCommit(format!(
                    "unit writes item {} twice",
                    write.item_id()
                )));
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        match apply_unit(&mut tx, unit).await {
            Ok(committed) => {
                tx.commit()
                    .await
                    .map_err(|e| map_sqlx_error("commit_transaction", e))?;
                span.record("committed_entries", committed.len());
                Ok(committed)
            }
            Err(err) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                Err(err)
            }
        }
    }

    /// Query the audit trail with optional filters and pagination.
    ///
    /// Entries come back in sequence order (ascending), so a consumer can
    /// restart from the last sequence number it saw.
    #[instrument(
        skip(self, filter),
        fields(limit = pagination.limit, offset = pagination.offset),
        err
    )]
    pub async fn query_trail(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, StoreError> {
        let span = Span::current();
        span.record("operation", "query_trail");

        // Optional filters collapse into a single parameterized query.
        let actor_param: Option<uuid::Uuid> = filter.actor_id.map(|id| *id.as_uuid());
        let kind_param: Option<&str> = filter.entity_kind.map(|kind| kind.as_str());
        let action_param: Option<&str> = filter.action.map(|action| action.as_str());

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) as total
            FROM audit_trail
            WHERE ($1::uuid IS NULL OR actor_id = $1)
                AND ($2::text IS NULL OR entity_kind = $2)
                AND ($3::uuid IS NULL OR entity_id = $3)
                AND ($4::text IS NULL OR action = $4)
                AND ($5::timestamptz IS NULL OR occurred_at > $5)
                AND ($6::timestamptz IS NULL OR occurred_at < $6)
            "#,
        )
        .bind(actor_param)
        .bind(kind_param)
        .bind(filter.entity_id)
        .bind(action_param)
        .bind(filter.occurred_after)
        .bind(filter.occurred_before)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_audit_trail", e))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StoreError::Backend(format!("failed to read count: {e}")))?;

        let rows = sqlx::query(
            r#"
            SELECT seq, actor_id, action, entity_kind, entity_id,
                   before_state, after_state, occurred_at, recorded_at
            FROM audit_trail
            WHERE ($1::uuid IS NULL OR actor_id = $1)
                AND ($2::text IS NULL OR entity_kind = $2)
                AND ($3::uuid IS NULL OR entity_id = $3)
                AND ($4::text IS NULL OR action = $4)
                AND ($5::timestamptz IS NULL OR occurred_at > $5)
                AND ($6::timestamptz IS NULL OR occurred_at < $6)
            ORDER BY seq ASC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(actor_param)
        .bind(kind_param)
        .bind(filter.entity_id)
        .bind(action_param)
        .bind(filter.occurred_after)
        .bind(filter.occurred_before)
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_audit_trail", e))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let audit_row = AuditRow::from_row(&row)
                .map_err(|e| StoreError::Backend(format!("failed to decode audit row: {e}")))?;
            entries.push(audit_row.try_into()?);
        }

        let has_more = total > (pagination.offset + pagination.limit) as i64;

        Ok(AuditPage {
            entries,
            total: total as u64,
            pagination,
            has_more,
        })
    }
}

/// Run every write of a unit inside the caller's transaction.
async fn apply_unit(
    tx: &mut Transaction<'_, Postgres>,
    unit: CommitUnit,
) -> Result<Vec<AuditEntry>, StoreError> {
    for write in &unit.items {
        match write {
            ItemWrite::Insert(item) => insert_item(tx, item).await?,
            ItemWrite::Update {
                expected_version,
                item,
            } => update_item(tx, *expected_version, item).await?,
            ItemWrite::Delete {
                expected_version,
                item_id,
            } => delete_item(tx, *expected_version, *item_id).await?,
        }
    }

    match &unit.request {
        Some(RequestWrite::Insert(request)) => insert_request(tx, request).await?,
        Some(RequestWrite::Update {
            expected_version,
            request,
        }) => update_request(tx, *expected_version, request).await?,
        None => {}
    }

    let mut next_seq = current_trail_seq(tx).await? + 1;
    let mut committed = Vec::with_capacity(unit.audit.len());
    for record in unit.audit {
        insert_audit(tx, next_seq, &record).await?;
        committed.push(AuditEntry::from_record(record, next_seq));
        next_seq += 1;
    }

    Ok(committed)
}

async fn insert_item(
    tx: &mut Transaction<'_, Postgres>,
    item: &InventoryItem,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO inventory_items (
            id, name, quantity, unit, unit_price, min_stock_level,
            expiry_date, status, version
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1)
        "#,
    )
    .bind(item.id.as_uuid())
    .bind(&item.name)
    .bind(item.quantity)
    .bind(&item.unit)
    .bind(item.unit_price)
    .bind(item.min_stock_level)
    .bind(item.expiry_date)
    .bind(item.status.as_str())
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::Duplicate(format!("item {} already exists", item.id))
        } else {
            map_sqlx_error("insert_item", e)
        }
    })?;
    Ok(())
}

async fn update_item(
    tx: &mut Transaction<'_, Postgres>,
    expected_version: u64,
    item: &InventoryItem,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE inventory_items
        SET name = $2, quantity = $3, unit = $4, unit_price = $5,
            min_stock_level = $6, expiry_date = $7, status = $8, version = $9
        WHERE id = $1 AND version = $10
        "#,
    )
    .bind(item.id.as_uuid())
    .bind(&item.name)
    .bind(item.quantity)
    .bind(&item.unit)
    .bind(item.unit_price)
    .bind(item.min_stock_level)
    .bind(item.expiry_date)
    .bind(item.status.as_str())
    .bind(expected_version as i64 + 1)
    .bind(expected_version as i64)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_item", e))?;

    if result.rows_affected() == 0 {
        return Err(stale_item_write(tx, item.id, expected_version).await);
    }
    Ok(())
}

async fn delete_item(
    tx: &mut Transaction<'_, Postgres>,
    expected_version: u64,
    item_id: ItemId,
) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM inventory_items WHERE id = $1 AND version = $2")
        .bind(item_id.as_uuid())
        .bind(expected_version as i64)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("delete_item", e))?;

    if result.rows_affected() == 0 {
        return Err(stale_item_write(tx, item_id, expected_version).await);
    }
    Ok(())
}

/// Probe a failed versioned item write to tell a missing row apart from a
/// stale version.
async fn stale_item_write(
    tx: &mut Transaction<'_, Postgres>,
    item_id: ItemId,
    expected_version: u64,
) -> StoreError {
    let row = sqlx::query("SELECT version FROM inventory_items WHERE id = $1")
        .bind(item_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await;
    match row {
        Ok(Some(row)) => match row.try_get::<i64, _>("version") {
            Ok(version) => StoreError::Conflict(format!(
                "item {item_id}: expected version {expected_version}, found {version}"
            )),
            Err(e) => StoreError::Backend(format!("failed to read version: {e}")),
        },
        Ok(None) => StoreError::MissingRow(format!("item {item_id}")),
        Err(e) => map_sqlx_error("probe_item_version", e),
    }
}

async fn insert_request(
    tx: &mut Transaction<'_, Postgres>,
    request: &WorkflowRequest,
) -> Result<(), StoreError> {
    let lines = serde_json::to_value(&request.lines)
        .map_err(|e| StoreError::InvalidCommit(format!("failed to encode request lines: {e}")))?;
    let detail = serde_json::to_value(&request.detail)
        .map_err(|e| StoreError::InvalidCommit(format!("failed to encode request detail: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO workflow_requests (
            id, kind, requester_id, department_id, status, lines, detail,
            created_at, decided_at, processed_by, processor_note, version
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 1)
        "#,
    )
    .bind(request.id.as_uuid())
    .bind(request.kind().as_str())
    .bind(request.requester_id.as_uuid())
    .bind(request.department_id.map(|id| *id.as_uuid()))
    .bind(request.status.as_str())
    .bind(&lines)
    .bind(&detail)
    .bind(request.created_at)
    .bind(request.decided_at)
    .bind(request.processed_by.map(|id| *id.as_uuid()))
    .bind(&request.processor_note)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::Duplicate(format!("request {} already exists", request.id))
        } else {
            map_sqlx_error("insert_request", e)
        }
    })?;
    Ok(())
}

async fn update_request(
    tx: &mut Transaction<'_, Postgres>,
    expected_version: u64,
    request: &WorkflowRequest,
) -> Result<(), StoreError> {
    let lines = serde_json::to_value(&request.lines)
        .map_err(|e| StoreError::InvalidCommit(format!("failed to encode request lines: {e}")))?;
    let detail = serde_json::to_value(&request.detail)
        .map_err(|e| StoreError::InvalidCommit(format!("failed to encode request detail: {e}")))?;

    let result = sqlx::query(
        r#"
        UPDATE workflow_requests
        SET kind = $2, requester_id = $3, department_id = $4, status = $5,
            lines = $6, detail = $7, created_at = $8, decided_at = $9,
            processed_by = $10, processor_note = $11, version = $12
        WHERE id = $1 AND version = $13
        "#,
    )
    .bind(request.id.as_uuid())
    .bind(request.kind().as_str())
    .bind(request.requester_id.as_uuid())
    .bind(request.department_id.map(|id| *id.as_uuid()))
    .bind(request.status.as_str())
    .bind(&lines)
    .bind(&detail)
    .bind(request.created_at)
    .bind(request.decided_at)
    .bind(request.processed_by.map(|id| *id.as_uuid()))
    .bind(&request.processor_note)
    .bind(expected_version as i64 + 1)
    .bind(expected_version as i64)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_request", e))?;

    if result.rows_affected() == 0 {
        return Err(stale_request_write(tx, request.id, expected_version).await);
    }
    Ok(())
}

/// Probe a failed versioned request write, same as [`stale_item_write`].
async fn stale_request_write(
    tx: &mut Transaction<'_, Postgres>,
    request_id: RequestId,
    expected_version: u64,
) -> StoreError {
    let row = sqlx::query("SELECT version FROM workflow_requests WHERE id = $1")
        .bind(request_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await;
    match row {
        Ok(Some(row)) => match row.try_get::<i64, _>("version") {
            Ok(version) => StoreError::Conflict(format!(
                "request {request_id}: expected version {expected_version}, found {version}"
            )),
            Err(e) => StoreError::Backend(format!("failed to read version: {e}")),
        },
        Ok(None) => StoreError::MissingRow(format!("request {request_id}")),
        Err(e) => map_sqlx_error("probe_request_version", e),
    }
}

/// Current top of the audit trail, 0 when the trail is empty.
async fn current_trail_seq(tx: &mut Transaction<'_, Postgres>) -> Result<u64, StoreError> {
    let row = sqlx::query("SELECT COALESCE(MAX(seq), 0) as current_seq FROM audit_trail")
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("current_trail_seq", e))?;

    let current_seq: i64 = row
        .try_get("current_seq")
        .map_err(|e| StoreError::Backend(format!("failed to read current_seq: {e}")))?;
    Ok(current_seq as u64)
}

async fn insert_audit(
    tx: &mut Transaction<'_, Postgres>,
    seq: u64,
    record: &AuditRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO audit_trail (
            seq, actor_id, action, entity_kind, entity_id,
            before_state, after_state, occurred_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(seq as i64)
    .bind(record.actor_id.as_uuid())
    .bind(record.action.as_str())
    .bind(record.entity_kind.as_str())
    .bind(record.entity_id)
    .bind(&record.before)
    .bind(&record.after)
    .bind(record.occurred_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        // Two commits racing on the trail collide here.
        if is_unique_violation(&e) {
            StoreError::Conflict(format!(
                "concurrent commit detected: audit seq {seq} already exists"
            ))
        } else {
            map_sqlx_error("insert_audit", e)
        }
    })?;
    Ok(())
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            if let Some(code) = db_err.code() {
                match code.as_ref() {
                    "23505" => {
                        // Unique violation
                        StoreError::Conflict(msg)
                    }
                    "23503" => {
                        // Foreign key violation (shouldn't happen in our schema)
                        StoreError::InvalidCommit(msg)
                    }
                    "23514" => {
                        // Check constraint violation
                        StoreError::InvalidCommit(msg)
                    }
                    _ => StoreError::Backend(msg),
                }
            } else {
                StoreError::Backend(msg)
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            // Should not happen for our queries (we use fetch_optional/fetch_all)
            StoreError::Backend(format!("unexpected row not found in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct ItemRow {
    id: uuid::Uuid,
    name: String,
    quantity: i64,
    unit: String,
    unit_price: f64,
    min_stock_level: i64,
    expiry_date: Option<NaiveDate>,
    status: String,
    version: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ItemRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
            unit: row.try_get("unit")?,
            unit_price: row.try_get("unit_price")?,
            min_stock_level: row.try_get("min_stock_level")?,
            expiry_date: row.try_get("expiry_date")?,
            status: row.try_get("status")?,
            version: row.try_get("version")?,
        })
    }
}

impl TryFrom<ItemRow> for InventoryItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, StoreError> {
        let status = row
            .status
            .parse::<StockStatus>()
            .map_err(|e| StoreError::Backend(format!("bad status in item row: {e}")))?;
        Ok(InventoryItem {
            id: ItemId::from_uuid(row.id),
            name: row.name,
            quantity: row.quantity,
            unit: row.unit,
            unit_price: row.unit_price,
            min_stock_level: row.min_stock_level,
            expiry_date: row.expiry_date,
            status,
            version: row.version as u64,
        })
    }
}

#[derive(Debug)]
struct RequestRow {
    id: uuid::Uuid,
    #[allow(dead_code)] // The tag inside `detail` is authoritative; the column only serves filtering
    kind: String,
    requester_id: uuid::Uuid,
    department_id: Option<uuid::Uuid>,
    status: String,
    lines: serde_json::Value,
    detail: serde_json::Value,
    created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
    processed_by: Option<uuid::Uuid>,
    processor_note: Option<String>,
    version: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for RequestRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(RequestRow {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            requester_id: row.try_get("requester_id")?,
            department_id: row.try_get("department_id")?,
            status: row.try_get("status")?,
            lines: row.try_get("lines")?,
            detail: row.try_get("detail")?,
            created_at: row.try_get("created_at")?,
            decided_at: row.try_get("decided_at")?,
            processed_by: row.try_get("processed_by")?,
            processor_note: row.try_get("processor_note")?,
            version: row.try_get("version")?,
        })
    }
}

impl TryFrom<RequestRow> for WorkflowRequest {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> Result<Self, StoreError> {
        let status = row
            .status
            .parse::<RequestStatus>()
            .map_err(|e| StoreError::Backend(format!("bad status in request row: {e}")))?;
        let lines: Vec<LineItem> = serde_json::from_value(row.lines)
            .map_err(|e| StoreError::Backend(format!("bad lines in request row: {e}")))?;
        let detail: RequestDetail = serde_json::from_value(row.detail)
            .map_err(|e| StoreError::Backend(format!("bad detail in request row: {e}")))?;
        Ok(WorkflowRequest {
            id: RequestId::from_uuid(row.id),
            requester_id: UserId::from_uuid(row.requester_id),
            department_id: row.department_id.map(DepartmentId::from_uuid),
            status,
            lines,
            detail,
            created_at: row.created_at,
            decided_at: row.decided_at,
            processed_by: row.processed_by.map(UserId::from_uuid),
            processor_note: row.processor_note,
            version: row.version as u64,
        })
    }
}

#[derive(Debug)]
struct AuditRow {
    seq: i64,
    actor_id: uuid::Uuid,
    action: String,
    entity_kind: String,
    entity_id: uuid::Uuid,
    before_state: Option<serde_json::Value>,
    after_state: Option<serde_json::Value>,
    occurred_at: DateTime<Utc>,
    #[allow(dead_code)] // Not surfaced in AuditEntry, but kept for potential future use (e.g., monitoring)
    recorded_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for AuditRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(AuditRow {
            seq: row.try_get("seq")?,
            actor_id: row.try_get("actor_id")?,
            action: row.try_get("action")?,
            entity_kind: row.try_get("entity_kind")?,
            entity_id: row.try_get("entity_id")?,
            before_state: row.try_get("before_state")?,
            after_state: row.try_get("after_state")?,
            occurred_at: row.try_get("occurred_at")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, StoreError> {
        let action = row
            .action
            .parse()
            .map_err(|e| StoreError::Backend(format!("bad action in audit row: {e}")))?;
        let entity_kind = row
            .entity_kind
            .parse()
            .map_err(|e| StoreError::Backend(format!("bad entity kind in audit row: {e}")))?;
        Ok(AuditEntry {
            seq: row.seq as u64,
            actor_id: UserId::from_uuid(row.actor_id),
            action,
            entity_kind,
            entity_id: row.entity_id,
            before: row.before_state,
            after: row.after_state,
            occurred_at: row.occurred_at,
        })
    }
}

// Implement LedgerStore trait

impl LedgerStore for PostgresLedger {
    // The LedgerStore trait is synchronous, but Postgres operations require
    // async. We use tokio::runtime::Handle to run async code in a sync
    // context, which works when called from a blocking-capable thread of a
    // tokio runtime (e.g., inside spawn_blocking).

    fn get_item(&self, item_id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
        runtime_handle()?.block_on(self.fetch_item(item_id))
    }

    fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        runtime_handle()?.block_on(self.fetch_items())
    }

    fn get_request(&self, request_id: RequestId) -> Result<Option<WorkflowRequest>, StoreError> {
        runtime_handle()?.block_on(self.fetch_request(request_id))
    }

    fn list_requests(&self, kind: Option<WorkflowKind>) -> Result<Vec<WorkflowRequest>, StoreError> {
        runtime_handle()?.block_on(self.fetch_requests(kind))
    }

    fn commit(&self, unit: CommitUnit) -> Result<Vec<AuditEntry>, StoreError> {
        runtime_handle()?.block_on(self.apply_commit(unit))
    }

    fn audit_trail(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, StoreError> {
        runtime_handle()?.block_on(self.query_trail(filter, pagination))
    }
}

fn runtime_handle() -> Result<tokio::runtime::Handle, StoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Backend(
            "PostgresLedger requires an async runtime (tokio). Ensure you're calling from within a tokio runtime context.".to_string(),
        )
    })
}
