//! Workflow execution pipeline (application-level orchestration).
//!
//! Every state change in the workspace flows through [`WorkflowEngine`]. It
//! orchestrates the full lifecycle of an operation against one shared
//! [`LedgerStore`]:
//!
//! ```text
//! Operation (submit / apply_transition / apply_direct_edit)
//!   ↓
//! 1. Load current state from the store
//!   ↓
//! 2. Authorize (static gate + contextual rules)
//!   ↓
//! 3. Resolve legality against the lifecycle tables
//!   ↓
//! 4. Plan stock deltas (floor-checked, pure)
//!   ↓
//! 5. Commit one unit: entity writes + audit records, all-or-nothing
//! ```
//!
//! No step has an externally observable side effect until the commit in
//! step 5 succeeds; a failure at any earlier step leaves all state untouched.
//! The engine never retries a conflicted commit — transient contention
//! surfaces as [`WorkflowError::PersistenceFailure`] and retry policy belongs
//! to the caller.
//!
//! ## Error Semantics
//!
//! Lower layers return their own typed errors (`AuthzError`, `MachineError`,
//! `SubmissionError`, `StockShortage`, `StoreError`, `DomainError`); this
//! module converts them into the engine-level [`WorkflowError`] taxonomy via
//! `From`, so callers match on one enum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{instrument, Span};

use supplyhub_audit::{
    AuditAction, AuditFilter, AuditPage, AuditRecord, EntityKind, Pagination,
};
use supplyhub_auth::{authorize, check_cancel_department, check_return_reference, Actor, AuthzError};
use supplyhub_core::{DomainError, ItemId, RequestId};
use supplyhub_inventory::{InventoryItem, ItemDraft, StockShortage};
use supplyhub_ledger::{CommitUnit, ItemWrite, LedgerStore, RequestWrite, StoreError};
use supplyhub_workflows::{
    evaluate, MachineError, RequestStatus, StockEffect, Submission, SubmissionDetail,
    SubmissionError, SupplyTransition, TransitionPayload, WorkflowKind, WorkflowRequest,
    WorkflowTransition,
};

use crate::authz::{edit_gate, submission_gate, transition_gate};

/// Failure taxonomy of the engine's operations.
///
/// Every engine operation returns exactly one of these kinds; business-rule
/// violations are resolved locally and never escape as generic errors.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A referenced request or item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The actor's role or context does not permit the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The transition is not legal from the request's current state, or
    /// targets a request of another workflow.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// A stock decrement would drive an item's quantity below zero.
    #[error("insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: i64,
        available: i64,
    },

    /// A submission carried no line items.
    #[error("a request needs at least one line item")]
    EmptyLineItems,

    /// A malformed payload (empty name, non-positive quantity, missing
    /// procurement price, non-approved return source, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The store failed: commit conflict, poisoned lock, backend error. The
    /// unit was rolled back in full.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl From<AuthzError> for WorkflowError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(msg) => WorkflowError::Unauthorized(msg),
        }
    }
}

impl From<MachineError> for WorkflowError {
    fn from(value: MachineError) -> Self {
        WorkflowError::InvalidTransition(value.to_string())
    }
}

impl From<SubmissionError> for WorkflowError {
    fn from(value: SubmissionError) -> Self {
        match value {
            SubmissionError::EmptyLines => WorkflowError::EmptyLineItems,
            SubmissionError::Invalid(msg) => WorkflowError::Validation(msg),
        }
    }
}

impl From<StockShortage> for WorkflowError {
    fn from(value: StockShortage) -> Self {
        WorkflowError::InsufficientStock {
            item_id: value.item_id,
            requested: value.requested,
            available: value.available,
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            // A concurrent commit won the race; the caller may retry.
            StoreError::Conflict(msg) => {
                WorkflowError::PersistenceFailure(format!("transient store contention: {msg}"))
            }
            // The entity vanished between our read and the commit.
            StoreError::MissingRow(msg) => WorkflowError::NotFound(msg),
            other => WorkflowError::PersistenceFailure(other.to_string()),
        }
    }
}

impl From<DomainError> for WorkflowError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => WorkflowError::Validation(msg),
            DomainError::NotFound(msg) => WorkflowError::NotFound(msg),
        }
    }
}

/// A direct inventory edit: applied immediately, no request lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DirectEdit {
    /// Create one item from a draft.
    Add(ItemDraft),
    /// Replace every mutable field of an existing item.
    Edit { item_id: ItemId, draft: ItemDraft },
    /// Remove an item. Existing requests keep referencing the id; operations
    /// that later need the item fail with `NotFound`.
    Delete { item_id: ItemId },
    /// Create many items in one atomic unit; one invalid row rejects the
    /// whole batch.
    Import(Vec<ItemDraft>),
}

impl DirectEdit {
    pub fn name(&self) -> &'static str {
        match self {
            DirectEdit::Add(_) => "add",
            DirectEdit::Edit { .. } => "edit",
            DirectEdit::Delete { .. } => "delete",
            DirectEdit::Import(_) => "import",
        }
    }
}

/// Result of a committed direct edit.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectEditOutcome {
    /// Items created or updated, as committed. Empty for a delete.
    pub items: Vec<InventoryItem>,
    /// The id removed by a delete.
    pub deleted: Option<ItemId>,
}

/// The audit entity kind a workflow's requests are recorded under.
pub fn request_entity_kind(kind: WorkflowKind) -> EntityKind {
    match kind {
        WorkflowKind::Supply => EntityKind::SupplyRequest,
        WorkflowKind::Procurement => EntityKind::ProcurementOrder,
        WorkflowKind::Return => EntityKind::ReturnRequest,
    }
}

fn snapshot<T: Serialize>(value: &T) -> Result<JsonValue, WorkflowError> {
    serde_json::to_value(value)
        .map_err(|e| WorkflowError::PersistenceFailure(format!("failed to encode snapshot: {e}")))
}

/// One planned stock write: the item as loaded and as it will be committed.
struct StockWrite {
    before: InventoryItem,
    after: InventoryItem,
}

/// The consistency engine: sole owner of transition logic and stock-delta
/// application.
///
/// Generic over the ledger store, so tests run against `InMemoryLedger` and
/// deployments against `PostgresLedger` without touching this code. Share the
/// store with the engine through `Arc` when read access is needed alongside:
/// `LedgerStore` is implemented for `Arc<S>`.
///
/// ## Execution Guarantees
///
/// - **Atomicity**: each operation commits one unit; the store applies it
///   all-or-nothing, audit records included
/// - **Consistency**: stock statuses are recomputed on every quantity write,
///   and no write can take a quantity below zero
/// - **Isolation**: versioned writes turn concurrent mutation of the same
///   entity into a `PersistenceFailure` instead of a lost update
#[derive(Debug)]
pub struct WorkflowEngine<S> {
    store: S,
}

impl<S> WorkflowEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S> WorkflowEngine<S>
where
    S: LedgerStore,
{
    /// Submit a new workflow request.
    ///
    /// The request is created in `pending` state with its lines fixed; no
    /// stock moves until a transition with a stock effect lands. Every line
    /// must reference an existing item, and a return submission must
    /// reference an approved supply request the actor is entitled to.
    #[instrument(
        skip(self, submission),
        fields(
            actor = %actor.user_id,
            role = %actor.role,
            kind = %submission.detail.kind()
        ),
        err
    )]
    pub fn submit(
        &self,
        actor: &Actor,
        submission: Submission,
    ) -> Result<WorkflowRequest, WorkflowError> {
        let span = Span::current();
        span.record("operation", "submit");

        let kind = submission.detail.kind();
        authorize(actor, submission_gate(kind))?;
        submission.validate()?;

        // Every line must point at a live item.
        for line in &submission.lines {
            if self.store.get_item(line.item_id)?.is_none() {
                return Err(WorkflowError::NotFound(format!("item {}", line.item_id)));
            }
        }

        if let SubmissionDetail::Return {
            supply_request_id, ..
        } = &submission.detail
        {
            self.check_return_source(actor, *supply_request_id)?;
        }

        let request = WorkflowRequest::from_submission(
            RequestId::new(),
            actor.user_id,
            actor.department_id,
            submission,
        );

        let record = AuditRecord::for_request(
            actor.user_id,
            AuditAction::Create,
            request_entity_kind(kind),
            request.id,
            None,
            Some(snapshot(&request)?),
            request.created_at,
        );

        self.store.commit(CommitUnit {
            items: vec![],
            request: Some(RequestWrite::Insert(request.clone())),
            audit: vec![record],
        })?;

        Ok(request)
    }

    /// Apply a transition to a request.
    ///
    /// Pipeline: load (`NotFound`), authorize (`Unauthorized`), resolve the
    /// lifecycle row (`InvalidTransition`), plan floor-checked stock deltas
    /// (`InsufficientStock`), then commit the request update, all item
    /// updates and one audit record per mutated entity as one unit.
    ///
    /// Returns the request as committed (version already advanced).
    #[instrument(
        skip(self, payload),
        fields(
            actor = %actor.user_id,
            role = %actor.role,
            request_id = %request_id,
            transition = %transition
        ),
        err
    )]
    pub fn apply_transition(
        &self,
        actor: &Actor,
        request_id: RequestId,
        transition: WorkflowTransition,
        payload: TransitionPayload,
    ) -> Result<WorkflowRequest, WorkflowError> {
        let span = Span::current();
        span.record("operation", "apply_transition");

        let TransitionPayload { note, occurred_at } = payload;

        let request = self
            .store
            .get_request(request_id)?
            .ok_or_else(|| WorkflowError::NotFound(format!("request {request_id}")))?;

        authorize(actor, transition_gate(transition))?;
        if matches!(
            transition,
            WorkflowTransition::Supply(SupplyTransition::Cancel)
        ) {
            check_cancel_department(actor, request.department_id)?;
        }

        let rule = evaluate(request.kind(), request.status, transition)?;

        let stock_writes = self.plan_stock_writes(&request, rule.effect, occurred_at)?;

        let mut updated = request.apply_rule(rule, actor.user_id, note, occurred_at);
        updated.version = request.version + 1;

        let mut items = Vec::with_capacity(stock_writes.len());
        let mut audit = Vec::with_capacity(stock_writes.len() + 1);
        audit.push(AuditRecord::for_request(
            actor.user_id,
            AuditAction::UpdateStatus,
            request_entity_kind(request.kind()),
            request.id,
            Some(snapshot(&request)?),
            Some(snapshot(&updated)?),
            occurred_at,
        ));
        for write in stock_writes {
            audit.push(AuditRecord::for_item(
                actor.user_id,
                AuditAction::StockAdjust,
                write.before.id,
                Some(snapshot(&write.before)?),
                Some(snapshot(&write.after)?),
                occurred_at,
            ));
            items.push(ItemWrite::Update {
                expected_version: write.before.version,
                item: write.after,
            });
        }

        self.store.commit(CommitUnit {
            items,
            request: Some(RequestWrite::Update {
                expected_version: request.version,
                request: updated.clone(),
            }),
            audit,
        })?;

        Ok(updated)
    }

    /// Apply a direct inventory edit (add / edit / delete / bulk import).
    ///
    /// Edits bypass the request lifecycle but not the gate, the stock policy
    /// or the audit trail: every mutated item yields exactly one record, and
    /// an import commits all rows or none.
    #[instrument(
        skip(self, edit),
        fields(actor = %actor.user_id, role = %actor.role, op = edit.name()),
        err
    )]
    pub fn apply_direct_edit(
        &self,
        actor: &Actor,
        edit: DirectEdit,
        occurred_at: DateTime<Utc>,
    ) -> Result<DirectEditOutcome, WorkflowError> {
        let span = Span::current();
        span.record("operation", "apply_direct_edit");

        authorize(actor, edit_gate(&edit))?;
        let today = occurred_at.date_naive();

        let (items, audit, outcome) = match edit {
            DirectEdit::Add(draft) => {
                let item = InventoryItem::create(ItemId::new(), draft, today)?;
                let record = AuditRecord::for_item(
                    actor.user_id,
                    AuditAction::Add,
                    item.id,
                    None,
                    Some(snapshot(&item)?),
                    occurred_at,
                );
                (
                    vec![ItemWrite::Insert(item.clone())],
                    vec![record],
                    DirectEditOutcome {
                        items: vec![item],
                        deleted: None,
                    },
                )
            }
            DirectEdit::Edit { item_id, draft } => {
                let before = self
                    .store
                    .get_item(item_id)?
                    .ok_or_else(|| WorkflowError::NotFound(format!("item {item_id}")))?;
                let mut after = before.apply_draft(draft, today)?;
                after.version = before.version + 1;
                let record = AuditRecord::for_item(
                    actor.user_id,
                    AuditAction::Edit,
                    item_id,
                    Some(snapshot(&before)?),
                    Some(snapshot(&after)?),
                    occurred_at,
                );
                (
                    vec![ItemWrite::Update {
                        expected_version: before.version,
                        item: after.clone(),
                    }],
                    vec![record],
                    DirectEditOutcome {
                        items: vec![after],
                        deleted: None,
                    },
                )
            }
            DirectEdit::Delete { item_id } => {
                let before = self
                    .store
                    .get_item(item_id)?
                    .ok_or_else(|| WorkflowError::NotFound(format!("item {item_id}")))?;
                let record = AuditRecord::for_item(
                    actor.user_id,
                    AuditAction::Delete,
                    item_id,
                    Some(snapshot(&before)?),
                    None,
                    occurred_at,
                );
                (
                    vec![ItemWrite::Delete {
                        expected_version: before.version,
                        item_id,
                    }],
                    vec![record],
                    DirectEditOutcome {
                        items: vec![],
                        deleted: Some(item_id),
                    },
                )
            }
            DirectEdit::Import(drafts) => {
                if drafts.is_empty() {
                    return Err(WorkflowError::Validation(
                        "import needs at least one row".to_string(),
                    ));
                }
                let mut writes = Vec::with_capacity(drafts.len());
                let mut records = Vec::with_capacity(drafts.len());
                let mut created = Vec::with_capacity(drafts.len());
                for draft in drafts {
                    // One invalid draft fails here and nothing commits.
                    let item = InventoryItem::create(ItemId::new(), draft, today)?;
                    records.push(AuditRecord::for_item(
                        actor.user_id,
                        AuditAction::Import,
                        item.id,
                        None,
                        Some(snapshot(&item)?),
                        occurred_at,
                    ));
                    writes.push(ItemWrite::Insert(item.clone()));
                    created.push(item);
                }
                (
                    writes,
                    records,
                    DirectEditOutcome {
                        items: created,
                        deleted: None,
                    },
                )
            }
        };

        self.store.commit(CommitUnit {
            items,
            request: None,
            audit,
        })?;

        Ok(outcome)
    }

    /// Read a page of the audit trail.
    ///
    /// Reads are not role-gated: the trail exists to be inspected, and the
    /// auditor role has no other purpose. Entries come back in sequence
    /// order, so a consumer can restart from the last `seq` it saw.
    #[instrument(skip(self, filter), fields(limit = pagination.limit, offset = pagination.offset), err)]
    pub fn list_audit_trail(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, WorkflowError> {
        Ok(self.store.audit_trail(filter, pagination)?)
    }

    /// Validate the supply request a return submission references.
    fn check_return_source(
        &self,
        actor: &Actor,
        supply_request_id: RequestId,
    ) -> Result<(), WorkflowError> {
        let source = self
            .store
            .get_request(supply_request_id)?
            .ok_or_else(|| WorkflowError::NotFound(format!("request {supply_request_id}")))?;

        if source.kind() != WorkflowKind::Supply {
            return Err(WorkflowError::Validation(format!(
                "request {supply_request_id} is not a supply request"
            )));
        }
        if source.status != RequestStatus::Approved {
            return Err(WorkflowError::Validation(format!(
                "returns must reference an approved supply request, {supply_request_id} is {}",
                source.status
            )));
        }
        check_return_reference(actor, source.requester_id)?;
        Ok(())
    }

    /// Plan the item writes a stock effect produces, floor-checked.
    ///
    /// Lines are merged per item first, so a request listing the same item on
    /// two lines yields one combined delta and one write. The first shortage
    /// aborts the plan; nothing has been written at that point.
    fn plan_stock_writes(
        &self,
        request: &WorkflowRequest,
        effect: StockEffect,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<StockWrite>, WorkflowError> {
        let sign: i64 = match effect {
            StockEffect::None => return Ok(vec![]),
            StockEffect::DecrementLines => -1,
            StockEffect::IncrementLines => 1,
        };
        let today = occurred_at.date_naive();

        let mut deltas: Vec<(ItemId, i64)> = Vec::new();
        for line in &request.lines {
            match deltas.iter_mut().find(|(id, _)| *id == line.item_id) {
                Some((_, total)) => *total += sign * line.quantity,
                None => deltas.push((line.item_id, sign * line.quantity)),
            }
        }

        let mut writes = Vec::with_capacity(deltas.len());
        for (item_id, delta) in deltas {
            let before = self
                .store
                .get_item(item_id)?
                .ok_or_else(|| WorkflowError::NotFound(format!("item {item_id}")))?;
            let mut after = before.with_delta(delta, today)?;
            // Snapshots must match the stored row, so carry the committed version.
            after.version = before.version + 1;
            writes.push(StockWrite { before, after });
        }
        Ok(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflict_maps_to_persistence_failure() {
        let err: WorkflowError = StoreError::Conflict("item x: expected 1, found 2".into()).into();
        match err {
            WorkflowError::PersistenceFailure(msg) => {
                assert!(msg.contains("transient store contention"));
            }
            other => panic!("expected PersistenceFailure, got {other:?}"),
        }
    }

    #[test]
    fn store_missing_row_maps_to_not_found() {
        let err: WorkflowError = StoreError::MissingRow("item x".into()).into();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[test]
    fn empty_lines_map_to_their_own_kind() {
        let err: WorkflowError = SubmissionError::EmptyLines.into();
        assert!(matches!(err, WorkflowError::EmptyLineItems));
    }

    #[test]
    fn shortage_keeps_its_amounts() {
        let shortage = StockShortage {
            item_id: ItemId::new(),
            requested: 5,
            available: 3,
        };
        let err: WorkflowError = shortage.clone().into();
        match err {
            WorkflowError::InsufficientStock {
                item_id,
                requested,
                available,
            } => {
                assert_eq!(item_id, shortage.item_id);
                assert_eq!(requested, 5);
                assert_eq!(available, 3);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn request_kinds_map_to_audit_entity_kinds() {
        assert_eq!(
            request_entity_kind(WorkflowKind::Supply),
            EntityKind::SupplyRequest
        );
        assert_eq!(
            request_entity_kind(WorkflowKind::Procurement),
            EntityKind::ProcurementOrder
        );
        assert_eq!(
            request_entity_kind(WorkflowKind::Return),
            EntityKind::ReturnRequest
        );
    }
}
