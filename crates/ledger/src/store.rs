use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use supplyhub_audit::{AuditEntry, AuditFilter, AuditPage, AuditRecord, Pagination};
use supplyhub_core::{ItemId, RequestId};
use supplyhub_inventory::InventoryItem;
use supplyhub_workflows::{WorkflowKind, WorkflowRequest};

/// Store operation error.
///
/// These are **infrastructure errors** (missing rows, stale versions, backend
/// failures) as opposed to domain errors (validation, lifecycle rules), which
/// are rejected before a commit unit is ever built.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An expected version did not match the stored one. Someone else
    /// committed in between; the caller may re-read and retry.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// An insert hit an already-used id.
    #[error("duplicate insert: {0}")]
    Duplicate(String),

    /// An update or delete targeted a row that is not there.
    #[error("missing row: {0}")]
    MissingRow(String),

    /// The unit itself is malformed (e.g. two writes to one entity).
    #[error("invalid commit unit: {0}")]
    InvalidCommit(String),

    /// The backing store failed (connection, pool, poisoned lock).
    #[error("backend failure: {0}")]
    Backend(String),
}

/// One versioned write against the item set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemWrite {
    /// Add a new item. Fails the unit with [`StoreError::Duplicate`] if the
    /// id is taken. Stored with version 1.
    Insert(InventoryItem),
    /// Replace an existing item. `expected_version` must equal the stored
    /// version; the store writes the item back with `expected_version + 1`.
    Update {
        expected_version: u64,
        item: InventoryItem,
    },
    /// Remove an existing item under the same version discipline.
    Delete {
        expected_version: u64,
        item_id: ItemId,
    },
}

impl ItemWrite {
    pub fn item_id(&self) -> ItemId {
        match self {
            ItemWrite::Insert(item) => item.id,
            ItemWrite::Update { item, .. } => item.id,
            ItemWrite::Delete { item_id, .. } => *item_id,
        }
    }
}

/// One versioned write against the request set. Requests are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestWrite {
    Insert(WorkflowRequest),
    Update {
        expected_version: u64,
        request: WorkflowRequest,
    },
}

impl RequestWrite {
    pub fn request_id(&self) -> RequestId {
        match self {
            RequestWrite::Insert(request) => request.id,
            RequestWrite::Update { request, .. } => request.id,
        }
    }
}

/// One atomic unit of work: entity writes plus the audit records describing
/// them, committed together or not at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitUnit {
    pub items: Vec<ItemWrite>,
    pub request: Option<RequestWrite>,
    pub audit: Vec<AuditRecord>,
}

impl CommitUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.request.is_none() && self.audit.is_empty()
    }
}

/// Persistence seam and atomicity boundary of the engine.
///
/// ## Commit semantics
///
/// `commit()`:
/// - validates the whole unit first (row presence, expected versions, no
///   duplicate writes), then applies it; on any failure nothing is applied,
///   audit records included
/// - bumps entity versions (insert -> 1, update -> expected + 1)
/// - assigns audit sequence numbers, strictly increasing in commit order
///   across the whole trail
///
/// ## Concurrency
///
/// Units touching the same entity are serialized; the expected-version checks
/// turn a lost race into [`StoreError::Conflict`] instead of a lost update.
/// Retrying is the caller's decision, never the store's.
///
/// ## Reads
///
/// Listing methods return stable orders (items by id, requests by creation
/// time) so paging callers see deterministic results.
pub trait LedgerStore: Send + Sync {
    fn get_item(&self, item_id: ItemId) -> Result<Option<InventoryItem>, StoreError>;

    fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError>;

    fn get_request(&self, request_id: RequestId) -> Result<Option<WorkflowRequest>, StoreError>;

    fn list_requests(&self, kind: Option<WorkflowKind>) -> Result<Vec<WorkflowRequest>, StoreError>;

    /// Apply one unit atomically. Returns the committed audit entries with
    /// their assigned sequence numbers.
    fn commit(&self, unit: CommitUnit) -> Result<Vec<AuditEntry>, StoreError>;

    /// Read the audit trail, filtered and paginated, in sequence order.
    fn audit_trail(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn get_item(&self, item_id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
        (**self).get_item(item_id)
    }

    fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        (**self).list_items()
    }

    fn get_request(&self, request_id: RequestId) -> Result<Option<WorkflowRequest>, StoreError> {
        (**self).get_request(request_id)
    }

    fn list_requests(&self, kind: Option<WorkflowKind>) -> Result<Vec<WorkflowRequest>, StoreError> {
        (**self).list_requests(kind)
    }

    fn commit(&self, unit: CommitUnit) -> Result<Vec<AuditEntry>, StoreError> {
        (**self).commit(unit)
    }

    fn audit_trail(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, StoreError> {
        (**self).audit_trail(filter, pagination)
    }
}
