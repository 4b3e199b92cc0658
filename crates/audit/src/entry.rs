use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use supplyhub_core::{ItemId, RequestId, UserId};

/// What an audit entry says happened.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A request was submitted.
    Create,
    /// A request moved to a new lifecycle status.
    UpdateStatus,
    /// An item's quantity changed as a side effect of a request transition.
    StockAdjust,
    /// An item was added directly.
    Add,
    /// An item's fields were edited directly.
    Edit,
    /// An item was deleted directly.
    Delete,
    /// An item was created by a bulk import row.
    Import,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::UpdateStatus => "update_status",
            AuditAction::StockAdjust => "stock_adjust",
            AuditAction::Add => "add",
            AuditAction::Edit => "edit",
            AuditAction::Delete => "delete",
            AuditAction::Import => "import",
        }
    }
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AuditAction {
    type Err = supplyhub_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(AuditAction::Create),
            "update_status" => Ok(AuditAction::UpdateStatus),
            "stock_adjust" => Ok(AuditAction::StockAdjust),
            "add" => Ok(AuditAction::Add),
            "edit" => Ok(AuditAction::Edit),
            "delete" => Ok(AuditAction::Delete),
            "import" => Ok(AuditAction::Import),
            other => Err(supplyhub_core::DomainError::validation(format!(
                "unknown audit action: {other}"
            ))),
        }
    }
}

/// Which kind of entity an entry is about. Entity ids are stored as raw uuids
/// because one trail spans all entity kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    InventoryItem,
    SupplyRequest,
    ProcurementOrder,
    ReturnRequest,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::InventoryItem => "inventory_item",
            EntityKind::SupplyRequest => "supply_request",
            EntityKind::ProcurementOrder => "procurement_order",
            EntityKind::ReturnRequest => "return_request",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for EntityKind {
    type Err = supplyhub_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inventory_item" => Ok(EntityKind::InventoryItem),
            "supply_request" => Ok(EntityKind::SupplyRequest),
            "procurement_order" => Ok(EntityKind::ProcurementOrder),
            "return_request" => Ok(EntityKind::ReturnRequest),
            other => Err(supplyhub_core::DomainError::validation(format!(
                "unknown entity kind: {other}"
            ))),
        }
    }
}

/// An audit record ready to be committed (no sequence number yet).
///
/// Records ride inside the same commit unit as the mutation they describe;
/// the store assigns sequence numbers at commit. `before`/`after` are full
/// JSON snapshots of the entity exactly as stored around the mutation (absent
/// on the creation side of an add and the trailing side of a delete).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor_id: UserId,
    pub action: AuditAction,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn for_item(
        actor_id: UserId,
        action: AuditAction,
        item_id: ItemId,
        before: Option<JsonValue>,
        after: Option<JsonValue>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            actor_id,
            action,
            entity_kind: EntityKind::InventoryItem,
            entity_id: *item_id.as_uuid(),
            before,
            after,
            occurred_at,
        }
    }

    pub fn for_request(
        actor_id: UserId,
        action: AuditAction,
        entity_kind: EntityKind,
        request_id: RequestId,
        before: Option<JsonValue>,
        after: Option<JsonValue>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            actor_id,
            action,
            entity_kind,
            entity_id: *request_id.as_uuid(),
            before,
            after,
            occurred_at,
        }
    }
}

/// A committed audit entry (assigned a sequence number).
///
/// Sequence numbers are store-assigned, strictly increasing in commit order
/// across the whole trail, and never reused. The trail is append-only: no
/// update or delete surface exists anywhere in the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the trail, strictly increasing in commit order.
    pub seq: u64,
    pub actor_id: UserId,
    pub action: AuditAction,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn from_record(record: AuditRecord, seq: u64) -> Self {
        Self {
            seq,
            actor_id: record.actor_id,
            action: record.action,
            entity_kind: record.entity_kind,
            entity_id: record.entity_id,
            before: record.before,
            after: record.after,
            occurred_at: record.occurred_at,
        }
    }
}
