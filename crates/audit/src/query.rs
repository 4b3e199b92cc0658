//! Read side of the audit trail.
//!
//! Queries are paginated by default and ordered by sequence number ascending,
//! so a reviewer can walk the whole trail in stable pages and restart from
//! any offset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use supplyhub_core::UserId;

use crate::entry::{AuditAction, AuditEntry, EntityKind};

/// Pagination parameters for audit queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of entries to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50, // Safe default
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(1000), // Cap at 1000 for safety
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for audit queries. All fields optional; absent means "any".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub actor_id: Option<UserId>,
    pub entity_kind: Option<EntityKind>,
    pub entity_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
}

impl AuditFilter {
    /// Narrow to one entity's history.
    pub fn for_entity(entity_kind: EntityKind, entity_id: Uuid) -> Self {
        Self {
            entity_kind: Some(entity_kind),
            entity_id: Some(entity_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if self.actor_id.is_some_and(|actor| actor != entry.actor_id) {
            return false;
        }
        if self.entity_kind.is_some_and(|kind| kind != entry.entity_kind) {
            return false;
        }
        if self.entity_id.is_some_and(|id| id != entry.entity_id) {
            return false;
        }
        if self.action.is_some_and(|action| action != entry.action) {
            return false;
        }
        if self.occurred_after.is_some_and(|t| entry.occurred_at <= t) {
            return false;
        }
        if self.occurred_before.is_some_and(|t| entry.occurred_at >= t) {
            return false;
        }
        true
    }
}

/// Paginated audit query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPage {
    /// The entries matching the query, in sequence order.
    pub entries: Vec<AuditEntry>,
    /// Total number of entries matching the filter (across all pages).
    pub total: u64,
    /// Pagination parameters used.
    pub pagination: Pagination,
    /// Whether there are more entries available.
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: u64, actor: UserId, action: AuditAction) -> AuditEntry {
        AuditEntry {
            seq,
            actor_id: actor,
            action,
            entity_kind: EntityKind::InventoryItem,
            entity_id: Uuid::now_v7(),
            before: None,
            after: None,
            occurred_at: "2025-06-01T08:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn pagination_caps_limit() {
        let page = Pagination::new(Some(5000), None);
        assert_eq!(page.limit, 1000);
        assert_eq!(page.offset, 0);
    }

    #[test]
    fn default_filter_matches_everything() {
        let e = entry(1, UserId::new(), AuditAction::Add);
        assert!(AuditFilter::default().matches(&e));
    }

    #[test]
    fn filter_narrows_by_actor_and_action() {
        let actor = UserId::new();
        let e = entry(1, actor, AuditAction::Add);

        let match_filter = AuditFilter {
            actor_id: Some(actor),
            action: Some(AuditAction::Add),
            ..Default::default()
        };
        assert!(match_filter.matches(&e));

        let miss_filter = AuditFilter {
            actor_id: Some(UserId::new()),
            ..Default::default()
        };
        assert!(!miss_filter.matches(&e));
    }

    #[test]
    fn time_window_is_exclusive() {
        let e = entry(1, UserId::new(), AuditAction::Edit);
        let at = e.occurred_at;

        let after = AuditFilter {
            occurred_after: Some(at),
            ..Default::default()
        };
        assert!(!after.matches(&e));

        let before = AuditFilter {
            occurred_before: Some(at),
            ..Default::default()
        };
        assert!(!before.matches(&e));
    }
}
