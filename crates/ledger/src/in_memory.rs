use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use supplyhub_audit::{AuditEntry, AuditFilter, AuditPage, Pagination};
use supplyhub_core::{ItemId, RequestId};
use supplyhub_inventory::InventoryItem;
use supplyhub_workflows::{WorkflowKind, WorkflowRequest};

use crate::store::{CommitUnit, ItemWrite, LedgerStore, RequestWrite, StoreError};

#[derive(Debug, Default)]
struct LedgerState {
    items: HashMap<ItemId, InventoryItem>,
    requests: HashMap<RequestId, WorkflowRequest>,
    trail: Vec<AuditEntry>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. One `RwLock` over the whole state: commits take
/// the write lock, which serializes every unit, and validate the full unit
/// before touching anything, which makes all-or-nothing trivial.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn validate_unit(state: &LedgerState, unit: &CommitUnit) -> Result<(), StoreError> {
    let mut touched_items: HashSet<ItemId> = HashSet::new();
    for write in &unit.items {
        if !touched_items.insert(write.item_id()) {
            return Err(StoreError::InvalidCommit(format!(
                "unit writes item {} twice",
                write.item_id()
            )));
        }
        match write {
            ItemWrite::Insert(item) => {
                if state.items.contains_key(&item.id) {
                    return Err(StoreError::Duplicate(format!("item {}", item.id)));
                }
            }
            ItemWrite::Update {
                expected_version,
                item,
            } => {
                let stored = state
                    .items
                    .get(&item.id)
                    .ok_or_else(|| StoreError::MissingRow(format!("item {}", item.id)))?;
                if stored.version != *expected_version {
                    return Err(StoreError::Conflict(format!(
                        "item {}: expected version {}, found {}",
                        item.id, expected_version, stored.version
                    )));
                }
            }
            ItemWrite::Delete {
                expected_version,
                item_id,
            } => {
                let stored = state
                    .items
                    .get(item_id)
                    .ok_or_else(|| StoreError::MissingRow(format!("item {item_id}")))?;
                if stored.version != *expected_version {
                    return Err(StoreError::Conflict(format!(
                        "item {item_id}: expected version {expected_version}, found {}",
                        stored.version
                    )));
                }
            }
        }
    }

    match &unit.request {
        Some(RequestWrite::Insert(request)) => {
            if state.requests.contains_key(&request.id) {
                return Err(StoreError::Duplicate(format!("request {}", request.id)));
            }
        }
        Some(RequestWrite::Update {
            expected_version,
            request,
        }) => {
            let stored = state
                .requests
                .get(&request.id)
                .ok_or_else(|| StoreError::MissingRow(format!("request {}", request.id)))?;
            if stored.version != *expected_version {
                return Err(StoreError::Conflict(format!(
                    "request {}: expected version {}, found {}",
                    request.id, expected_version, stored.version
                )));
            }
        }
        None => {}
    }

    Ok(())
}

impl LedgerStore for InMemoryLedger {
    fn get_item(&self, item_id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(state.items.get(&item_id).cloned())
    }

    fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        let mut items: Vec<InventoryItem> = state.items.values().cloned().collect();
        items.sort_by_key(|item| *item.id.as_uuid());
        Ok(items)
    }

    fn get_request(&self, request_id: RequestId) -> Result<Option<WorkflowRequest>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(state.requests.get(&request_id).cloned())
    }

    fn list_requests(&self, kind: Option<WorkflowKind>) -> Result<Vec<WorkflowRequest>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        let mut requests: Vec<WorkflowRequest> = state
            .requests
            .values()
            .filter(|request| kind.is_none_or(|k| request.kind() == k))
            .cloned()
            .collect();
        requests.sort_by_key(|request| (request.created_at, *request.id.as_uuid()));
        Ok(requests)
    }

    fn commit(&self, unit: CommitUnit) -> Result<Vec<AuditEntry>, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        // Validate everything before applying anything.
        validate_unit(&state, &unit)?;

        for write in unit.items {
            match write {
                ItemWrite::Insert(mut item) => {
                    item.version = 1;
                    state.items.insert(item.id, item);
                }
                ItemWrite::Update {
                    expected_version,
                    mut item,
                } => {
                    item.version = expected_version + 1;
                    state.items.insert(item.id, item);
                }
                ItemWrite::Delete { item_id, .. } => {
                    state.items.remove(&item_id);
                }
            }
        }

        match unit.request {
            Some(RequestWrite::Insert(mut request)) => {
                request.version = 1;
                state.requests.insert(request.id, request);
            }
            Some(RequestWrite::Update {
                expected_version,
                mut request,
            }) => {
                request.version = expected_version + 1;
                state.requests.insert(request.id, request);
            }
            None => {}
        }

        let mut committed = Vec::with_capacity(unit.audit.len());
        for record in unit.audit {
            let seq = state.trail.len() as u64 + 1;
            let entry = AuditEntry::from_record(record, seq);
            state.trail.push(entry.clone());
            committed.push(entry);
        }

        Ok(committed)
    }

    fn audit_trail(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        // The trail is already in sequence order (append-only).
        let matching: Vec<&AuditEntry> = state
            .trail
            .iter()
            .filter(|entry| filter.matches(entry))
            .collect();
        let total = matching.len() as u64;

        let entries: Vec<AuditEntry> = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        let has_more = total > (pagination.offset + pagination.limit) as u64;

        Ok(AuditPage {
            entries,
            total,
            pagination,
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use supplyhub_audit::{AuditAction, AuditRecord, EntityKind};
    use supplyhub_core::UserId;
    use supplyhub_inventory::ItemDraft;

    fn test_time() -> DateTime<Utc> {
        "2025-06-01T08:00:00Z".parse().unwrap()
    }

    fn test_item(quantity: i64) -> InventoryItem {
        InventoryItem::create(
            ItemId::new(),
            ItemDraft {
                name: "Ethanol 70%".to_string(),
                quantity,
                unit: "bottle".to_string(),
                unit_price: 85.0,
                min_stock_level: 5,
                expiry_date: None,
            },
            "2025-06-01".parse().unwrap(),
        )
        .unwrap()
    }

    fn audit_for(item: &InventoryItem, action: AuditAction) -> AuditRecord {
        AuditRecord::for_item(
            UserId::new(),
            action,
            item.id,
            None,
            Some(serde_json::to_value(item).unwrap()),
            test_time(),
        )
    }

    fn insert_unit(item: &InventoryItem) -> CommitUnit {
        CommitUnit {
            items: vec![ItemWrite::Insert(item.clone())],
            request: None,
            audit: vec![audit_for(item, AuditAction::Add)],
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let store = InMemoryLedger::new();
        let item = test_item(10);
        store.commit(insert_unit(&item)).unwrap();

        let loaded = store.get_item(item.id).unwrap().unwrap();
        assert_eq!(loaded, item);
    }

    #[test]
    fn duplicate_insert_fails_whole_unit() {
        let store = InMemoryLedger::new();
        let item = test_item(10);
        store.commit(insert_unit(&item)).unwrap();

        let err = store.commit(insert_unit(&item)).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        // The audit record of the failed unit must not be visible.
        let page = store
            .audit_trail(&AuditFilter::default(), Pagination::default())
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let store = InMemoryLedger::new();
        let item = test_item(10);
        store.commit(insert_unit(&item)).unwrap();

        let edited = item.with_delta(-2, "2025-06-01".parse().unwrap()).unwrap();
        let err = store
            .commit(CommitUnit {
                items: vec![ItemWrite::Update {
                    expected_version: 7,
                    item: edited,
                }],
                request: None,
                audit: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn update_bumps_version() {
        let store = InMemoryLedger::new();
        let item = test_item(10);
        store.commit(insert_unit(&item)).unwrap();

        let edited = item.with_delta(-2, "2025-06-01".parse().unwrap()).unwrap();
        store
            .commit(CommitUnit {
                items: vec![ItemWrite::Update {
                    expected_version: 1,
                    item: edited,
                }],
                request: None,
                audit: vec![],
            })
            .unwrap();

        let loaded = store.get_item(item.id).unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.quantity, 8);
    }

    #[test]
    fn failed_unit_applies_nothing() {
        let store = InMemoryLedger::new();
        let item = test_item(10);
        store.commit(insert_unit(&item)).unwrap();

        // A unit with one valid update and one write aimed at a missing row.
        let edited = item.with_delta(-2, "2025-06-01".parse().unwrap()).unwrap();
        let err = store
            .commit(CommitUnit {
                items: vec![
                    ItemWrite::Update {
                        expected_version: 1,
                        item: edited,
                    },
                    ItemWrite::Delete {
                        expected_version: 1,
                        item_id: ItemId::new(),
                    },
                ],
                request: None,
                audit: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingRow(_)));

        let loaded = store.get_item(item.id).unwrap().unwrap();
        assert_eq!(loaded.quantity, 10, "valid half of the unit leaked through");
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn double_write_to_one_item_is_rejected() {
        let store = InMemoryLedger::new();
        let item = test_item(10);
        let unit = CommitUnit {
            items: vec![
                ItemWrite::Insert(item.clone()),
                ItemWrite::Update {
                    expected_version: 1,
                    item: item.clone(),
                },
            ],
            request: None,
            audit: vec![],
        };
        assert!(matches!(
            store.commit(unit),
            Err(StoreError::InvalidCommit(_))
        ));
    }

    #[test]
    fn audit_sequence_increases_across_commits() {
        let store = InMemoryLedger::new();
        let first = test_item(1);
        let second = test_item(2);
        store.commit(insert_unit(&first)).unwrap();
        let committed = store.commit(insert_unit(&second)).unwrap();
        assert_eq!(committed[0].seq, 2);

        let page = store
            .audit_trail(&AuditFilter::default(), Pagination::default())
            .unwrap();
        let seqs: Vec<u64> = page.entries.iter().map(|entry| entry.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn audit_trail_pages_and_reports_more() {
        let store = InMemoryLedger::new();
        for n in 0..5 {
            store.commit(insert_unit(&test_item(n))).unwrap();
        }

        let page = store
            .audit_trail(
                &AuditFilter {
                    entity_kind: Some(EntityKind::InventoryItem),
                    ..Default::default()
                },
                Pagination::new(Some(2), Some(2)),
            )
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[0].seq, 3);
        assert!(page.has_more);
    }

    #[test]
    fn list_requests_filters_by_kind() {
        use supplyhub_workflows::{LineItem, Submission, SubmissionDetail};

        let store = InMemoryLedger::new();
        let item = test_item(10);
        store.commit(insert_unit(&item)).unwrap();

        let supply = WorkflowRequest::from_submission(
            RequestId::new(),
            UserId::new(),
            None,
            Submission {
                lines: vec![LineItem::new(item.id, 1)],
                detail: SubmissionDetail::Supply {
                    justification: "lab restock".to_string(),
                },
                occurred_at: test_time(),
            },
        );
        store
            .commit(CommitUnit {
                items: vec![],
                request: Some(RequestWrite::Insert(supply.clone())),
                audit: vec![],
            })
            .unwrap();

        let supplies = store.list_requests(Some(WorkflowKind::Supply)).unwrap();
        assert_eq!(supplies.len(), 1);
        assert!(store
            .list_requests(Some(WorkflowKind::Procurement))
            .unwrap()
            .is_empty());
    }
}
