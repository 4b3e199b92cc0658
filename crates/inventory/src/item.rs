use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use supplyhub_core::{DomainError, DomainResult, ItemId};

use crate::policy::{derive_status, StockStatus};

/// A tracked inventory item.
///
/// `status` is always the value [`derive_status`] produces for the other
/// fields; constructors and mutators below are the only ways this type is
/// built, and all of them recompute it. `version` is maintained by the store
/// (bumped once per committed write) and backs optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub name: String,
    pub quantity: i64,
    pub unit: String,
    pub unit_price: f64,
    pub min_stock_level: i64,
    pub expiry_date: Option<NaiveDate>,
    pub status: StockStatus,
    pub version: u64,
}

/// The mutable field set of an item, as submitted by add/edit/import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub name: String,
    pub quantity: i64,
    pub unit: String,
    pub unit_price: f64,
    pub min_stock_level: i64,
    pub expiry_date: Option<NaiveDate>,
}

impl ItemDraft {
    fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        if self.min_stock_level < 0 {
            return Err(DomainError::validation("min stock level cannot be negative"));
        }
        if self.unit_price < 0.0 {
            return Err(DomainError::validation("unit price cannot be negative"));
        }
        Ok(())
    }
}

/// A stock decrement that would cross the zero floor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("insufficient stock for item {item_id}: requested {requested}, available {available}")]
pub struct StockShortage {
    pub item_id: ItemId,
    pub requested: i64,
    pub available: i64,
}

impl InventoryItem {
    /// Build a new item from a validated draft. Status is derived, never taken
    /// from the caller.
    pub fn create(id: ItemId, draft: ItemDraft, today: NaiveDate) -> DomainResult<Self> {
        draft.validate()?;
        let status = derive_status(draft.quantity, draft.min_stock_level, draft.expiry_date, today);
        Ok(Self {
            id,
            name: draft.name,
            quantity: draft.quantity,
            unit: draft.unit,
            unit_price: draft.unit_price,
            min_stock_level: draft.min_stock_level,
            expiry_date: draft.expiry_date,
            status,
            version: 1,
        })
    }

    /// Replace every mutable field from a draft (the edit operation). Keeps
    /// identity and version, recomputes status.
    pub fn apply_draft(&self, draft: ItemDraft, today: NaiveDate) -> DomainResult<Self> {
        draft.validate()?;
        let status = derive_status(draft.quantity, draft.min_stock_level, draft.expiry_date, today);
        Ok(Self {
            id: self.id,
            name: draft.name,
            quantity: draft.quantity,
            unit: draft.unit,
            unit_price: draft.unit_price,
            min_stock_level: draft.min_stock_level,
            expiry_date: draft.expiry_date,
            status,
            version: self.version,
        })
    }

    /// Apply a signed stock delta with a floor check.
    ///
    /// This is the only quantity-arithmetic path in the workspace. A delta
    /// that would take the quantity below zero fails with [`StockShortage`]
    /// and leaves `self` untouched; callers reject their whole unit of work on
    /// the first shortage.
    pub fn with_delta(&self, delta: i64, today: NaiveDate) -> Result<Self, StockShortage> {
        let new_quantity = self.quantity + delta;
        if new_quantity < 0 {
            return Err(StockShortage {
                item_id: self.id,
                requested: -delta,
                available: self.quantity,
            });
        }
        let status = derive_status(new_quantity, self.min_stock_level, self.expiry_date, today);
        Ok(Self {
            quantity: new_quantity,
            status,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        "2025-06-01".parse().unwrap()
    }

    fn test_draft(quantity: i64) -> ItemDraft {
        ItemDraft {
            name: "Bond paper A4".to_string(),
            quantity,
            unit: "ream".to_string(),
            unit_price: 230.0,
            min_stock_level: 10,
            expiry_date: None,
        }
    }

    #[test]
    fn create_derives_status() {
        let item = InventoryItem::create(ItemId::new(), test_draft(5), today()).unwrap();
        assert_eq!(item.status, StockStatus::LowStock);
        assert_eq!(item.version, 1);
    }

    #[test]
    fn create_rejects_blank_name() {
        let mut draft = test_draft(5);
        draft.name = "   ".to_string();
        let err = InventoryItem::create(ItemId::new(), draft, today()).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("name")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_rejects_negative_quantity() {
        let err = InventoryItem::create(ItemId::new(), test_draft(-1), today()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn apply_draft_recomputes_status_and_keeps_identity() {
        let item = InventoryItem::create(ItemId::new(), test_draft(50), today()).unwrap();
        assert_eq!(item.status, StockStatus::Available);

        let edited = item.apply_draft(test_draft(0), today()).unwrap();
        assert_eq!(edited.id, item.id);
        assert_eq!(edited.status, StockStatus::OutOfStock);
    }

    #[test]
    fn delta_below_floor_is_rejected_with_amounts() {
        let item = InventoryItem::create(ItemId::new(), test_draft(3), today()).unwrap();
        let err = item.with_delta(-5, today()).unwrap_err();
        assert_eq!(err.requested, 5);
        assert_eq!(err.available, 3);
    }

    #[test]
    fn delta_to_exactly_zero_is_allowed() {
        let item = InventoryItem::create(ItemId::new(), test_draft(3), today()).unwrap();
        let drained = item.with_delta(-3, today()).unwrap();
        assert_eq!(drained.quantity, 0);
        assert_eq!(drained.status, StockStatus::OutOfStock);
    }

    #[test]
    fn increment_on_expired_item_stays_expired() {
        let mut draft = test_draft(0);
        draft.expiry_date = Some("2024-01-01".parse().unwrap());
        let item = InventoryItem::create(ItemId::new(), draft, today()).unwrap();
        assert_eq!(item.status, StockStatus::Expired);

        let restocked = item.with_delta(100, today()).unwrap();
        assert_eq!(restocked.quantity, 100);
        assert_eq!(restocked.status, StockStatus::Expired);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a delta either fails the floor check or yields a
        /// non-negative quantity whose status matches the policy.
        #[test]
        fn delta_never_observes_negative_stock(
            start in 0i64..10_000i64,
            delta in -12_000i64..12_000i64,
        ) {
            let mut draft = test_draft(start);
            draft.min_stock_level = 100;
            let item = InventoryItem::create(ItemId::new(), draft, today()).unwrap();

            match item.with_delta(delta, today()) {
                Ok(updated) => {
                    prop_assert!(updated.quantity >= 0);
                    prop_assert_eq!(updated.quantity, start + delta);
                    prop_assert_eq!(
                        updated.status,
                        derive_status(updated.quantity, 100, None, today())
                    );
                }
                Err(shortage) => {
                    prop_assert!(start + delta < 0);
                    prop_assert_eq!(shortage.available, start);
                    prop_assert_eq!(shortage.requested, -delta);
                }
            }
        }
    }
}
