//! Stock status policy.
//!
//! `status` is never stored independently of the scalars it is derived from.
//! Every code path that writes `quantity`, `min_stock_level` or `expiry_date`
//! goes back through [`derive_status`], so a stored status can never disagree
//! with the stored numbers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Derived stock state of an inventory item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Available,
    LowStock,
    OutOfStock,
    Expired,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Available => "available",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
            StockStatus::Expired => "expired",
        }
    }
}

impl core::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for StockStatus {
    type Err = supplyhub_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(StockStatus::Available),
            "low_stock" => Ok(StockStatus::LowStock),
            "out_of_stock" => Ok(StockStatus::OutOfStock),
            "expired" => Ok(StockStatus::Expired),
            other => Err(supplyhub_core::DomainError::validation(format!(
                "unknown stock status: {other}"
            ))),
        }
    }
}

/// Derive the status of an item from its scalar state.
///
/// Priority order, first match wins:
///
/// 1. expired       - `expiry_date` present and on or before `today`
/// 2. out_of_stock  - quantity at or below zero
/// 3. low_stock     - quantity at or below the minimum stock level
/// 4. available     - otherwise
///
/// An expired item stays expired no matter how much stock it holds.
pub fn derive_status(
    quantity: i64,
    min_stock_level: i64,
    expiry_date: Option<NaiveDate>,
    today: NaiveDate,
) -> StockStatus {
    if let Some(expiry) = expiry_date {
        if expiry <= today {
            return StockStatus::Expired;
        }
    }
    if quantity <= 0 {
        return StockStatus::OutOfStock;
    }
    if quantity <= min_stock_level {
        return StockStatus::LowStock;
    }
    StockStatus::Available
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn plenty_of_stock_is_available() {
        assert_eq!(derive_status(100, 10, None, day("2025-06-01")), StockStatus::Available);
    }

    #[test]
    fn at_or_below_min_level_is_low_stock() {
        assert_eq!(derive_status(10, 10, None, day("2025-06-01")), StockStatus::LowStock);
        assert_eq!(derive_status(3, 10, None, day("2025-06-01")), StockStatus::LowStock);
    }

    #[test]
    fn zero_quantity_is_out_of_stock_even_with_zero_min_level() {
        assert_eq!(derive_status(0, 0, None, day("2025-06-01")), StockStatus::OutOfStock);
    }

    #[test]
    fn expiry_on_today_counts_as_expired() {
        let today = day("2025-06-01");
        assert_eq!(derive_status(100, 10, Some(today), today), StockStatus::Expired);
    }

    #[test]
    fn future_expiry_does_not_expire() {
        let today = day("2025-06-01");
        assert_eq!(
            derive_status(100, 10, Some(day("2025-06-02")), today),
            StockStatus::Available
        );
    }

    #[test]
    fn expired_wins_over_out_of_stock() {
        let today = day("2025-06-01");
        assert_eq!(
            derive_status(0, 10, Some(day("2024-01-01")), today),
            StockStatus::Expired
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the derivation respects its priority order for every
        /// combination of scalars.
        #[test]
        fn priority_order_holds(
            quantity in -100i64..10_000i64,
            min_level in 0i64..1_000i64,
            expiry_offset in prop::option::of(-400i64..400i64),
        ) {
            let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
            let expiry = expiry_offset.map(|d| today + chrono::Duration::days(d));
            let status = derive_status(quantity, min_level, expiry, today);

            match status {
                StockStatus::Expired => {
                    prop_assert!(expiry.is_some_and(|e| e <= today));
                }
                StockStatus::OutOfStock => {
                    prop_assert!(expiry.is_none_or(|e| e > today));
                    prop_assert!(quantity <= 0);
                }
                StockStatus::LowStock => {
                    prop_assert!(expiry.is_none_or(|e| e > today));
                    prop_assert!(quantity > 0 && quantity <= min_level);
                }
                StockStatus::Available => {
                    prop_assert!(expiry.is_none_or(|e| e > today));
                    prop_assert!(quantity > min_level);
                }
            }
        }
    }
}
