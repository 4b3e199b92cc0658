//! Inventory domain module.
//!
//! This crate contains business rules for inventory items, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod item;
pub mod policy;

pub use item::{InventoryItem, ItemDraft, StockShortage};
pub use policy::{derive_status, StockStatus};
