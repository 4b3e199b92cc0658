//! Versioned ledger storage boundary.
//!
//! This crate defines the storage abstraction the engine commits through:
//! a unit of item and request writes plus their audit records, applied
//! all-or-nothing with optimistic version checks. Two implementations ship
//! here, an in-memory store for tests and a Postgres-backed one.

pub mod in_memory;
pub mod postgres;
pub mod store;

pub use in_memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use store::{CommitUnit, ItemWrite, LedgerStore, RequestWrite, StoreError};
