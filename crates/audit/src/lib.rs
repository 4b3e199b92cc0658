//! `supplyhub-audit` — audit trail types.
//!
//! The write side ([`AuditRecord`]) is committed by the ledger store inside
//! the same atomic unit as the mutation it describes; the read side
//! ([`AuditFilter`], [`AuditPage`]) serves paginated trail review.

pub mod entry;
pub mod query;

pub use entry::{AuditAction, AuditEntry, AuditRecord, EntityKind};
pub use query::{AuditFilter, AuditPage, Pagination};
