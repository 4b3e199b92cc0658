//! The workflow engine: orchestration of authorization, lifecycle legality,
//! stock deltas and the audit trail over one ledger store.
//!
//! This crate owns no domain rules of its own; it sequences the rules the
//! domain crates define and commits their outcome atomically.

pub mod authz;
pub mod engine;

pub use engine::{
    request_entity_kind, DirectEdit, DirectEditOutcome, WorkflowEngine, WorkflowError,
};
