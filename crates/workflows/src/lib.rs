//! Workflow request domain: the shared request shape and the per-workflow
//! lifecycle tables, interpreted by a single state machine.
//!
//! Pure domain logic; storage, authorization and stock arithmetic live in
//! their own crates.

pub mod machine;
pub mod request;

pub use machine::{
    evaluate, is_terminal, rules, MachineError, ProcurementTransition, RequestStatus,
    ReturnTransition, StockEffect, SupplyTransition, TransitionRule, WorkflowKind,
    WorkflowTransition,
};
pub use request::{
    LineItem, RequestDetail, Submission, SubmissionDetail, SubmissionError, TransitionPayload,
    WorkflowRequest,
};
