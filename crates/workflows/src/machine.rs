//! Request state machines.
//!
//! Each workflow declares its lifecycle as a static table of
//! [`TransitionRule`] rows; [`evaluate`] is the single interpreter all of
//! them run through. There is no per-workflow transition code, so a lifecycle
//! change is a table edit, not a new code path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three request workflows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Supply,
    Procurement,
    Return,
}

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 3] = [
        WorkflowKind::Supply,
        WorkflowKind::Procurement,
        WorkflowKind::Return,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Supply => "supply",
            WorkflowKind::Procurement => "procurement",
            WorkflowKind::Return => "return",
        }
    }
}

impl core::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for WorkflowKind {
    type Err = supplyhub_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "supply" => Ok(WorkflowKind::Supply),
            "procurement" => Ok(WorkflowKind::Procurement),
            "return" => Ok(WorkflowKind::Return),
            other => Err(supplyhub_core::DomainError::validation(format!(
                "unknown workflow kind: {other}"
            ))),
        }
    }
}

/// Lifecycle state of a request. The full set spans all workflows; which
/// states a given request can actually reach is defined by its table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Ordered,
    Received,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::Ordered => "ordered",
            RequestStatus::Received => "received",
        }
    }
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for RequestStatus {
    type Err = supplyhub_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "cancelled" => Ok(RequestStatus::Cancelled),
            "ordered" => Ok(RequestStatus::Ordered),
            "received" => Ok(RequestStatus::Received),
            other => Err(supplyhub_core::DomainError::validation(format!(
                "unknown request status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyTransition {
    Approve,
    Reject,
    Cancel,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcurementTransition {
    MarkOrdered,
    MarkReceived,
    Cancel,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnTransition {
    Approve,
    Reject,
}

/// A transition, tagged by the workflow it belongs to. Aiming a variant at a
/// request of another workflow is rejected by [`evaluate`] before any table
/// lookup happens.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowTransition {
    Supply(SupplyTransition),
    Procurement(ProcurementTransition),
    Return(ReturnTransition),
}

impl WorkflowTransition {
    pub fn kind(&self) -> WorkflowKind {
        match self {
            WorkflowTransition::Supply(_) => WorkflowKind::Supply,
            WorkflowTransition::Procurement(_) => WorkflowKind::Procurement,
            WorkflowTransition::Return(_) => WorkflowKind::Return,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowTransition::Supply(SupplyTransition::Approve) => "approve",
            WorkflowTransition::Supply(SupplyTransition::Reject) => "reject",
            WorkflowTransition::Supply(SupplyTransition::Cancel) => "cancel",
            WorkflowTransition::Procurement(ProcurementTransition::MarkOrdered) => "mark_ordered",
            WorkflowTransition::Procurement(ProcurementTransition::MarkReceived) => "mark_received",
            WorkflowTransition::Procurement(ProcurementTransition::Cancel) => "cancel",
            WorkflowTransition::Return(ReturnTransition::Approve) => "approve",
            WorkflowTransition::Return(ReturnTransition::Reject) => "reject",
        }
    }
}

impl core::fmt::Display for WorkflowTransition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.kind(), self.name())
    }
}

/// Stock side effect a transition carries.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockEffect {
    None,
    /// Each line's quantity is taken out of its item (floor-checked).
    DecrementLines,
    /// Each line's quantity is added back to its item.
    IncrementLines,
}

/// One legal row in a workflow's lifecycle table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransitionRule {
    pub transition: WorkflowTransition,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub effect: StockEffect,
}

const fn rule(
    transition: WorkflowTransition,
    from: RequestStatus,
    to: RequestStatus,
    effect: StockEffect,
) -> TransitionRule {
    TransitionRule {
        transition,
        from,
        to,
        effect,
    }
}

/// Supply requests: a decision or cancellation ends the lifecycle; approval
/// hands the requested stock out.
const SUPPLY_RULES: &[TransitionRule] = &[
    rule(
        WorkflowTransition::Supply(SupplyTransition::Approve),
        RequestStatus::Pending,
        RequestStatus::Approved,
        StockEffect::DecrementLines,
    ),
    rule(
        WorkflowTransition::Supply(SupplyTransition::Reject),
        RequestStatus::Pending,
        RequestStatus::Rejected,
        StockEffect::None,
    ),
    rule(
        WorkflowTransition::Supply(SupplyTransition::Cancel),
        RequestStatus::Pending,
        RequestStatus::Cancelled,
        StockEffect::None,
    ),
];

/// Procurement orders advance pending -> ordered -> received; stock arrives
/// at receipt. Cancellation is open until goods are received.
const PROCUREMENT_RULES: &[TransitionRule] = &[
    rule(
        WorkflowTransition::Procurement(ProcurementTransition::MarkOrdered),
        RequestStatus::Pending,
        RequestStatus::Ordered,
        StockEffect::None,
    ),
    rule(
        WorkflowTransition::Procurement(ProcurementTransition::MarkReceived),
        RequestStatus::Ordered,
        RequestStatus::Received,
        StockEffect::IncrementLines,
    ),
    rule(
        WorkflowTransition::Procurement(ProcurementTransition::Cancel),
        RequestStatus::Pending,
        RequestStatus::Cancelled,
        StockEffect::None,
    ),
    rule(
        WorkflowTransition::Procurement(ProcurementTransition::Cancel),
        RequestStatus::Ordered,
        RequestStatus::Cancelled,
        StockEffect::None,
    ),
];

/// Returns: an approval puts the returned stock back.
const RETURN_RULES: &[TransitionRule] = &[
    rule(
        WorkflowTransition::Return(ReturnTransition::Approve),
        RequestStatus::Pending,
        RequestStatus::Approved,
        StockEffect::IncrementLines,
    ),
    rule(
        WorkflowTransition::Return(ReturnTransition::Reject),
        RequestStatus::Pending,
        RequestStatus::Rejected,
        StockEffect::None,
    ),
];

/// The lifecycle table of a workflow.
pub fn rules(kind: WorkflowKind) -> &'static [TransitionRule] {
    match kind {
        WorkflowKind::Supply => SUPPLY_RULES,
        WorkflowKind::Procurement => PROCUREMENT_RULES,
        WorkflowKind::Return => RETURN_RULES,
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MachineError {
    #[error("transition targets workflow '{requested}' but the request belongs to '{actual}'")]
    WrongWorkflow {
        requested: WorkflowKind,
        actual: WorkflowKind,
    },

    #[error("transition '{transition}' is not legal from status '{from}'")]
    IllegalTransition {
        transition: &'static str,
        from: RequestStatus,
    },
}

/// Resolve a transition against the owning workflow's table.
///
/// Pure lookup: the engine decides what to do with the returned rule. Every
/// illegal combination, including re-deciding a terminal request, lands on
/// [`MachineError::IllegalTransition`].
pub fn evaluate(
    kind: WorkflowKind,
    current: RequestStatus,
    transition: WorkflowTransition,
) -> Result<&'static TransitionRule, MachineError> {
    if transition.kind() != kind {
        return Err(MachineError::WrongWorkflow {
            requested: transition.kind(),
            actual: kind,
        });
    }
    rules(kind)
        .iter()
        .find(|rule| rule.transition == transition && rule.from == current)
        .ok_or(MachineError::IllegalTransition {
            transition: transition.name(),
            from: current,
        })
}

/// A status is terminal for a workflow when its table has no outgoing row.
pub fn is_terminal(kind: WorkflowKind, status: RequestStatus) -> bool {
    rules(kind).iter().all(|rule| rule.from != status)
}
