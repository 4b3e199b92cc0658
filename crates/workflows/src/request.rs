use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use supplyhub_core::{DepartmentId, ItemId, RequestId, SupplierId, UserId};

use crate::machine::{is_terminal, RequestStatus, TransitionRule, WorkflowKind};

/// One requested item on a workflow request.
///
/// `unit_price` is meaningful (and required) on procurement lines;
/// `condition_notes` on return lines. Lines are fixed at submission and never
/// edited afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub item_id: ItemId,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_notes: Option<String>,
}

impl LineItem {
    pub fn new(item_id: ItemId, quantity: i64) -> Self {
        Self {
            item_id,
            quantity,
            unit_price: None,
            condition_notes: None,
        }
    }

    pub fn priced(item_id: ItemId, quantity: i64, unit_price: f64) -> Self {
        Self {
            item_id,
            quantity,
            unit_price: Some(unit_price),
            condition_notes: None,
        }
    }
}

/// Kind-specific fields of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestDetail {
    Supply {
        justification: String,
    },
    Procurement {
        supplier_id: SupplierId,
        /// Sum of quantity x unit price over the lines, fixed at submission.
        total_amount: f64,
    },
    Return {
        reason: String,
        /// The approved supply request the goods came from.
        supply_request_id: RequestId,
    },
}

impl RequestDetail {
    pub fn kind(&self) -> WorkflowKind {
        match self {
            RequestDetail::Supply { .. } => WorkflowKind::Supply,
            RequestDetail::Procurement { .. } => WorkflowKind::Procurement,
            RequestDetail::Return { .. } => WorkflowKind::Return,
        }
    }
}

/// A workflow request: one shape shared by all three workflows.
///
/// `version` is maintained by the store, like on inventory items. Requests
/// are never deleted; terminal ones simply stop matching any lifecycle row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub id: RequestId,
    pub requester_id: UserId,
    /// Department of the requester at submission time; drives the
    /// department-scoped cancel rule.
    pub department_id: Option<DepartmentId>,
    pub status: RequestStatus,
    pub lines: Vec<LineItem>,
    pub detail: RequestDetail,
    pub created_at: DateTime<Utc>,
    /// Set when the request reaches a terminal state.
    pub decided_at: Option<DateTime<Utc>>,
    /// Who applied the most recent transition.
    pub processed_by: Option<UserId>,
    pub processor_note: Option<String>,
    pub version: u64,
}

impl WorkflowRequest {
    pub fn kind(&self) -> WorkflowKind {
        self.detail.kind()
    }

    /// Build the pending request a validated submission produces.
    pub fn from_submission(
        id: RequestId,
        requester_id: UserId,
        department_id: Option<DepartmentId>,
        submission: Submission,
    ) -> Self {
        let detail = match submission.detail {
            SubmissionDetail::Supply { justification } => RequestDetail::Supply { justification },
            SubmissionDetail::Procurement { supplier_id } => {
                let total_amount = submission
                    .lines
                    .iter()
                    .map(|line| line.quantity as f64 * line.unit_price.unwrap_or(0.0))
                    .sum();
                RequestDetail::Procurement {
                    supplier_id,
                    total_amount,
                }
            }
            SubmissionDetail::Return {
                reason,
                supply_request_id,
            } => RequestDetail::Return {
                reason,
                supply_request_id,
            },
        };

        Self {
            id,
            requester_id,
            department_id,
            status: RequestStatus::Pending,
            lines: submission.lines,
            detail,
            created_at: submission.occurred_at,
            decided_at: None,
            processed_by: None,
            processor_note: None,
            version: 1,
        }
    }

    /// Apply a resolved lifecycle row: new status plus processing fields.
    /// `decided_at` is stamped when the row lands in a terminal state.
    pub fn apply_rule(
        &self,
        rule: &TransitionRule,
        processor: UserId,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let decided_at = if is_terminal(self.kind(), rule.to) {
            Some(occurred_at)
        } else {
            self.decided_at
        };
        Self {
            status: rule.to,
            decided_at,
            processed_by: Some(processor),
            processor_note: note,
            ..self.clone()
        }
    }
}

/// Caller payload for a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionPayload {
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TransitionPayload {
    pub fn at(occurred_at: DateTime<Utc>) -> Self {
        Self {
            note: None,
            occurred_at,
        }
    }

    pub fn with_note(note: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            note: Some(note.into()),
            occurred_at,
        }
    }
}

/// Caller payload for a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub lines: Vec<LineItem>,
    pub detail: SubmissionDetail,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionDetail {
    Supply {
        justification: String,
    },
    Procurement {
        supplier_id: SupplierId,
    },
    Return {
        reason: String,
        supply_request_id: RequestId,
    },
}

impl SubmissionDetail {
    pub fn kind(&self) -> WorkflowKind {
        match self {
            SubmissionDetail::Supply { .. } => WorkflowKind::Supply,
            SubmissionDetail::Procurement { .. } => WorkflowKind::Procurement,
            SubmissionDetail::Return { .. } => WorkflowKind::Return,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("a request needs at least one line item")]
    EmptyLines,

    #[error("validation failed: {0}")]
    Invalid(String),
}

impl Submission {
    /// Field-level checks every submission must pass before the engine loads
    /// any state.
    pub fn validate(&self) -> Result<(), SubmissionError> {
        if self.lines.is_empty() {
            return Err(SubmissionError::EmptyLines);
        }
        for line in &self.lines {
            if line.quantity <= 0 {
                return Err(SubmissionError::Invalid(
                    "line quantity must be positive".to_string(),
                ));
            }
            if line.unit_price.is_some_and(|price| price < 0.0) {
                return Err(SubmissionError::Invalid(
                    "line unit price cannot be negative".to_string(),
                ));
            }
        }
        match &self.detail {
            SubmissionDetail::Supply { justification } => {
                if justification.trim().is_empty() {
                    return Err(SubmissionError::Invalid(
                        "justification cannot be empty".to_string(),
                    ));
                }
            }
            SubmissionDetail::Procurement { .. } => {
                if self.lines.iter().any(|line| line.unit_price.is_none()) {
                    return Err(SubmissionError::Invalid(
                        "procurement lines require a unit price".to_string(),
                    ));
                }
            }
            SubmissionDetail::Return { reason, .. } => {
                if reason.trim().is_empty() {
                    return Err(SubmissionError::Invalid(
                        "reason cannot be empty".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{evaluate, SupplyTransition, WorkflowTransition};

    fn test_time() -> DateTime<Utc> {
        "2025-06-01T08:00:00Z".parse().unwrap()
    }

    fn supply_submission(lines: Vec<LineItem>) -> Submission {
        Submission {
            lines,
            detail: SubmissionDetail::Supply {
                justification: "quarterly restock".to_string(),
            },
            occurred_at: test_time(),
        }
    }

    #[test]
    fn submission_without_lines_is_rejected() {
        let err = supply_submission(vec![]).validate().unwrap_err();
        assert_eq!(err, SubmissionError::EmptyLines);
    }

    #[test]
    fn submission_rejects_non_positive_quantities() {
        let sub = supply_submission(vec![LineItem::new(ItemId::new(), 0)]);
        assert!(matches!(sub.validate(), Err(SubmissionError::Invalid(_))));
    }

    #[test]
    fn procurement_lines_need_prices() {
        let sub = Submission {
            lines: vec![LineItem::new(ItemId::new(), 5)],
            detail: SubmissionDetail::Procurement {
                supplier_id: SupplierId::new(),
            },
            occurred_at: test_time(),
        };
        match sub.validate().unwrap_err() {
            SubmissionError::Invalid(msg) => assert!(msg.contains("unit price")),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn from_submission_builds_a_pending_request() {
        let requester = UserId::new();
        let dept = DepartmentId::new();
        let sub = supply_submission(vec![LineItem::new(ItemId::new(), 5)]);

        let request = WorkflowRequest::from_submission(RequestId::new(), requester, Some(dept), sub);
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.kind(), WorkflowKind::Supply);
        assert_eq!(request.requester_id, requester);
        assert_eq!(request.department_id, Some(dept));
        assert_eq!(request.version, 1);
        assert!(request.decided_at.is_none());
    }

    #[test]
    fn procurement_total_is_summed_from_lines() {
        let sub = Submission {
            lines: vec![
                LineItem::priced(ItemId::new(), 4, 25.0),
                LineItem::priced(ItemId::new(), 2, 10.5),
            ],
            detail: SubmissionDetail::Procurement {
                supplier_id: SupplierId::new(),
            },
            occurred_at: test_time(),
        };
        sub.validate().unwrap();

        let request =
            WorkflowRequest::from_submission(RequestId::new(), UserId::new(), None, sub);
        match request.detail {
            RequestDetail::Procurement { total_amount, .. } => {
                assert!((total_amount - 121.0).abs() < f64::EPSILON);
            }
            other => panic!("expected procurement detail, got {other:?}"),
        }
    }

    #[test]
    fn apply_rule_stamps_terminal_decisions() {
        let sub = supply_submission(vec![LineItem::new(ItemId::new(), 5)]);
        let request =
            WorkflowRequest::from_submission(RequestId::new(), UserId::new(), None, sub);

        let rule = evaluate(
            WorkflowKind::Supply,
            RequestStatus::Pending,
            WorkflowTransition::Supply(SupplyTransition::Reject),
        )
        .unwrap();

        let decider = UserId::new();
        let decided = request.apply_rule(rule, decider, Some("no budget".to_string()), test_time());
        assert_eq!(decided.status, RequestStatus::Rejected);
        assert_eq!(decided.decided_at, Some(test_time()));
        assert_eq!(decided.processed_by, Some(decider));
        assert_eq!(decided.processor_note.as_deref(), Some("no budget"));
        // Lines travel unchanged through decisions.
        assert_eq!(decided.lines, request.lines);
    }
}
