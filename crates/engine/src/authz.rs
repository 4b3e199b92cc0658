//! Engine-side authorization guard.
//!
//! This maps every engine operation onto its gated action, enforced at the
//! operation boundary (as the pipeline's authorization step), while keeping
//! the domain crates auth-agnostic. The static table itself lives in
//! `supplyhub-auth`; this module only decides which row an operation hits.

use supplyhub_auth::GatedAction;
use supplyhub_workflows::{
    ProcurementTransition, ReturnTransition, SupplyTransition, WorkflowKind, WorkflowTransition,
};

use crate::engine::DirectEdit;

/// The gate a submission of the given workflow kind must pass.
pub fn submission_gate(kind: WorkflowKind) -> GatedAction {
    match kind {
        WorkflowKind::Supply => GatedAction::SubmitSupplyRequest,
        WorkflowKind::Procurement => GatedAction::SubmitProcurementOrder,
        WorkflowKind::Return => GatedAction::SubmitReturnRequest,
    }
}

/// The gate a transition must pass.
///
/// Cancellations gate separately from decisions: a department head may cancel
/// a supply request but never decide one.
pub fn transition_gate(transition: WorkflowTransition) -> GatedAction {
    match transition {
        WorkflowTransition::Supply(SupplyTransition::Approve | SupplyTransition::Reject) => {
            GatedAction::DecideSupplyRequest
        }
        WorkflowTransition::Supply(SupplyTransition::Cancel) => GatedAction::CancelSupplyRequest,
        WorkflowTransition::Procurement(
            ProcurementTransition::MarkOrdered | ProcurementTransition::MarkReceived,
        ) => GatedAction::AdvanceProcurementOrder,
        WorkflowTransition::Procurement(ProcurementTransition::Cancel) => {
            GatedAction::CancelProcurementOrder
        }
        WorkflowTransition::Return(ReturnTransition::Approve | ReturnTransition::Reject) => {
            GatedAction::DecideReturnRequest
        }
    }
}

/// The gate a direct inventory edit must pass.
pub fn edit_gate(edit: &DirectEdit) -> GatedAction {
    match edit {
        DirectEdit::Add(_) => GatedAction::AddItem,
        DirectEdit::Edit { .. } => GatedAction::EditItem,
        DirectEdit::Delete { .. } => GatedAction::DeleteItem,
        DirectEdit::Import(_) => GatedAction::ImportItems,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_transition_maps_to_a_gate() {
        let cases = [
            (
                WorkflowTransition::Supply(SupplyTransition::Approve),
                GatedAction::DecideSupplyRequest,
            ),
            (
                WorkflowTransition::Supply(SupplyTransition::Reject),
                GatedAction::DecideSupplyRequest,
            ),
            (
                WorkflowTransition::Supply(SupplyTransition::Cancel),
                GatedAction::CancelSupplyRequest,
            ),
            (
                WorkflowTransition::Procurement(ProcurementTransition::MarkOrdered),
                GatedAction::AdvanceProcurementOrder,
            ),
            (
                WorkflowTransition::Procurement(ProcurementTransition::MarkReceived),
                GatedAction::AdvanceProcurementOrder,
            ),
            (
                WorkflowTransition::Procurement(ProcurementTransition::Cancel),
                GatedAction::CancelProcurementOrder,
            ),
            (
                WorkflowTransition::Return(ReturnTransition::Approve),
                GatedAction::DecideReturnRequest,
            ),
            (
                WorkflowTransition::Return(ReturnTransition::Reject),
                GatedAction::DecideReturnRequest,
            ),
        ];
        for (transition, expected) in cases {
            assert_eq!(transition_gate(transition), expected, "{transition}");
        }
    }

    #[test]
    fn submission_gates_follow_the_kind() {
        assert_eq!(
            submission_gate(WorkflowKind::Supply),
            GatedAction::SubmitSupplyRequest
        );
        assert_eq!(
            submission_gate(WorkflowKind::Procurement),
            GatedAction::SubmitProcurementOrder
        );
        assert_eq!(
            submission_gate(WorkflowKind::Return),
            GatedAction::SubmitReturnRequest
        );
    }
}
