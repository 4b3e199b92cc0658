use thiserror::Error;

use supplyhub_core::{DepartmentId, UserId};

use crate::{Actor, Role};

/// An action the gate decides on.
///
/// One variant per mutating operation the engine exposes. Submissions,
/// decisions and direct edits all pass through here before any state is
/// loaded or touched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GatedAction {
    SubmitSupplyRequest,
    DecideSupplyRequest,
    CancelSupplyRequest,
    SubmitProcurementOrder,
    AdvanceProcurementOrder,
    CancelProcurementOrder,
    SubmitReturnRequest,
    DecideReturnRequest,
    AddItem,
    EditItem,
    DeleteItem,
    ImportItems,
}

impl GatedAction {
    /// All gated actions, in a stable order (used by exhaustive policy tests).
    pub const ALL: [GatedAction; 12] = [
        GatedAction::SubmitSupplyRequest,
        GatedAction::DecideSupplyRequest,
        GatedAction::CancelSupplyRequest,
        GatedAction::SubmitProcurementOrder,
        GatedAction::AdvanceProcurementOrder,
        GatedAction::CancelProcurementOrder,
        GatedAction::SubmitReturnRequest,
        GatedAction::DecideReturnRequest,
        GatedAction::AddItem,
        GatedAction::EditItem,
        GatedAction::DeleteItem,
        GatedAction::ImportItems,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GatedAction::SubmitSupplyRequest => "supply_request.submit",
            GatedAction::DecideSupplyRequest => "supply_request.decide",
            GatedAction::CancelSupplyRequest => "supply_request.cancel",
            GatedAction::SubmitProcurementOrder => "procurement_order.submit",
            GatedAction::AdvanceProcurementOrder => "procurement_order.advance",
            GatedAction::CancelProcurementOrder => "procurement_order.cancel",
            GatedAction::SubmitReturnRequest => "return_request.submit",
            GatedAction::DecideReturnRequest => "return_request.decide",
            GatedAction::AddItem => "inventory.add",
            GatedAction::EditItem => "inventory.edit",
            GatedAction::DeleteItem => "inventory.delete",
            GatedAction::ImportItems => "inventory.import",
        }
    }
}

impl core::fmt::Display for GatedAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl AuthzError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

/// The static permission table.
///
/// Admin holds every action. Supply personnel run the supply-request desk and
/// may correct item records, but have no reach into procurement, returns
/// decisions, item creation/deletion or imports. Department heads only submit
/// (and cancel their own department's supply requests). Auditors read; they
/// mutate nothing.
pub fn permits(role: Role, action: GatedAction) -> bool {
    use GatedAction::*;

    match role {
        Role::Admin => true,
        Role::SupplyPersonnel => matches!(
            action,
            SubmitSupplyRequest | DecideSupplyRequest | SubmitReturnRequest | EditItem
        ),
        Role::DepartmentHead => matches!(
            action,
            SubmitSupplyRequest | CancelSupplyRequest | SubmitReturnRequest
        ),
        Role::Auditor => false,
    }
}

/// Authorize an actor for a gated action.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(actor: &Actor, action: GatedAction) -> Result<(), AuthzError> {
    if permits(actor.role, action) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(format!(
            "role '{}' may not perform '{}'",
            actor.role, action
        )))
    }
}

/// Contextual rule: cancelling a supply request is limited to the head of the
/// requesting department, or an admin. Checked in addition to [`authorize`].
pub fn check_cancel_department(
    actor: &Actor,
    request_department: Option<DepartmentId>,
) -> Result<(), AuthzError> {
    if actor.role == Role::Admin {
        return Ok(());
    }
    match (actor.department_id, request_department) {
        (Some(own), Some(requesting)) if own == requesting => Ok(()),
        _ => Err(AuthzError::forbidden(
            "supply requests may only be cancelled by their own department's head",
        )),
    }
}

/// Contextual rule: a return must reference the submitter's own supply
/// request; admins may reference anyone's.
pub fn check_return_reference(actor: &Actor, requester: UserId) -> Result<(), AuthzError> {
    if actor.role == Role::Admin || actor.user_id == requester {
        Ok(())
    } else {
        Err(AuthzError::forbidden(
            "returns may only reference the submitter's own supply requests",
        ))
    }
}
