use serde::{Deserialize, Serialize};

use supplyhub_core::{DepartmentId, UserId};

use crate::Role;

/// A fully resolved acting principal.
///
/// Every engine call receives one of these explicitly. Construction is
/// intentionally decoupled from transport and storage: callers resolve the
/// actor from whatever session/auth mechanism they use and pass it in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    /// Department the actor belongs to, when the organization assigns one.
    /// Drives the department-scoped cancel rule for supply requests.
    pub department_id: Option<DepartmentId>,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            department_id: None,
        }
    }

    pub fn with_department(user_id: UserId, role: Role, department_id: DepartmentId) -> Self {
        Self {
            user_id,
            role,
            department_id: Some(department_id),
        }
    }
}
