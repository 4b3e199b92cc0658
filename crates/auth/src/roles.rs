use core::str::FromStr;

use serde::{Deserialize, Serialize};

use supplyhub_core::DomainError;

/// Role held by an acting user.
///
/// Roles form a closed set: the authorization gate is a total table over
/// (role, action), so an open-ended role type would leave holes in it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    SupplyPersonnel,
    DepartmentHead,
    Auditor,
}

impl Role {
    /// All roles, in a stable order (used by exhaustive policy tests).
    pub const ALL: [Role; 4] = [
        Role::Admin,
        Role::SupplyPersonnel,
        Role::DepartmentHead,
        Role::Auditor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::SupplyPersonnel => "supply_personnel",
            Role::DepartmentHead => "department_head",
            Role::Auditor => "auditor",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "supply_personnel" => Ok(Role::SupplyPersonnel),
            "department_head" => Ok(Role::DepartmentHead),
            "auditor" => Ok(Role::Auditor),
            other => Err(DomainError::validation(format!("unknown role: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Role::SupplyPersonnel).unwrap();
        assert_eq!(json, "\"supply_personnel\"");
    }
}
