use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::policy::Capability;

/// Employee roles carried in employee tokens. Matching is exact and
/// case-sensitive; there is no hierarchy between roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Director,
    Admin,
    Cashier,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Owner, Role::Director, Role::Admin, Role::Cashier];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Director => "director",
            Role::Admin => "admin",
            Role::Cashier => "cashier",
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        capability.allowed_roles().contains(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(Role::Owner),
            "director" => Ok(Role::Director),
            "admin" => Ok(Role::Admin),
            "cashier" => Ok(Role::Cashier),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_sensitive() {
        assert_eq!("owner".parse::<Role>(), Ok(Role::Owner));
        assert!("Owner".parse::<Role>().is_err());
        assert!("ADMIN".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).expect("serialize");
            assert_eq!(json, format!("\"{}\"", role.as_str()));
            let back: Role = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(back, role);
        }
        assert!(serde_json::from_str::<Role>("\"Cashier\"").is_err());
    }
}
