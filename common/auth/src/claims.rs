use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// Verified claims of an organization-level token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationClaims {
    pub organization_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// Verified claims of an employee-level token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeClaims {
    pub organization_id: i64,
    pub outlet_id: i64,
    pub employee_id: i64,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl EmployeeClaims {
    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}

/// Wire payload of an organization token.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct OrganizationRepr {
    pub org_id: i64,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

/// Wire payload of an employee token. The role stays a string on the wire
/// so an unknown role surfaces as an invalid claim rather than a decode
/// error without context.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EmployeeRepr {
    pub org_id: i64,
    pub outlet_id: i64,
    pub employee_id: i64,
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

fn expiry(exp: i64) -> AuthResult<DateTime<Utc>> {
    Utc.timestamp_opt(exp, 0)
        .single()
        .ok_or_else(|| AuthError::InvalidToken(format!("invalid claim 'exp' with value '{exp}'")))
}

impl TryFrom<OrganizationRepr> for OrganizationClaims {
    type Error = AuthError;

    fn try_from(value: OrganizationRepr) -> AuthResult<Self> {
        Ok(Self {
            organization_id: value.org_id,
            expires_at: expiry(value.exp)?,
        })
    }
}

impl TryFrom<EmployeeRepr> for EmployeeClaims {
    type Error = AuthError;

    fn try_from(value: EmployeeRepr) -> AuthResult<Self> {
        let role = value.role.parse::<Role>().map_err(|err| {
            AuthError::InvalidToken(format!("invalid claim 'role': {err}"))
        })?;

        Ok(Self {
            organization_id: value.org_id,
            outlet_id: value.outlet_id,
            employee_id: value.employee_id,
            role,
            expires_at: expiry(value.exp)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee_repr(role: &str) -> EmployeeRepr {
        EmployeeRepr {
            org_id: 1,
            outlet_id: 2,
            employee_id: 3,
            role: role.to_string(),
            iss: "pos".into(),
            aud: "pos/employee".into(),
            exp: 1_900_000_000,
            iat: 1_800_000_000,
        }
    }

    #[test]
    fn employee_repr_converts() {
        let claims = EmployeeClaims::try_from(employee_repr("cashier")).expect("claims");
        assert_eq!(claims.organization_id, 1);
        assert_eq!(claims.outlet_id, 2);
        assert_eq!(claims.employee_id, 3);
        assert_eq!(claims.role, Role::Cashier);
        assert_eq!(claims.expires_at.timestamp(), 1_900_000_000);
        assert!(claims.has_role(&[Role::Admin, Role::Cashier]));
        assert!(!claims.has_role(&[Role::Owner]));
    }

    #[test]
    fn unknown_role_is_invalid_token() {
        let err = EmployeeClaims::try_from(employee_repr("Cashier")).expect_err("reject");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }
}
