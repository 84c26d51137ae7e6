use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use serde::Serialize;

use crate::claims::{EmployeeClaims, OrganizationClaims};
use crate::error::{AuthError, AuthResult};
use crate::policy::Capability;
use crate::roles::Role;

/// Organization scope placed in request extensions by either gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrganizationContext {
    pub organization_id: i64,
}

impl From<&OrganizationClaims> for OrganizationContext {
    fn from(claims: &OrganizationClaims) -> Self {
        Self {
            organization_id: claims.organization_id,
        }
    }
}

/// Employee scope placed in request extensions by the employee gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmployeeContext {
    pub organization_id: i64,
    pub outlet_id: i64,
    pub employee_id: i64,
    pub role: Role,
}

/// Organization/outlet pair a handler should filter its data by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub organization_id: i64,
    pub outlet_id: i64,
}

impl EmployeeContext {
    pub fn organization(&self) -> OrganizationContext {
        OrganizationContext {
            organization_id: self.organization_id,
        }
    }

    /// Resolves the outlet a request acts on. Roles with
    /// [`Capability::OverrideOutlet`] may name another outlet; everyone else
    /// is pinned to the outlet in their token. The caller still has to check
    /// that an overridden outlet belongs to the organization.
    pub fn scope(&self, requested_outlet: Option<i64>) -> Scope {
        let outlet_id = match requested_outlet {
            Some(outlet) if outlet != 0 && self.role.can(Capability::OverrideOutlet) => outlet,
            _ => self.outlet_id,
        };
        Scope {
            organization_id: self.organization_id,
            outlet_id,
        }
    }
}

impl From<&EmployeeClaims> for EmployeeContext {
    fn from(claims: &EmployeeClaims) -> Self {
        Self {
            organization_id: claims.organization_id,
            outlet_id: claims.outlet_id,
            employee_id: claims.employee_id,
            role: claims.role,
        }
    }
}

// Both contexts are only ever inserted by the gates; a handler mounted
// without its gate sees a missing token.

#[async_trait]
impl<S> FromRequestParts<S> for OrganizationContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OrganizationContext>()
            .copied()
            .ok_or(AuthError::MissingToken)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for EmployeeContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<EmployeeContext>()
            .copied()
            .ok_or(AuthError::MissingToken)
    }
}

/// Pulls the token out of the `Authorization` header. Accepts both the raw
/// token and the `Bearer <token>` form.
pub fn token_from_headers(headers: &HeaderMap) -> AuthResult<String> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;

    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidToken("authorization header is not valid UTF-8".into()))?
        .trim();

    // `raw` is already trimmed, so a blank bearer value arrives as "Bearer".
    let token = match raw.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => raw,
    };

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(token.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    fn ctx(role: Role) -> EmployeeContext {
        EmployeeContext {
            organization_id: 1,
            outlet_id: 2,
            employee_id: 3,
            role,
        }
    }

    #[test]
    fn accepts_bearer_and_raw_tokens() {
        assert_eq!(token_from_headers(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(token_from_headers(&headers("abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(token_from_headers(&headers("Bearer\tabc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_or_blank_header_is_missing_token() {
        let err = token_from_headers(&HeaderMap::new()).expect_err("missing");
        assert!(matches!(err, AuthError::MissingToken));

        let err = token_from_headers(&headers("Bearer    ")).expect_err("blank");
        assert!(matches!(err, AuthError::MissingToken));

        let err = token_from_headers(&headers("Bearer")).expect_err("bare scheme");
        assert!(matches!(err, AuthError::MissingToken));
    }

    #[test]
    fn owner_can_override_outlet() {
        let scope = ctx(Role::Owner).scope(Some(9));
        assert_eq!(scope, Scope { organization_id: 1, outlet_id: 9 });
    }

    #[test]
    fn zero_or_absent_override_keeps_token_outlet() {
        assert_eq!(ctx(Role::Director).scope(Some(0)).outlet_id, 2);
        assert_eq!(ctx(Role::Director).scope(None).outlet_id, 2);
    }

    #[test]
    fn cashier_override_is_ignored() {
        assert_eq!(ctx(Role::Cashier).scope(Some(9)).outlet_id, 2);
        assert_eq!(ctx(Role::Admin).scope(Some(9)).outlet_id, 2);
    }
}
