//! Pre-handler gates. Mount with `axum::middleware::from_fn_with_state`:
//!
//! ```ignore
//! Router::new()
//!     .route("/sessions", get(list_sessions))
//!     .route_layer(from_fn_with_state(verifier.clone(), require_organization));
//! ```
//!
//! A rejected request never reaches the handler.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::error::AuthError;
use crate::extractors::{token_from_headers, EmployeeContext, OrganizationContext};
use crate::policy::Capability;
use crate::roles::Role;
use crate::token::TokenVerifier;

/// Requires a valid organization token and exposes [`OrganizationContext`].
pub async fn require_organization(
    State(verifier): State<Arc<TokenVerifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = token_from_headers(req.headers())
        .and_then(|token| verifier.parse_organization_token(&token))
        .map_err(|err| reject(err, req.uri().path()))?;

    req.extensions_mut().insert(OrganizationContext::from(&claims));
    Ok(next.run(req).await)
}

/// Employee gate state: the verifier plus the route's allow-list.
#[derive(Clone)]
pub struct EmployeeGate {
    verifier: Arc<TokenVerifier>,
    allowed: &'static [Role],
}

impl EmployeeGate {
    pub fn new(verifier: Arc<TokenVerifier>, allowed: &'static [Role]) -> Self {
        Self { verifier, allowed }
    }

    pub fn for_capability(verifier: Arc<TokenVerifier>, capability: Capability) -> Self {
        Self::new(verifier, capability.allowed_roles())
    }

    pub fn allowed(&self) -> &'static [Role] {
        self.allowed
    }
}

/// Requires a valid employee token whose role is in the gate's allow-list and
/// exposes both [`EmployeeContext`] and [`OrganizationContext`].
pub async fn require_employee(
    State(gate): State<EmployeeGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = token_from_headers(req.headers())
        .and_then(|token| gate.verifier.parse_employee_token(&token))
        .map_err(|err| reject(err, req.uri().path()))?;

    if !claims.has_role(gate.allowed) {
        warn!(
            employee_id = claims.employee_id,
            role = %claims.role,
            allowed = ?gate.allowed,
            path = req.uri().path(),
            "employee role not permitted"
        );
        return Err(AuthError::InsufficientRole);
    }

    let ctx = EmployeeContext::from(&claims);
    req.extensions_mut().insert(ctx.organization());
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

fn reject(err: AuthError, path: &str) -> AuthError {
    warn!(code = err.code(), path, "request rejected by auth gate");
    err
}
