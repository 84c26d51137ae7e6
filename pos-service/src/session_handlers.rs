use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::{EmployeeContext, OrganizationContext, Scope};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::extract::{ApiJson, ApiQuery, OptionalJson};
use crate::sessions::{NewSession, Session, SessionError, StorageError};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OutletQuery {
    pub outlet_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenSessionRequest {
    /// Defaults to the closing cash of the outlet's previous shift.
    pub cash_open: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CloseSessionRequest {
    pub cash_close: f64,
    pub date_close: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CurrentSessionResponse {
    pub open: bool,
    pub session: Option<Session>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeStatus {
    pub employee_id: i64,
    pub online: bool,
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AlreadyOpen { .. } => {
                ApiError::conflict("session_already_open", err.to_string())
            }
            SessionError::SessionNotFound { .. } => {
                ApiError::not_found("session_not_found", err.to_string())
            }
            SessionError::EmployeeNotFound { .. } => {
                ApiError::not_found("employee_not_found", err.to_string())
            }
            SessionError::CloseBeforeOpen { .. } => {
                ApiError::bad_request("invalid_close_date", err.to_string())
            }
            SessionError::Storage(StorageError::ForeignKey(detail)) => {
                warn!(detail = %detail, "foreign key violation");
                ApiError::conflict(
                    "referenced_record",
                    "record is referenced by other records",
                )
            }
            SessionError::Storage(storage @ StorageError::Retryable(_)) => {
                warn!(error = %storage, "retryable storage failure");
                ApiError::unavailable("storage_retryable", storage.to_string())
            }
            SessionError::Storage(storage @ StorageError::Backend(_)) => {
                let trace_id = Uuid::new_v4();
                error!(error = %storage, %trace_id, "storage failure");
                ApiError::Internal {
                    message: "storage failure".to_string(),
                    trace_id: Some(trace_id),
                }
            }
        }
    }
}

fn validate_cash(field: &'static str, amount: f64) -> ApiResult<()> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "invalid_cash_amount",
            format!("{field} must be a non-negative number"),
        ))
    }
}

/// Applies the optional `?outlet_id=` override and checks the outlet belongs
/// to the caller's organization.
async fn resolve_scope(
    state: &AppState,
    ctx: &EmployeeContext,
    requested: Option<i64>,
) -> ApiResult<Scope> {
    let scope = ctx.scope(requested);
    if scope.outlet_id != ctx.outlet_id
        && !state
            .store
            .outlet_in_organization(scope.outlet_id, scope.organization_id)
            .await?
    {
        return Err(ApiError::not_found(
            "outlet_not_found",
            format!("outlet {} not found", scope.outlet_id),
        ));
    }
    Ok(scope)
}

pub async fn open_session(
    State(state): State<AppState>,
    ctx: EmployeeContext,
    ApiQuery(query): ApiQuery<OutletQuery>,
    OptionalJson(body): OptionalJson<OpenSessionRequest>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let scope = resolve_scope(&state, &ctx, query.outlet_id).await?;

    let cash_open = match body.cash_open {
        Some(amount) => amount,
        None => state
            .store
            .last_closed_for_outlet(scope.outlet_id)
            .await?
            .and_then(|previous| previous.cash_close)
            .unwrap_or(0.0),
    };
    validate_cash("cash_open", cash_open)?;

    let result = state
        .store
        .open(NewSession {
            employee_id: ctx.employee_id,
            outlet_id: scope.outlet_id,
            org_id: scope.organization_id,
            cash_open,
        })
        .await;

    state
        .metrics
        .session_transition("open", outcome_label(&result));
    let session = result?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn close_session(
    State(state): State<AppState>,
    ctx: EmployeeContext,
    ApiJson(body): ApiJson<CloseSessionRequest>,
) -> ApiResult<Json<Session>> {
    validate_cash("cash_close", body.cash_close)?;
    let date_close = body.date_close.unwrap_or_else(Utc::now);

    let result = state
        .store
        .close(ctx.employee_id, date_close, body.cash_close)
        .await;

    state
        .metrics
        .session_transition("close", outcome_label(&result));
    Ok(Json(result?))
}

pub async fn current_session(
    State(state): State<AppState>,
    ctx: EmployeeContext,
) -> ApiResult<Json<CurrentSessionResponse>> {
    let session = state.store.current_for_employee(ctx.employee_id).await?;
    Ok(Json(CurrentSessionResponse {
        open: session.is_some(),
        session,
    }))
}

pub async fn last_closed_session(
    State(state): State<AppState>,
    ctx: EmployeeContext,
    ApiQuery(query): ApiQuery<OutletQuery>,
) -> ApiResult<Json<Option<Session>>> {
    let scope = resolve_scope(&state, &ctx, query.outlet_id).await?;
    let session = state.store.last_closed_for_outlet(scope.outlet_id).await?;
    Ok(Json(session))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    org: OrganizationContext,
) -> ApiResult<Json<Vec<Session>>> {
    let sessions = state
        .store
        .list_for_organization(org.organization_id)
        .await?;
    Ok(Json(sessions))
}

pub async fn employee_status(
    State(state): State<AppState>,
    org: OrganizationContext,
    Path(employee_id): Path<i64>,
) -> ApiResult<Json<EmployeeStatus>> {
    match state.store.find_employee(employee_id).await? {
        Some(employee) if employee.org_id == org.organization_id => Ok(Json(EmployeeStatus {
            employee_id: employee.id,
            online: employee.online,
        })),
        _ => Err(SessionError::EmployeeNotFound { employee_id }.into()),
    }
}

fn outcome_label<T>(result: &Result<T, SessionError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(SessionError::AlreadyOpen { .. }) => "already_open",
        Err(SessionError::SessionNotFound { .. } | SessionError::EmployeeNotFound { .. }) => {
            "not_found"
        }
        Err(SessionError::CloseBeforeOpen { .. }) => "invalid",
        Err(SessionError::Storage(_)) => "storage_error",
    }
}
