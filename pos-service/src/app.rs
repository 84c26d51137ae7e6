use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use axum::{
    extract::{FromRef, State},
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
        HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use common_auth::{
    require_employee, require_organization, Capability, EmployeeGate, TokenVerifier,
};
use common_http_errors::ApiError;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::metrics::{track_auth_rejections, PosMetrics};
use crate::session_handlers::{
    close_session, current_session, employee_status, last_closed_session, list_sessions,
    open_session,
};
use crate::sessions::SessionStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub verifier: Arc<TokenVerifier>,
    pub metrics: Arc<PosMetrics>,
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl FromRef<AppState> for Arc<PosMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(metrics): State<Arc<PosMetrics>>) -> Response {
    match metrics.render() {
        Ok(response) => response,
        Err(err) => ApiError::internal(err, None).into_response(),
    }
}

pub fn build_router(state: AppState) -> Router {
    let shift_gate = EmployeeGate::for_capability(state.verifier.clone(), Capability::WorkShift);

    let employee_routes = Router::new()
        .route("/sessions/open", post(open_session))
        .route("/sessions/close", post(close_session))
        .route("/sessions/current", get(current_session))
        .route("/sessions/last-closed", get(last_closed_session))
        .route_layer(from_fn_with_state(shift_gate, require_employee));

    let organization_routes = Router::new()
        .route("/sessions", get(list_sessions))
        .route("/employees/:employee_id/status", get(employee_status))
        .route_layer(from_fn_with_state(
            state.verifier.clone(),
            require_organization,
        ));

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .merge(employee_routes)
        .merge(organization_routes)
        .layer(from_fn_with_state(state.metrics.clone(), track_auth_rejections))
        .with_state(state)
}

pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let values = allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|err| anyhow!("Invalid CORS origin '{origin}': {err}"))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION, ORIGIN])
        .max_age(Duration::from_secs(12 * 60 * 60)))
}
