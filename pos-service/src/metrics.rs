use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct PosMetrics {
    registry: Registry,
    session_transitions: IntCounterVec,
    auth_rejections: IntCounterVec,
}

impl PosMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let session_transitions = IntCounterVec::new(
            Opts::new(
                "pos_session_transitions_total",
                "Shift open/close attempts grouped by outcome",
            ),
            &["transition", "outcome"],
        )?;
        registry.register(Box::new(session_transitions.clone()))?;

        let auth_rejections = IntCounterVec::new(
            Opts::new(
                "pos_auth_rejections_total",
                "Requests rejected by the auth gates, by error code",
            ),
            &["code"],
        )?;
        registry.register(Box::new(auth_rejections.clone()))?;

        Ok(Self {
            registry,
            session_transitions,
            auth_rejections,
        })
    }

    pub fn session_transition(&self, transition: &str, outcome: &str) {
        self.session_transitions
            .with_label_values(&[transition, outcome])
            .inc();
    }

    pub fn auth_rejection(&self, code: &str) {
        self.auth_rejections.with_label_values(&[code]).inc();
    }

    pub fn session_transition_count(&self, transition: &str, outcome: &str) -> u64 {
        self.session_transitions
            .with_label_values(&[transition, outcome])
            .get()
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}

/// Counts 401 responses produced by the auth gates.
pub async fn track_auth_rejections(
    State(metrics): State<Arc<PosMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if response.status() == StatusCode::UNAUTHORIZED {
        if let Some(code) = response
            .headers()
            .get("X-Error-Code")
            .and_then(|value| value.to_str().ok())
        {
            metrics.auth_rejection(code);
        }
    }
    response
}
