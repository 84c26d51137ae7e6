#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header::AUTHORIZATION, header::CONTENT_TYPE, Request};
use axum::response::Response;
use axum::Router;
use common_auth::{JwtConfig, Role, TokenIssuer, TokenVerifier};
use pos_service::metrics::PosMetrics;
use pos_service::{build_router, AppState, InMemorySessionStore};
use serde_json::Value;

pub const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
pub const ISSUER: &str = "pos-ninja-test";

pub const ORG: i64 = 1;
pub const OTHER_ORG: i64 = 2;
pub const OUTLET: i64 = 10;
pub const SECOND_OUTLET: i64 = 11;
pub const FOREIGN_OUTLET: i64 = 20;
pub const CASHIER: i64 = 100;
pub const DIRECTOR: i64 = 101;
pub const FOREIGN_EMPLOYEE: i64 = 200;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemorySessionStore>,
    pub metrics: Arc<PosMetrics>,
    pub issuer: TokenIssuer,
}

/// Two outlets in one organization plus one outlet and employee in another.
pub fn seeded_store() -> InMemorySessionStore {
    InMemorySessionStore::new()
        .with_outlet(OUTLET, ORG)
        .with_outlet(SECOND_OUTLET, ORG)
        .with_outlet(FOREIGN_OUTLET, OTHER_ORG)
        .with_employee(CASHIER, ORG, OUTLET, "Casey", Role::Cashier)
        .with_employee(DIRECTOR, ORG, OUTLET, "Dana", Role::Director)
        .with_employee(FOREIGN_EMPLOYEE, OTHER_ORG, FOREIGN_OUTLET, "Frankie", Role::Owner)
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig::new(SECRET.to_vec(), ISSUER)
}

pub fn test_app() -> TestApp {
    let store = Arc::new(seeded_store());
    let metrics = Arc::new(PosMetrics::new().expect("metrics"));
    let state = AppState {
        store: store.clone(),
        verifier: Arc::new(TokenVerifier::new(jwt_config())),
        metrics: metrics.clone(),
    };
    TestApp {
        router: build_router(state),
        store,
        metrics,
        issuer: TokenIssuer::new(jwt_config()),
    }
}

impl TestApp {
    pub fn employee_token(&self, employee_id: i64, role: Role) -> String {
        self.issuer
            .issue_employee_token(ORG, OUTLET, employee_id, role)
            .expect("employee token")
    }

    pub fn organization_token(&self, organization_id: i64) -> String {
        self.issuer
            .issue_organization_token(organization_id)
            .expect("organization token")
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub fn post_empty(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}
