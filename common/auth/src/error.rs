use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization token missing")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    ExpiredToken,
    #[error("no access rights")]
    InsufficientRole,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "AUTH_MISSING_TOKEN",
            AuthError::InvalidToken(_) => "AUTH_INVALID_TOKEN",
            AuthError::ExpiredToken => "AUTH_EXPIRED_TOKEN",
            AuthError::InsufficientRole => "AUTH_NO_ACCESS_RIGHTS",
            AuthError::Signing(_) => "AUTH_SIGNING",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::ExpiredSignature => Self::ExpiredToken,
            _ => Self::InvalidToken(value.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };

        let code = self.code();
        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        let mut resp = (status, Json(body)).into_response();
        resp.headers_mut()
            .insert("X-Error-Code", HeaderValue::from_static(code));
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn insufficient_role_renders_401_with_code_and_message() {
        let resp = AuthError::InsufficientRole.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get("X-Error-Code").unwrap(),
            "AUTH_NO_ACCESS_RIGHTS"
        );
        let bytes = to_bytes(resp.into_body(), 1024).await.expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["code"], "AUTH_NO_ACCESS_RIGHTS");
        assert_eq!(body["message"], "no access rights");
    }

    #[test]
    fn missing_and_insufficient_are_distinct_codes() {
        assert_ne!(
            AuthError::MissingToken.code(),
            AuthError::InsufficientRole.code()
        );
    }

    #[test]
    fn signing_failure_is_server_error() {
        let resp = AuthError::Signing("boom".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
