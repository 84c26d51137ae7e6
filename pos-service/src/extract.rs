//! Body and query extractors whose rejections use the `ApiError` envelope
//! instead of axum's plain-text defaults.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use common_http_errors::ApiError;
use serde::de::DeserializeOwned;

const INVALID_REQUEST: &str = "invalid_request";

fn invalid_request(message: impl Into<String>) -> ApiError {
    ApiError::bad_request(INVALID_REQUEST, message)
}

/// Required JSON body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(invalid_request(rejection.body_text())),
        }
    }
}

/// JSON body that may be left out. An empty body yields `T::default()`.
pub struct OptionalJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| invalid_request(rejection.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|err| invalid_request(format!("Failed to parse the request body as JSON: {err}")))
    }
}

pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(invalid_request(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Cash {
        amount: Option<f64>,
    }

    fn request(body: &'static str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/?amount=x")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn empty_optional_body_is_default() {
        let OptionalJson(cash) = OptionalJson::<Cash>::from_request(request(""), &())
            .await
            .unwrap();
        assert_eq!(cash, Cash::default());
    }

    #[tokio::test]
    async fn malformed_optional_body_is_rejected() {
        let err = OptionalJson::<Cash>::from_request(request("{not json"), &())
            .await
            .err()
            .expect("rejection");
        assert_eq!(err.code(), INVALID_REQUEST);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_query_uses_error_envelope() {
        let (mut parts, _) = request("").into_parts();
        let err = ApiQuery::<Cash>::from_request_parts(&mut parts, &())
            .await
            .err()
            .expect("rejection");
        assert_eq!(err.code(), INVALID_REQUEST);
    }
}
