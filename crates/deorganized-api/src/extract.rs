//! `Json`, `Query` and `Path` extractors whose rejections are [`ApiError`]s,
//! so malformed input answers 400 with a JSON body like every other
//! validation failure.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::request::Parts,
};
use tracing::debug;

use crate::error::ApiError;

const REQUIRED: &str = "This field is required.";

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected JSON body: {}", rejection.body_text());
        input_error(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected query string: {}", rejection.body_text());
        input_error(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

/// A missing field becomes a per-field error; anything else is a plain 400.
fn input_error(message: String) -> ApiError {
    match missing_field(&message) {
        Some(field) => ApiError::field(field, REQUIRED),
        None => ApiError::BadRequest(message),
    }
}

/// Pull `name` out of serde's "missing field `name`" message.
fn missing_field(message: &str) -> Option<&str> {
    let (_, rest) = message.split_once("missing field `")?;
    rest.split_once('`').map(|(field, _)| field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn missing_field_is_found_in_serde_messages() {
        assert_eq!(
            missing_field(
                "Failed to deserialize the JSON body into the target type: missing field `password` at line 1 column 16"
            ),
            Some("password")
        );
        assert_eq!(
            missing_field("Failed to deserialize query string: missing field `target_id`"),
            Some("target_id")
        );
        assert_eq!(missing_field("expected value at line 1 column 1"), None);
    }

    #[test]
    fn missing_fields_become_field_errors() {
        let err = input_error("missing field `email`".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        match err {
            ApiError::Validation(errors) => {
                assert_eq!(serde_json::to_value(&errors).unwrap()["email"][0], REQUIRED);
            }
            other => panic!("expected a field error, got {other:?}"),
        }
    }

    #[test]
    fn other_input_errors_are_bad_requests() {
        let err = input_error("invalid type: string \"x\", expected a boolean".into());
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
