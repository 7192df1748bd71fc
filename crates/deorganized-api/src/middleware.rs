use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use deorganized_types::api::{Claims, TokenKind};

use crate::auth::{AppState, decode_token};
use crate::error::ApiError;

/// Who is calling: the access-token claims, or `None` for anonymous requests.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Claims>);

impl Viewer {
    pub fn id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|c| c.sub)
    }
}

/// Extractor for handlers that need a signed-in user. Rejects with 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// Resolve the bearer token, if any, into a [`Viewer`] request extension.
/// A token that is present but invalid, expired or a refresh token is a 401
/// even on routes that allow anonymous access.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized))
        .transpose()?;

    let claims = match token {
        Some(token) => {
            let claims = decode_token(&state.auth.jwt_secret, token)?;
            if claims.kind != TokenKind::Access {
                return Err(ApiError::Unauthorized);
            }
            Some(claims)
        }
        None => None,
    };

    req.extensions_mut().insert(Viewer(claims));
    Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Viewer>()
            .and_then(|viewer| viewer.0.clone())
            .map(AuthUser)
            .ok_or(ApiError::Unauthorized)
    }
}
