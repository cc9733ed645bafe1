//! API Middleware
//!
//! The auth gate for protected routes: extracts the bearer token from
//! the Authorization header and verifies it against the token service.
//! A missing or malformed header is rejected before any verification
//! is attempted.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use crate::auth::token_service::{SessionClaims, TokenService};
use crate::shared::error::ErrorResponse;

/// Application state shared with the auth gate
#[derive(Clone)]
pub struct AppState {
    pub token_service: Arc<TokenService>,
}

/// Authenticated user extractor
///
/// Verifies the session token and exposes its claims to the handler.
pub struct Authenticated(pub SessionClaims);

impl std::ops::Deref for Authenticated {
    type Target = SessionClaims;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Rejection produced by the auth gate
pub struct AuthRejection {
    pub status: StatusCode,
    pub error: &'static str,
    pub message: &'static str,
}

impl AuthRejection {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: "UNAUTHORIZED",
            message: "Missing bearer token",
        }
    }

    fn invalid_token() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: "INVALID_TOKEN",
            message: "Invalid or expired token",
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.error.to_string(),
            message: self.message.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // AppState is injected into extensions by AuthLayer
        let app_state = parts.extensions.get::<AppState>().ok_or(AuthRejection {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "INTERNAL_ERROR",
            message: "Auth gate not configured",
        })?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer_token)
            .ok_or_else(AuthRejection::unauthorized)?;

        let claims = app_state
            .token_service
            .verify(token)
            .ok_or_else(AuthRejection::invalid_token)?;

        Ok(Authenticated(claims))
    }
}

// Layer that injects AppState into request extensions so the
// Authenticated extractor can reach the token service.
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

#[derive(Clone)]
pub struct AuthLayer {
    state: AppState,
}

impl AuthLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    state: AppState,
}

impl<S, B> Service<axum::http::Request<B>> for AuthMiddleware<S>
where
    S: Service<axum::http::Request<B>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        req.extensions_mut().insert(self.state.clone());

        let future = self.inner.call(req);
        Box::pin(async move { future.await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123"), None);
        assert_eq!(extract_bearer_token("Basic abc123"), None);
        assert_eq!(extract_bearer_token(""), None);
    }
}
