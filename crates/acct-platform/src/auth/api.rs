//! Auth API endpoints
//!
//! Local registration and login, plus the Google OAuth pair. A fresh
//! session token rides both in the response body and in the
//! `Authorization` response header.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::account::entity::{normalize_email, NewAccount};
use crate::auth::oauth_service::GoogleOAuthService;
use crate::auth::password_service::PasswordService;
use crate::auth::token_service::TokenService;
use crate::shared::api_common::MessageResponse;
use crate::shared::error::{AccountError, ErrorResponse, OAuthRejection, Result};
use crate::store::AccountStore;

#[derive(Clone)]
pub struct AuthState {
    pub store: Arc<dyn AccountStore>,
    pub token_service: Arc<TokenService>,
    pub password_service: Arc<PasswordService>,
    pub oauth: Arc<GoogleOAuthService>,
}

// Fields are optional so a missing field is a 400 validation error
// rather than a deserialization rejection.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = MessageResponse),
        (status = 400, description = "Missing fields", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "auth"
)]
async fn register(
    State(state): State<AuthState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let (name, email, password) = match (
        required(request.name),
        required(request.email),
        required(request.password),
    ) {
        (Some(n), Some(e), Some(p)) => (n, e, p),
        _ => {
            return Err(AccountError::validation(
                "Name, email, and password are required",
            ))
        }
    };

    let email = normalize_email(&email);
    let password_hash = state.password_service.hash_password(&password)?;

    let account = state
        .store
        .insert(NewAccount {
            name,
            email,
            password_hash: Some(password_hash),
            external_id: None,
        })
        .await?;

    let token = state.token_service.issue(&account)?;
    info!(account_id = %account.id, "Account registered");

    Ok((
        StatusCode::CREATED,
        [(header::AUTHORIZATION, format!("Bearer {token}"))],
        Json(MessageResponse::new("User registered successfully")),
    ))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 400, description = "Missing fields", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "auth"
)]
async fn login(
    State(state): State<AuthState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let (email, password) = match (required(request.email), required(request.password)) {
        (Some(e), Some(p)) => (e, p),
        _ => return Err(AccountError::validation("Email and password required")),
    };

    let email = normalize_email(&email);

    // Unknown email, OAuth-only account, and wrong password all
    // collapse into the same 401 so probing reveals nothing.
    let account = state
        .store
        .find_by_email(&email)
        .await?
        .ok_or(AccountError::InvalidCredentials)?;

    let hash = account
        .password_hash
        .as_deref()
        .ok_or(AccountError::InvalidCredentials)?;

    if !state.password_service.verify_password(&password, hash)? {
        return Err(AccountError::InvalidCredentials);
    }

    let token = state.token_service.issue(&account)?;
    info!(account_id = %account.id, "Login succeeded");

    Ok((
        [(header::AUTHORIZATION, format!("Bearer {token}"))],
        Json(SessionResponse { token }),
    ))
}

/// Redirect the browser to Google's consent screen.
async fn google_login(State(state): State<AuthState>) -> impl IntoResponse {
    let url = state.oauth.authorization_url();
    (StatusCode::FOUND, [(header::LOCATION, url)])
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
}

/// Complete the OAuth flow: exchange the code, verify the identity
/// token, find or create the account, issue a session.
async fn google_callback(
    State(state): State<AuthState>,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse> {
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AccountError::OAuthRejected(OAuthRejection::MissingCode))?;

    let id_token = state.oauth.exchange_code(&code).await?;
    let identity = state.oauth.resolve_identity(&id_token).await?;

    let email = identity
        .email
        .as_deref()
        .map(normalize_email)
        .ok_or(AccountError::OAuthRejected(
            OAuthRejection::InvalidIdentityToken,
        ))?;

    let account = match state.store.find_by_email(&email).await? {
        Some(existing) => existing,
        None => {
            let new_account = NewAccount {
                name: identity.name.clone().unwrap_or_else(|| email.clone()),
                email: email.clone(),
                password_hash: None,
                external_id: Some(identity.sub.clone()),
            };
            match state.store.insert(new_account).await {
                Ok(created) => {
                    info!(account_id = %created.id, "Account provisioned via OAuth");
                    created
                }
                // Lost a race with a concurrent callback; the row
                // exists now, so read it back.
                Err(AccountError::Duplicate { .. }) => state
                    .store
                    .find_by_email(&email)
                    .await?
                    .ok_or_else(|| AccountError::internal("account vanished after insert race"))?,
                Err(other) => return Err(other),
            }
        }
    };

    let token = state.token_service.issue(&account)?;
    info!(account_id = %account.id, "OAuth login succeeded");

    Ok((
        [(header::AUTHORIZATION, format!("Bearer {token}"))],
        Json(SessionResponse { token }),
    ))
}

/// Documented local-auth routes.
pub fn auth_router(state: AuthState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(register))
        .routes(routes!(login))
        .with_state(state)
}

/// Browser-facing OAuth routes; excluded from the API document.
pub fn google_router(state: AuthState) -> Router {
    Router::new()
        .route("/auth/google", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_tolerates_missing_fields() {
        let request: RegisterRequest = serde_json::from_str(r#"{"email":"a@b.c"}"#).unwrap();
        assert!(request.name.is_none());
        assert_eq!(request.email.as_deref(), Some("a@b.c"));
        assert!(request.password.is_none());
    }

    #[test]
    fn test_required_rejects_blank_values() {
        assert_eq!(required(Some("  ".to_string())), None);
        assert_eq!(required(Some("x".to_string())), Some("x".to_string()));
        assert_eq!(required(None), None);
    }

    #[test]
    fn test_session_response_shape() {
        let json = serde_json::to_value(SessionResponse {
            token: "t".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "token": "t" }));
    }
}
