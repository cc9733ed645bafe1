//! User management endpoints
//!
//! Bearer-gated CRUD over accounts. Password hashes never leave the
//! service; responses expose only id, name, and email.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::account::entity::{normalize_email, Account, AccountPatch};
use crate::auth::password_service::PasswordService;
use crate::shared::api_common::MessageResponse;
use crate::shared::error::{AccountError, ErrorResponse, Result};
use crate::shared::middleware::Authenticated;
use crate::store::AccountStore;

#[derive(Clone)]
pub struct UsersState {
    pub store: Arc<dyn AccountStore>,
    pub password_service: Arc<PasswordService>,
}

/// Public view of an account.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<Account> for UserResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsersListResponse {
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// List all users
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = UsersListResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn list_users(
    _auth: Authenticated,
    State(state): State<UsersState>,
) -> Result<Json<UsersListResponse>> {
    let users = state
        .store
        .list()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();
    Ok(Json(UsersListResponse { users }))
}

/// Fetch one user by id
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = UserEnvelope),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn get_user(
    _auth: Authenticated,
    State(state): State<UsersState>,
    Path(id): Path<String>,
) -> Result<Json<UserEnvelope>> {
    let account = state
        .store
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AccountError::not_found("User", &id))?;

    Ok(Json(UserEnvelope {
        user: account.into(),
    }))
}

/// Update a user's name, email, or password
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = MessageResponse),
        (status = 400, description = "Empty update", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn update_user(
    _auth: Authenticated,
    State(state): State<UsersState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<MessageResponse>> {
    let password_hash = match request.password.filter(|p| !p.is_empty()) {
        Some(password) => Some(state.password_service.hash_password(&password)?),
        None => None,
    };

    let patch = AccountPatch {
        name: request.name.filter(|n| !n.trim().is_empty()),
        email: request
            .email
            .filter(|e| !e.trim().is_empty())
            .map(|e| normalize_email(&e)),
        password_hash,
    };

    if patch.is_empty() {
        return Err(AccountError::validation("No fields to update"));
    }

    state.store.update(&id, patch).await?;
    info!(account_id = %id, "Account updated");

    Ok(Json(MessageResponse::new("User updated successfully")))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn delete_user(
    _auth: Authenticated,
    State(state): State<UsersState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.store.delete(&id).await?;
    info!(account_id = %id, "Account deleted");

    Ok(Json(MessageResponse::new("User deleted successfully")))
}

pub fn users_router(state: UsersState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_users))
        .routes(routes!(get_user, update_user, delete_user))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::entity::NewAccount;

    #[test]
    fn test_user_response_drops_secret_fields() {
        let account = NewAccount {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: Some("$argon2id$stub".to_string()),
            external_id: Some("sub-1".to_string()),
        }
        .into_account();

        let json = serde_json::to_value(UserResponse::from(account)).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert!(object.contains_key("id"));
        assert!(object.contains_key("name"));
        assert!(object.contains_key("email"));
    }
}
