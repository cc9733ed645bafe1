//! Account platform
//!
//! Core of the account service: the credential store with its two
//! backends, password hashing, session and identity tokens, the Google
//! OAuth exchange, and the HTTP API surface.

pub mod account;
pub mod auth;
pub mod shared;
pub mod store;

pub use account::{users_router, Account, AccountPatch, NewAccount, UsersState};
pub use auth::{
    auth_router, google_router, Argon2Config, AuthState, GoogleOAuthConfig, GoogleOAuthService,
    PasswordService, SessionClaims, TokenConfig, TokenService,
};
pub use shared::error::{AccountError, Result};
pub use shared::middleware::{AppState, AuthLayer, Authenticated};
pub use store::{
    AccountStore, MongoStore, PostgresStore, RetryPolicy, StoreBackend, StoreConfig, StoreManager,
};
