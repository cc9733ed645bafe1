//! Authentication: password hashing, session tokens, OAuth exchange,
//! and the HTTP endpoints that drive them.

pub mod api;
pub mod oauth_service;
pub mod password_service;
pub mod token_service;

pub use api::{auth_router, google_router, AuthState};
pub use oauth_service::{GoogleOAuthConfig, GoogleOAuthService};
pub use password_service::{Argon2Config, PasswordService};
pub use token_service::{SessionClaims, TokenConfig, TokenService};
