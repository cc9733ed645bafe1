//! Account domain: the entity and its management endpoints.

pub mod api;
pub mod entity;

pub use api::{users_router, UsersState};
pub use entity::{normalize_email, Account, AccountPatch, NewAccount};
