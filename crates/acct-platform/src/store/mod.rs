//! Credential Store
//!
//! Backend-agnostic CRUD over account records. Two production
//! backends sit behind the [`AccountStore`] trait: a relational one
//! (Postgres via sqlx) and a document one (MongoDB). Which backend a
//! process uses is a configuration choice; callers see one contract.

pub mod config;
pub mod connect;
pub mod mongo;
pub mod postgres;

pub use config::{StoreBackend, StoreConfig};
pub use connect::{RetryPolicy, StoreManager};
pub use mongo::MongoStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;

use crate::account::entity::{Account, AccountPatch, NewAccount};
use crate::shared::error::Result;

/// CRUD contract every store backend implements.
///
/// All user-supplied values reach the backend as bound parameters or
/// typed filter documents; implementations must never splice caller
/// input into query text.
#[async_trait]
pub trait AccountStore: Send + Sync + std::fmt::Debug {
    async fn list(&self) -> Result<Vec<Account>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Persist a new account and return it with the generated id.
    /// A duplicate email surfaces as `AccountError::Duplicate`.
    async fn insert(&self, account: NewAccount) -> Result<Account>;

    /// Apply only the fields present in `patch`; absent fields keep
    /// their stored value. Unknown `id` surfaces `NotFound`.
    async fn update(&self, id: &str, patch: AccountPatch) -> Result<()>;

    /// Remove the account. Unknown `id` surfaces `NotFound` rather
    /// than succeeding silently.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Release the underlying connection resources.
    async fn disconnect(&self) -> Result<()>;
}
