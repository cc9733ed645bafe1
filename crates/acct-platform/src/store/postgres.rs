//! PostgreSQL Account Store
//!
//! Relational backend over a sqlx pool. Every caller-supplied value
//! is a bound parameter; query text is constant.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info};

use crate::account::entity::{Account, AccountPatch, NewAccount};
use crate::shared::error::Result;
use crate::store::{AccountStore, StoreConfig};

const CREATE_USERS_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    password TEXT,
    external_id TEXT UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

#[derive(Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.url())
            .await?;

        info!(database = %config.database, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Idempotent schema bootstrap, safe to run on every startup.
    /// `password` is nullable so OAuth-only accounts can exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_USERS_TABLE).execute(&self.pool).await?;
        info!("users table is ready");
        Ok(())
    }

    fn parse_row(row: &PgRow) -> Account {
        Account {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            password_hash: row.get("password"),
            external_id: row.get("external_id"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        }
    }
}

#[async_trait::async_trait]
impl AccountStore for PostgresStore {
    async fn list(&self) -> Result<Vec<Account>> {
        let sql = "SELECT id, name, email, password, external_id, created_at \
                   FROM users ORDER BY created_at";
        debug!(query = sql, "Executing query");

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        let sql = "SELECT id, name, email, password, external_id, created_at \
                   FROM users WHERE id = $1";
        debug!(query = sql, "Executing query");

        let row = sqlx::query(sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(Self::parse_row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let sql = "SELECT id, name, email, password, external_id, created_at \
                   FROM users WHERE email = $1";
        debug!(query = sql, "Executing query");

        let row = sqlx::query(sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::parse_row))
    }

    async fn insert(&self, account: NewAccount) -> Result<Account> {
        let account = account.into_account();
        let sql = "INSERT INTO users (id, name, email, password, external_id, created_at) \
                   VALUES ($1, $2, $3, $4, $5, $6)";
        debug!(query = sql, "Executing query");

        sqlx::query(sql)
            .bind(&account.id)
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(&account.external_id)
            .bind(account.created_at)
            .execute(&self.pool)
            .await?;

        Ok(account)
    }

    async fn update(&self, id: &str, patch: AccountPatch) -> Result<()> {
        // COALESCE keeps the stored value for any field the caller
        // omitted; everything is bound, nothing is interpolated.
        let sql = "UPDATE users SET \
                   name = COALESCE($1, name), \
                   email = COALESCE($2, email), \
                   password = COALESCE($3, password) \
                   WHERE id = $4";
        debug!(query = sql, "Executing query");

        let result = sqlx::query(sql)
            .bind(&patch.name)
            .bind(&patch.email)
            .bind(&patch.password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(crate::shared::error::AccountError::not_found("User", id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let sql = "DELETE FROM users WHERE id = $1";
        debug!(query = sql, "Executing query");

        let result = sqlx::query(sql).bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(crate::shared::error::AccountError::not_found("User", id));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.pool.close().await;
        info!("Disconnected from PostgreSQL");
        Ok(())
    }
}
