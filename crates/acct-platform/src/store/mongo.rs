//! MongoDB Account Store
//!
//! Document backend mirroring the relational one. Uniqueness of the
//! email (and of the external subject id, when present) is enforced by
//! indexes created at startup, so duplicate writes surface the same
//! `Duplicate` error as the Postgres backend.

use bson::doc;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::account::entity::{Account, AccountPatch, NewAccount};
use crate::shared::error::{AccountError, Result};
use crate::store::{AccountStore, StoreConfig};

const COLLECTION_NAME: &str = "users";

/// Wire shape of an account document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_id: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<Account> for AccountDocument {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            password: account.password_hash,
            external_id: account.external_id,
            created_at: account.created_at,
        }
    }
}

impl From<AccountDocument> for Account {
    fn from(doc: AccountDocument) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            email: doc.email,
            password_hash: doc.password,
            external_id: doc.external_id,
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug)]
pub struct MongoStore {
    client: Client,
    collection: Collection<AccountDocument>,
}

impl MongoStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.url()).await?;
        let database = client.database(&config.database);

        // Force a round trip so connection failures surface here, not
        // on the first request.
        database.run_command(doc! { "ping": 1 }).await?;

        let collection = database.collection::<AccountDocument>(COLLECTION_NAME);
        info!(database = %config.database, "Connected to MongoDB");

        Ok(Self { client, collection })
    }

    /// Idempotent index bootstrap. Email is unique; the external
    /// subject id is unique only among documents that carry one.
    pub async fn ensure_schema(&self) -> Result<()> {
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        let external_id_index = IndexModel::builder()
            .keys(doc! { "externalId": 1 })
            .options(IndexOptions::builder().unique(true).sparse(true).build())
            .build();

        self.collection
            .create_indexes(vec![email_index, external_id_index])
            .await?;

        info!("users collection indexes are ready");
        Ok(())
    }
}

#[async_trait::async_trait]
impl AccountStore for MongoStore {
    async fn list(&self) -> Result<Vec<Account>> {
        debug!(collection = COLLECTION_NAME, "Listing accounts");

        let cursor = self.collection.find(doc! {}).await?;
        let documents: Vec<AccountDocument> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(Account::from).collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        let found = self.collection.find_one(doc! { "_id": id }).await?;
        Ok(found.map(Account::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let found = self.collection.find_one(doc! { "email": email }).await?;
        Ok(found.map(Account::from))
    }

    async fn insert(&self, account: NewAccount) -> Result<Account> {
        let account = account.into_account();
        let document = AccountDocument::from(account.clone());

        self.collection.insert_one(document).await?;
        Ok(account)
    }

    async fn update(&self, id: &str, patch: AccountPatch) -> Result<()> {
        let mut set = doc! {};
        if let Some(name) = patch.name {
            set.insert("name", name);
        }
        if let Some(email) = patch.email {
            set.insert("email", email);
        }
        if let Some(password) = patch.password_hash {
            set.insert("password", password);
        }

        // An empty $set is rejected by the server; nothing to apply,
        // so only the existence check remains.
        if set.is_empty() {
            return match self.find_by_id(id).await? {
                Some(_) => Ok(()),
                None => Err(AccountError::not_found("User", id)),
            };
        }

        let result = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$set": set })
            .await?;

        if result.matched_count == 0 {
            return Err(AccountError::not_found("User", id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;

        if result.deleted_count == 0 {
            return Err(AccountError::not_found("User", id));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        info!("Disconnected from MongoDB");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_round_trip() {
        let account = NewAccount {
            name: "Test".to_string(),
            email: "t@example.com".to_string(),
            password_hash: None,
            external_id: Some("google-sub-1".to_string()),
        }
        .into_account();

        let doc = AccountDocument::from(account.clone());
        let back = Account::from(doc);

        assert_eq!(back.id, account.id);
        assert_eq!(back.email, account.email);
        assert_eq!(back.external_id, account.external_id);
        assert!(back.password_hash.is_none());
    }

    #[test]
    fn test_document_field_names() {
        let doc = AccountDocument::from(
            NewAccount {
                name: "Test".to_string(),
                email: "t@example.com".to_string(),
                password_hash: Some("$argon2id$stub".to_string()),
                external_id: Some("sub".to_string()),
            }
            .into_account(),
        );

        let value = bson::to_document(&doc).unwrap();
        assert!(value.contains_key("_id"));
        assert!(value.contains_key("externalId"));
        assert!(value.contains_key("createdAt"));
        assert!(value.contains_key("password"));
    }
}
