//! Account entity
//!
//! An account is either locally registered (has a password hash) or
//! OAuth-only (has an external subject id and no password). The email
//! is the login key and uniquely identifies at most one account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted account record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,

    /// Display name
    pub name: String,

    /// Login key; unique and stored case-normalized
    pub email: String,

    /// Argon2id PHC hash; `None` for OAuth-only accounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,

    /// Third-party subject id (e.g. Google `sub`); unique when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Fields for a new account; the store generates the id on insert.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
}

impl NewAccount {
    /// Materialize the record with a store-generated identifier.
    pub fn into_account(self) -> Account {
        Account {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            external_id: self.external_id,
            created_at: Utc::now(),
        }
    }
}

/// Partial update. Only `Some` fields are applied; omitted fields are
/// left untouched by the store, never overwritten with null.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password_hash.is_none()
    }
}

/// Case-normalize an email for lookup and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            name: "Test".to_string(),
            email: email.to_string(),
            password_hash: Some("$argon2id$stub".to_string()),
            external_id: None,
        }
    }

    #[test]
    fn test_into_account_generates_distinct_ids() {
        let a = new_account("a@example.com").into_account();
        let b = new_account("b@example.com").into_account();
        assert_ne!(a.id, b.id);
        assert!(!a.id.is_empty());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
        assert_eq!(normalize_email("plain@host"), "plain@host");
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(AccountPatch::default().is_empty());
        let patch = AccountPatch {
            name: Some("New".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_password_hash_not_serialized_when_absent() {
        let mut account = new_account("a@example.com").into_account();
        account.password_hash = None;
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("passwordHash"));
    }
}
