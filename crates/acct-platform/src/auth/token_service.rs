//! Token service
//!
//! Two token families pass through here. Session tokens are HS256,
//! minted and verified locally with a shared secret. Identity tokens
//! come from an external provider and are verified RS256 against the
//! provider's published JWKS. Verification never errors toward the
//! caller; a bad token is simply absent claims.

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, encode};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::account::entity::Account;
use crate::shared::error::{AccountError, Result};

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id
    pub sub: String,
    pub name: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    /// Session lifetime in seconds.
    pub session_expiry_secs: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: "your-secret-key".to_string(),
            session_expiry_secs: 3600,
        }
    }
}

pub struct TokenService {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Mint a session token for an account.
    pub fn issue(&self, account: &Account) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: account.id.clone(),
            name: account.name.clone(),
            email: account.email.clone(),
            iat: now,
            exp: now + self.config.session_expiry_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AccountError::internal(format!("token signing failed: {e}")))
    }

    /// Validate a session token. `None` for anything not issued by
    /// this service or past its expiry.
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(err) => {
                debug!(error = %err, "Session token rejected");
                None
            }
        }
    }
}

/// A JWKS document as published by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<JwkKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwkKey {
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    /// RSA modulus, base64url
    pub n: String,
    /// RSA exponent, base64url
    pub e: String,
}

/// Claims we read from a provider-issued identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    /// Stable subject id at the provider
    pub sub: String,
    pub aud: StringOrVec,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// `aud` may be a single string or an array of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrVec {
    One(String),
    Many(Vec<String>),
}

impl StringOrVec {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            StringOrVec::One(s) => s == value,
            StringOrVec::Many(v) => v.iter().any(|s| s == value),
        }
    }
}

/// Verify a provider identity token against a key set.
///
/// Checks the RS256 signature (selecting the key by `kid` when the
/// header names one), the audience, the issuer, and the standard time
/// claims. Returns `None` on any failure.
pub fn verify_identity_token(
    token: &str,
    jwks: &Jwks,
    audience: &str,
    issuers: &[String],
) -> Option<IdTokenClaims> {
    let header = decode_header(token).ok()?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[audience]);
    validation.set_issuer(issuers);

    for key in &jwks.keys {
        if key.kty != "RSA" {
            continue;
        }
        // When the token names a kid, only that key may verify it.
        if header
            .kid
            .as_ref()
            .map_or(false, |kid| key.kid.as_deref() != Some(kid.as_str()))
        {
            continue;
        }

        let decoding_key = match DecodingKey::from_rsa_components(&key.n, &key.e) {
            Ok(k) => k,
            Err(err) => {
                debug!(error = %err, "Skipping malformed JWK");
                continue;
            }
        };

        match decode::<IdTokenClaims>(token, &decoding_key, &validation) {
            Ok(data) => {
                // set_audience accepts any listed value; re-check the
                // exact one we expect.
                if !data.claims.aud.contains(audience) {
                    return None;
                }
                return Some(data.claims);
            }
            Err(err) => {
                debug!(error = %err, "Identity token rejected by key");
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::entity::NewAccount;

    fn account() -> Account {
        NewAccount {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: Some("$argon2id$stub".to_string()),
            external_id: None,
        }
        .into_account()
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let service = TokenService::new(TokenConfig::default());
        let account = account();

        let token = service.issue(&account).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.sub, account.id);
        assert_eq!(claims.email, account.email);
        assert_eq!(claims.name, account.name);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let service = TokenService::new(TokenConfig::default());
        let token = service.issue(&account()).unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('a') { 'b' } else { 'a' });

        assert!(service.verify(&tampered).is_none());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issuer = TokenService::new(TokenConfig {
            secret: "secret-a".to_string(),
            ..Default::default()
        });
        let verifier = TokenService::new(TokenConfig {
            secret: "secret-b".to_string(),
            ..Default::default()
        });

        let token = issuer.issue(&account()).unwrap();
        assert!(verifier.verify(&token).is_none());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // Issue a token that expired two hours ago, well past the
        // validator's leeway.
        let service = TokenService::new(TokenConfig {
            session_expiry_secs: -7200,
            ..Default::default()
        });

        let token = service.issue(&account()).unwrap();
        assert!(service.verify(&token).is_none());
    }

    #[test]
    fn test_aud_contains_both_shapes() {
        let one = StringOrVec::One("client-1".to_string());
        assert!(one.contains("client-1"));
        assert!(!one.contains("client-2"));

        let many = StringOrVec::Many(vec!["a".to_string(), "b".to_string()]);
        assert!(many.contains("b"));
        assert!(!many.contains("c"));
    }

    #[test]
    fn test_identity_token_rejected_with_empty_key_set() {
        let jwks = Jwks { keys: vec![] };
        let result = verify_identity_token(
            "not.a.token",
            &jwks,
            "client",
            &["https://accounts.google.com".to_string()],
        );
        assert!(result.is_none());
    }
}
