//! Google OAuth exchange
//!
//! Implements the authorization-code flow: build the consent URL,
//! exchange the returned code for an ID token, and verify that token
//! against Google's published JWKS. Endpoint URLs live in the config
//! so tests can point the flow at a local server.

use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::auth::token_service::{verify_identity_token, IdTokenClaims, Jwks};
use crate::shared::error::{AccountError, OAuthRejection, Result};

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);
const JWKS_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: String,
    pub auth_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    /// Issuer values Google signs tokens under.
    pub issuers: Vec<String>,
}

impl GoogleOAuthConfig {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            scopes: "openid email profile".to_string(),
            auth_endpoint: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            jwks_uri: "https://www.googleapis.com/oauth2/v3/certs".to_string(),
            issuers: vec![
                "accounts.google.com".to_string(),
                "https://accounts.google.com".to_string(),
            ],
        }
    }
}

struct CachedJwks {
    jwks: Jwks,
    fetched_at: Instant,
}

#[derive(serde::Deserialize)]
struct TokenExchangeResponse {
    id_token: Option<String>,
}

pub struct GoogleOAuthService {
    config: GoogleOAuthConfig,
    http_client: reqwest::Client,
    jwks_cache: RwLock<Option<CachedJwks>>,
}

impl GoogleOAuthService {
    pub fn new(config: GoogleOAuthConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            jwks_cache: RwLock::new(None),
        }
    }

    /// The consent-screen URL the browser is redirected to.
    pub fn authorization_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}",
            self.config.auth_endpoint,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&self.config.scopes),
        )
    }

    /// Trade an authorization code for the provider's ID token.
    ///
    /// Any failure in the exchange, including a response without an
    /// `id_token`, surfaces as the `ExchangeFailed` rejection; the
    /// provider's actual error is logged, never forwarded.
    pub async fn exchange_code(&self, code: &str) -> Result<String> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.config.token_endpoint)
            .form(&params)
            .timeout(EXCHANGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Token exchange request failed");
                AccountError::OAuthRejected(OAuthRejection::ExchangeFailed)
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Token exchange returned an error");
            return Err(AccountError::OAuthRejected(OAuthRejection::ExchangeFailed));
        }

        let body: TokenExchangeResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Token exchange response was not valid JSON");
            AccountError::OAuthRejected(OAuthRejection::ExchangeFailed)
        })?;

        body.id_token.ok_or_else(|| {
            warn!("Token exchange response carried no id_token");
            AccountError::OAuthRejected(OAuthRejection::ExchangeFailed)
        })
    }

    async fn jwks(&self) -> Result<Jwks> {
        {
            let cache = self.jwks_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < JWKS_TTL {
                    return Ok(cached.jwks.clone());
                }
            }
        }

        debug!(uri = %self.config.jwks_uri, "Fetching JWKS");
        let jwks: Jwks = self
            .http_client
            .get(&self.config.jwks_uri)
            .send()
            .await
            .map_err(|e| AccountError::connection(format!("JWKS fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| AccountError::connection(format!("JWKS response invalid: {e}")))?;

        let mut cache = self.jwks_cache.write().await;
        *cache = Some(CachedJwks {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });
        Ok(jwks)
    }

    /// Verify the provider's ID token and return its claims.
    ///
    /// An unreachable key set means the token cannot be verified, so
    /// it fails the same way an unverifiable token does; the transport
    /// cause is logged.
    pub async fn resolve_identity(&self, id_token: &str) -> Result<IdTokenClaims> {
        let jwks = match self.jwks().await {
            Ok(jwks) => jwks,
            Err(err) => {
                warn!(error = %err, "JWKS fetch failed during identity verification");
                return Err(AccountError::OAuthRejected(
                    OAuthRejection::InvalidIdentityToken,
                ));
            }
        };
        verify_identity_token(id_token, &jwks, &self.config.client_id, &self.config.issuers)
            .ok_or(AccountError::OAuthRejected(
                OAuthRejection::InvalidIdentityToken,
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url_carries_required_params() {
        let service = GoogleOAuthService::new(GoogleOAuthConfig::new(
            "client-1".to_string(),
            "shh".to_string(),
            "http://localhost:8000/auth/google/callback".to_string(),
        ));

        let url = service.authorization_url();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(url.contains("client_id=client-1"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Fauth%2Fgoogle%2Fcallback"
        ));
    }
}
