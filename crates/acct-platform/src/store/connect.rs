//! Connection manager
//!
//! One retried connection attempt per process, shared by every caller.
//! The first `get()` performs connect + schema bootstrap under the
//! retry policy; concurrent callers await that same attempt instead of
//! opening their own, and later callers get the cached handle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::shared::error::{AccountError, Result};
use crate::store::{AccountStore, MongoStore, PostgresStore, StoreBackend, StoreConfig};

/// How hard to try before giving up on the backend.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

/// Runs `op` up to `policy.max_attempts` times with a fixed delay
/// between failures.
pub(crate) async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;
    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "Store connection attempt failed"
                );
                last_error = Some(err);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    let cause = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempts were made".to_string());
    Err(AccountError::connection(format!(
        "failed after {} attempts: {cause}",
        policy.max_attempts
    )))
}

async fn open_store(config: &StoreConfig) -> Result<Arc<dyn AccountStore>> {
    match config.backend {
        StoreBackend::Postgres => {
            let store = PostgresStore::connect(config).await?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Mongo => {
            let store = MongoStore::connect(config).await?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}

/// Owns the single store handle for a process.
pub struct StoreManager {
    config: StoreConfig,
    policy: RetryPolicy,
    store: OnceCell<Arc<dyn AccountStore>>,
}

impl StoreManager {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_policy(config, RetryPolicy::default())
    }

    pub fn with_policy(config: StoreConfig, policy: RetryPolicy) -> Self {
        Self {
            config,
            policy,
            store: OnceCell::new(),
        }
    }

    /// The shared store handle, connecting (with retries and schema
    /// bootstrap) on first use. Concurrent callers await the same
    /// in-flight attempt instead of opening their own.
    pub async fn get(&self) -> Result<Arc<dyn AccountStore>> {
        self.get_with(|| open_store(&self.config)).await
    }

    async fn get_with<F, Fut>(&self, opener: F) -> Result<Arc<dyn AccountStore>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Arc<dyn AccountStore>>>,
    {
        let store = self
            .store
            .get_or_try_init(|| async {
                let store = with_retry(self.policy, opener).await?;
                info!("Store is connected and bootstrapped");
                Ok::<_, AccountError>(store)
            })
            .await?;
        Ok(Arc::clone(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::entity::{Account, AccountPatch, NewAccount};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    #[derive(Debug)]
    struct NullStore;

    #[async_trait::async_trait]
    impl AccountStore for NullStore {
        async fn list(&self) -> Result<Vec<Account>> {
            Ok(Vec::new())
        }

        async fn find_by_id(&self, _id: &str) -> Result<Option<Account>> {
            Ok(None)
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<Account>> {
            Ok(None)
        }

        async fn insert(&self, account: NewAccount) -> Result<Account> {
            Ok(account.into_account())
        }

        async fn update(&self, _id: &str, _patch: AccountPatch) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _id: &str) -> Result<()> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts_on_persistent_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(fast_policy(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AccountError::connection("refused")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("failed after 5 attempts"));
    }

    #[tokio::test]
    async fn test_retry_stops_after_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(fast_policy(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AccountError::connection("not yet"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_get_shares_one_attempt() {
        let manager = StoreManager::with_policy(StoreConfig::default(), fast_policy(5));
        let attempts = Arc::new(AtomicU32::new(0));

        let make_opener = || {
            let attempts = Arc::clone(&attempts);
            move || {
                let attempts = Arc::clone(&attempts);
                async move {
                    // The first call fails so the establishment spans
                    // a retry while the second caller is waiting.
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(AccountError::connection("not yet"))
                    } else {
                        Ok(Arc::new(NullStore) as Arc<dyn AccountStore>)
                    }
                }
            }
        };

        let (a, b) = tokio::join!(
            manager.get_with(make_opener()),
            manager.get_with(make_opener()),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());

        // One retried establishment: a failure plus a success. Had the
        // callers raced, the counter would show their openers too.
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        // Later callers reuse the cached handle without opening again.
        manager.get_with(make_opener()).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_manager_reports_connection_error() {
        let config = StoreConfig {
            host: "127.0.0.1".to_string(),
            // Nothing listens here.
            port: 1,
            ..Default::default()
        };
        let manager = StoreManager::with_policy(config, fast_policy(2));

        let err = manager.get().await.unwrap_err();
        assert!(matches!(err, AccountError::Connection { .. }));
    }
}
