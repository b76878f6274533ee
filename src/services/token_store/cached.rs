//! Authorized clients stored as JSON in a shared cache (Valkey in production),
//! so every gateway instance sees the tokens written by the login flow.

use std::time::Duration;

use async_trait::async_trait;

use crate::gateway::issuer::{AuthorizedClient, IssuerError, TokenIssuer};
use crate::services::cache::{CacheClient, CacheError};

const KEY_PREFIX: &str = "oauth2:authorized_client";

fn client_key(registration_id: &str, principal_name: &str) -> String {
    format!("{KEY_PREFIX}:{registration_id}:{principal_name}")
}

#[derive(Clone)]
pub struct CacheClientStore<C: CacheClient> {
    cache: C,
}

impl<C: CacheClient> CacheClientStore<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    /// Stores `client` until `ttl` elapses (normally the token's lifetime).
    pub async fn save(&self, client: &AuthorizedClient, ttl: Duration) -> Result<(), IssuerError> {
        let value = serde_json::to_string(client).map_err(|e| IssuerError::Lookup(Box::new(e)))?;
        self.cache
            .set_with_ttl(
                &client_key(&client.registration_id, &client.principal_name),
                &value,
                ttl,
            )
            .await
            .map_err(|e| IssuerError::Lookup(Box::new(e)))
    }

    pub async fn remove(&self, registration_id: &str, principal_name: &str) -> Result<bool, IssuerError> {
        let removed = self
            .cache
            .del(&client_key(registration_id, principal_name))
            .await
            .map_err(|e| IssuerError::Lookup(Box::new(e)))?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl<C: CacheClient> TokenIssuer for CacheClientStore<C> {
    async fn load_authorized_client(
        &self,
        registration_id: &str,
        principal_name: &str,
    ) -> Result<Option<AuthorizedClient>, IssuerError> {
        let key = client_key(registration_id, principal_name);
        let raw = self
            .cache
            .get_string(&key)
            .await
            .map_err(|e| IssuerError::Lookup(Box::new(e)))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let client: AuthorizedClient = serde_json::from_str(&raw).map_err(|e| {
            tracing::warn!(
                backend = self.cache.backend_name(),
                key = %key,
                "stored authorized client is malformed"
            );
            IssuerError::Lookup(Box::new(CacheError::InvalidValue(e.to_string())))
        })?;

        Ok(Some(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use crate::services::cache::client::CacheResult;

    #[derive(Clone, Default)]
    struct MemoryCache {
        values: Arc<Mutex<HashMap<String, String>>>,
        broken: bool,
    }

    #[async_trait]
    impl CacheClient for MemoryCache {
        fn backend_name(&self) -> &'static str {
            "memory"
        }

        async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
            if self.broken {
                return Err(CacheError::BackendConnection("connection refused".into()));
            }
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set_with_ttl(&self, key: &str, value: &str, _ttl: Duration) -> CacheResult<()> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn del(&self, key: &str) -> CacheResult<u64> {
            Ok(self.values.lock().unwrap().remove(key).map_or(0, |_| 1))
        }
    }

    #[tokio::test]
    async fn round_trips_through_the_cache() {
        let cache = MemoryCache::default();
        let store = CacheClientStore::new(cache.clone());
        store
            .save(&AuthorizedClient::new("azure", "alice", "abc123"), Duration::from_secs(600))
            .await
            .unwrap();

        assert!(
            cache
                .values
                .lock()
                .unwrap()
                .contains_key("oauth2:authorized_client:azure:alice")
        );

        let client = store.load_authorized_client("azure", "alice").await.unwrap().unwrap();
        assert_eq!(client.access_token(), Some("abc123"));

        assert!(store.remove("azure", "alice").await.unwrap());
        assert!(store.load_authorized_client("azure", "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_entry_is_a_lookup_error() {
        let cache = MemoryCache::default();
        cache
            .values
            .lock()
            .unwrap()
            .insert("oauth2:authorized_client:azure:alice".into(), "not json".into());

        let store = CacheClientStore::new(cache);
        let err = store.load_authorized_client("azure", "alice").await.unwrap_err();
        assert!(matches!(err, IssuerError::Lookup(_)));
    }

    #[tokio::test]
    async fn backend_failure_is_a_lookup_error() {
        let store = CacheClientStore::new(MemoryCache {
            broken: true,
            ..MemoryCache::default()
        });

        let err = store.load_authorized_client("azure", "alice").await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
