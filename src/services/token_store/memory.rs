use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::gateway::issuer::{AuthorizedClient, IssuerError, TokenIssuer};

type ClientKey = (String, String);

/// Process-local authorized-client store keyed by (registration, principal).
///
/// Clones share the same map, so the login flow and the gateway can hold
/// separate handles.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClientStore {
    clients: Arc<RwLock<HashMap<ClientKey, AuthorizedClient>>>,
}

impl InMemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, client: AuthorizedClient) {
        let key = (
            client.registration_id.clone(),
            client.principal_name.clone(),
        );
        self.clients.write().await.insert(key, client);
    }

    pub async fn remove(
        &self,
        registration_id: &str,
        principal_name: &str,
    ) -> Option<AuthorizedClient> {
        self.clients
            .write()
            .await
            .remove(&(registration_id.to_string(), principal_name.to_string()))
    }
}

#[async_trait]
impl TokenIssuer for InMemoryClientStore {
    async fn load_authorized_client(
        &self,
        registration_id: &str,
        principal_name: &str,
    ) -> Result<Option<AuthorizedClient>, IssuerError> {
        let clients = self.clients.read().await;
        Ok(clients
            .get(&(registration_id.to_string(), principal_name.to_string()))
            .cloned())
    }
}
