use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::OAuthError;

/// A relying party allowed to run the authorization-code flow.
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
}

/// A one-time grant and the values it is bound to.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub client_id: String,
    pub redirect_uri: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationCode {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait ClientRegistry: Send + Sync {
    async fn find(&self, client_id: &str) -> Result<Option<RegisteredClient>, OAuthError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session_id: String, user_id: String) -> Result<(), OAuthError>;
    async fn resolve(&self, session_id: &str) -> Result<Option<String>, OAuthError>;
}

#[async_trait]
pub trait CodeStore: Send + Sync {
    async fn insert(&self, code: String, grant: AuthorizationCode) -> Result<(), OAuthError>;

    /// Removes and returns the code only if it is bound to `client_id` and
    /// `redirect_uri`. Check and removal are one atomic step: of several
    /// concurrent callers at most one receives the grant. A code presented with
    /// the wrong binding stays in place.
    async fn take(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<Option<AuthorizationCode>, OAuthError>;

    /// Drops every code expired at `now`, returning how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, OAuthError>;
}

#[derive(Clone, Default)]
pub struct InMemoryClientRegistry {
    clients: Arc<DashMap<String, RegisteredClient>>,
}

impl InMemoryClientRegistry {
    pub fn new(initial_clients: Vec<RegisteredClient>) -> Self {
        let clients = DashMap::new();
        for client in initial_clients {
            clients.insert(client.client_id.clone(), client);
        }
        Self {
            clients: Arc::new(clients),
        }
    }
}

#[async_trait]
impl ClientRegistry for InMemoryClientRegistry {
    async fn find(&self, client_id: &str) -> Result<Option<RegisteredClient>, OAuthError> {
        Ok(self.clients.get(client_id).map(|entry| entry.value().clone()))
    }
}

/// Browser sessions from the demo login. Entries are never evicted.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, String>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session_id: String, user_id: String) -> Result<(), OAuthError> {
        self.sessions.insert(session_id, user_id);
        Ok(())
    }

    async fn resolve(&self, session_id: &str) -> Result<Option<String>, OAuthError> {
        Ok(self.sessions.get(session_id).map(|entry| entry.value().clone()))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCodeStore {
    codes: Arc<DashMap<String, AuthorizationCode>>,
}

impl InMemoryCodeStore {
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[async_trait]
impl CodeStore for InMemoryCodeStore {
    async fn insert(&self, code: String, grant: AuthorizationCode) -> Result<(), OAuthError> {
        self.codes.insert(code, grant);
        Ok(())
    }

    async fn take(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<Option<AuthorizationCode>, OAuthError> {
        Ok(self
            .codes
            .remove_if(code, |_, grant| {
                grant.client_id == client_id && grant.redirect_uri == redirect_uri
            })
            .map(|(_, grant)| grant))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, OAuthError> {
        let before = self.codes.len();
        self.codes.retain(|_, grant| !grant.is_expired_at(now));
        Ok(before.saturating_sub(self.codes.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn grant(expires_in: Duration) -> AuthorizationCode {
        AuthorizationCode {
            client_id: "demo-client".to_string(),
            redirect_uri: "http://localhost:5173/callback".to_string(),
            user_id: "acc-1".to_string(),
            expires_at: Utc::now() + expires_in,
        }
    }

    #[tokio::test]
    async fn take_is_single_use() {
        let store = InMemoryCodeStore::default();
        store
            .insert("c1".to_string(), grant(Duration::seconds(60)))
            .await
            .unwrap();

        let first = store
            .take("c1", "demo-client", "http://localhost:5173/callback")
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .take("c1", "demo-client", "http://localhost:5173/callback")
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn mismatched_binding_leaves_code_in_place() {
        let store = InMemoryCodeStore::default();
        store
            .insert("c1".to_string(), grant(Duration::seconds(60)))
            .await
            .unwrap();

        let wrong_uri = store
            .take("c1", "demo-client", "http://localhost:5173/other")
            .await
            .unwrap();
        assert!(wrong_uri.is_none());
        let wrong_client = store
            .take("c1", "other-client", "http://localhost:5173/callback")
            .await
            .unwrap();
        assert!(wrong_client.is_none());
        assert_eq!(store.len(), 1);

        let right = store
            .take("c1", "demo-client", "http://localhost:5173/callback")
            .await
            .unwrap();
        assert!(right.is_some());
    }

    #[tokio::test]
    async fn concurrent_takes_yield_exactly_one_grant() {
        let store = InMemoryCodeStore::default();
        store
            .insert("c1".to_string(), grant(Duration::seconds(60)))
            .await
            .unwrap();

        let mut set = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let store = store.clone();
            set.spawn(async move {
                store
                    .take("c1", "demo-client", "http://localhost:5173/callback")
                    .await
                    .unwrap()
                    .is_some()
            });
        }

        let mut winners = 0;
        while let Some(result) = set.join_next().await {
            if result.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn purge_drops_only_expired_codes() {
        let store = InMemoryCodeStore::default();
        store
            .insert("old".to_string(), grant(Duration::seconds(-1)))
            .await
            .unwrap();
        store
            .insert("fresh".to_string(), grant(Duration::seconds(60)))
            .await
            .unwrap();

        let purged = store.purge_expired(Utc::now()).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.len(), 1);
    }
}
