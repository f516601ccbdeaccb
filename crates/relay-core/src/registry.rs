//! Client registry: bookkeeping for the backend connections an actor holds.
//!
//! The registry stores *references* ([`Arc`]) to connection handles. It never
//! connects, disconnects or closes a handle; the actor that created a handle
//! owns its lifecycle and only reports state changes here.
//!
//! The registry itself is not synchronized. [`Workflow`](crate::workflow::Workflow)
//! wraps it in a lock so that mutation never overlaps iteration.

use std::sync::Arc;

use ahash::AHashMap;
use serde::Serialize;

use crate::types::ClientType;

/// Descriptive config attached to an association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub client_type: ClientType,
}

impl ClientConfig {
    pub fn new(name: impl Into<String>, client_type: ClientType) -> Self {
        Self { name: name.into(), client_type }
    }
}

/// One registered backend connection.
pub struct ClientAssociation<H> {
    pub key: String,
    pub client: Arc<H>,
    pub config: ClientConfig,
    pub is_connected: bool,
    pub error_count: u64,
}

impl<H> ClientAssociation<H> {
    /// Serializable view without the handle.
    pub fn summary(&self) -> ClientSummary {
        ClientSummary {
            key: self.key.clone(),
            config: self.config.clone(),
            is_connected: self.is_connected,
            error_count: self.error_count,
        }
    }
}

impl<H> Clone for ClientAssociation<H> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            client: Arc::clone(&self.client),
            config: self.config.clone(),
            is_connected: self.is_connected,
            error_count: self.error_count,
        }
    }
}

impl<H> std::fmt::Debug for ClientAssociation<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientAssociation")
            .field("key", &self.key)
            .field("config", &self.config)
            .field("is_connected", &self.is_connected)
            .field("error_count", &self.error_count)
            .finish_non_exhaustive()
    }
}

/// Handle-free view of an association, used in [`ActorStatus`](crate::activity::ActorStatus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub key: String,
    #[serde(flatten)]
    pub config: ClientConfig,
    pub is_connected: bool,
    pub error_count: u64,
}

/// Keyed store of [`ClientAssociation`]s.
pub struct ClientRegistry<H> {
    clients: AHashMap<String, ClientAssociation<H>>,
}

impl<H> ClientRegistry<H> {
    pub fn new() -> Self {
        Self { clients: AHashMap::new() }
    }

    /// Register a handle under `key`, starting disconnected.
    ///
    /// An existing association under the same key is replaced and returned;
    /// its handle is *not* closed.
    pub fn add_client(&mut self, key: impl Into<String>, client: Arc<H>, config: ClientConfig) -> Option<ClientAssociation<H>> {
        let key = key.into();
        let association = ClientAssociation { key: key.clone(), client, config, is_connected: false, error_count: 0 };
        self.clients.insert(key, association)
    }

    pub fn get_client(&self, key: &str) -> Option<&ClientAssociation<H>> {
        self.clients.get(key)
    }

    pub fn get_client_mut(&mut self, key: &str) -> Option<&mut ClientAssociation<H>> {
        self.clients.get_mut(key)
    }

    /// Returns `true` if an association existed and was removed.
    pub fn remove_client(&mut self, key: &str) -> bool {
        self.clients.remove(key).is_some()
    }

    /// All associations of the given type, in no particular order.
    pub fn get_clients_by_type(&self, client_type: ClientType) -> Vec<&ClientAssociation<H>> {
        self.clients.values().filter(|a| a.config.client_type == client_type).collect()
    }

    pub fn get_all_clients(&self) -> Vec<&ClientAssociation<H>> {
        self.clients.values().collect()
    }

    /// First association with `is_connected == true`. Keys are compared so
    /// the choice is stable across calls.
    pub fn first_connected(&self) -> Option<&ClientAssociation<H>> {
        self.clients.values().filter(|a| a.is_connected).min_by(|a, b| a.key.cmp(&b.key))
    }

    /// Update the liveness flag. Returns `false` for an unknown key.
    pub fn set_connected(&mut self, key: &str, connected: bool) -> bool {
        match self.clients.get_mut(key) {
            Some(a) => {
                a.is_connected = connected;
                true
            }
            None => false,
        }
    }

    /// Bump the failure counter of one association.
    pub fn record_error(&mut self, key: &str) {
        if let Some(a) = self.clients.get_mut(key) {
            a.error_count += 1;
        }
    }

    /// Remove every association and hand them back to the caller, who is
    /// responsible for disconnecting the handles.
    pub fn drain(&mut self) -> Vec<ClientAssociation<H>> {
        self.clients.drain().map(|(_, a)| a).collect()
    }

    pub fn summaries(&self) -> Vec<ClientSummary> {
        let mut out: Vec<_> = self.clients.values().map(ClientAssociation::summary).collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl<H> Default for ClientRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Handle(&'static str);

    fn registry() -> ClientRegistry<Handle> {
        let mut r = ClientRegistry::new();
        r.add_client("api", Arc::new(Handle("api")), ClientConfig::new("CoinGecko", ClientType::DataSource));
        r.add_client("db", Arc::new(Handle("db")), ClientConfig::new("TimescaleDB", ClientType::Database));
        r.add_client("db2", Arc::new(Handle("db2")), ClientConfig::new("Replica", ClientType::Database));
        r
    }

    #[test]
    fn remove_twice() {
        let mut r = registry();
        assert!(r.remove_client("api"));
        assert!(!r.remove_client("api"));
        assert!(r.get_client("api").is_none());
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn by_type() {
        let r = registry();
        let mut keys: Vec<_> = r.get_clients_by_type(ClientType::Database).iter().map(|a| a.key.clone()).collect();
        keys.sort();
        assert_eq!(keys, vec!["db", "db2"]);
        assert!(r.get_clients_by_type(ClientType::Cache).is_empty());
        assert_eq!(r.get_all_clients().len(), 3);
    }

    #[test]
    fn overwrite_returns_previous_without_closing() {
        let mut r = registry();
        let old_handle = Arc::clone(&r.get_client("api").unwrap().client);
        let prev = r.add_client("api", Arc::new(Handle("api-v2")), ClientConfig::new("v2", ClientType::DataSource));
        let prev = prev.unwrap();
        assert_eq!(prev.client.0, "api");
        // the caller still holds the old handle
        assert_eq!(Arc::strong_count(&old_handle), 2);
        assert_eq!(r.get_client("api").unwrap().client.0, "api-v2");
    }

    #[test]
    fn connected_selection() {
        let mut r = registry();
        assert!(r.first_connected().is_none());
        assert!(r.set_connected("db2", true));
        assert!(r.set_connected("db", true));
        assert_eq!(r.first_connected().unwrap().key, "db");
        assert!(!r.set_connected("missing", true));
    }

    #[test]
    fn error_count_per_association() {
        let mut r = registry();
        r.record_error("db");
        r.record_error("db");
        r.record_error("missing");
        assert_eq!(r.get_client("db").unwrap().error_count, 2);
        assert_eq!(r.get_client("api").unwrap().error_count, 0);
    }

    #[test]
    fn drain_empties() {
        let mut r = registry();
        assert_eq!(r.drain().len(), 3);
        assert!(r.is_empty());
    }
}
