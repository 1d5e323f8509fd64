//! Registry client
//!
//! The routing proxy owns the live endpoint set; the curator only reads a
//! snapshot of it and issues add/remove commands through the proxy's admin
//! interface. The interface is a trait so the reconciliation engine can be
//! exercised against an in-memory registry in tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::types::{NodeDescriptor, RegistryEntry};

/// Failure of one registry call
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Transport(String),

    #[error("registry rejected the command: {0}")]
    Rejected(String),
}

/// Query/add/remove interface of the external endpoint registry
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// Read the full current endpoint set
    async fn snapshot(&self) -> Result<Vec<RegistryEntry>, RegistryError>;

    /// Register a new endpoint
    async fn add(&self, node: &NodeDescriptor) -> Result<(), RegistryError>;

    /// Remove an endpoint by its opaque id
    async fn remove(&self, id: u64) -> Result<(), RegistryError>;
}

/// Registry client speaking the proxy's HTTP admin protocol
///
/// Query shape: `GET {proxy}?action={prefix}_admin&chain_id={id}`, with
/// `_add` / `_remove` variants for mutations.
pub struct HttpRegistry {
    http: reqwest::Client,
    proxy_url: String,
    action_prefix: String,
    chain_id: u64,
    timeout: Duration,
}

impl HttpRegistry {
    pub fn new(
        proxy_url: impl Into<String>,
        action_prefix: impl Into<String>,
        chain_id: u64,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            proxy_url: proxy_url.into(),
            action_prefix: action_prefix.into(),
            chain_id,
            timeout,
        })
    }

    async fn admin_call(&self, params: &[(&str, String)]) -> Result<Value, RegistryError> {
        let response = self
            .http
            .get(&self.proxy_url)
            .query(params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        let value: Value = response
            .json()
            .await
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            return Err(RegistryError::Rejected(error.to_string()));
        }

        Ok(value)
    }

    fn action(&self, suffix: &str) -> String {
        format!("{}_admin{}", self.action_prefix, suffix)
    }
}

#[async_trait]
impl NodeRegistry for HttpRegistry {
    async fn snapshot(&self) -> Result<Vec<RegistryEntry>, RegistryError> {
        let value = self
            .admin_call(&[
                ("action", self.action("")),
                ("chain_id", self.chain_id.to_string()),
            ])
            .await?;

        // The proxy answers with a map of opaque numeric id -> entry; the id
        // may live in the key, the entry body, or both
        let map: BTreeMap<String, RegistryEntry> = serde_json::from_value(value)
            .map_err(|e| RegistryError::Transport(format!("unexpected snapshot shape: {}", e)))?;

        let entries = map
            .into_iter()
            .map(|(key, mut entry)| {
                if entry.id == 0 {
                    if let Ok(id) = key.parse() {
                        entry.id = id;
                    }
                }
                entry
            })
            .collect();

        Ok(entries)
    }

    async fn add(&self, node: &NodeDescriptor) -> Result<(), RegistryError> {
        let descriptor = serde_json::to_string(node)
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        debug!("Registry add: {}", node.url);
        self.admin_call(&[
            ("action", self.action("_add")),
            ("chain_id", self.chain_id.to_string()),
            ("node", descriptor),
        ])
        .await?;
        Ok(())
    }

    async fn remove(&self, id: u64) -> Result<(), RegistryError> {
        debug!("Registry remove: id={}", id);
        self.admin_call(&[
            ("action", self.action("_remove")),
            ("chain_id", self.chain_id.to_string()),
            ("id", id.to_string()),
        ])
        .await?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_map_shape_parses() {
        let raw = r#"{
            "1": {"Endpoint": "http://a:8545", "Is_disabled": false},
            "2": {"ID": 2, "Endpoint": "http://b:8545", "Is_disabled": true}
        }"#;
        let map: BTreeMap<String, RegistryEntry> = serde_json::from_str(raw).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["1"].endpoint, "http://a:8545");
        assert!(map["2"].is_disabled);
    }

    #[test]
    fn test_action_names() {
        let registry =
            HttpRegistry::new("http://127.0.0.1:8545", "evm", 1, Duration::from_secs(5)).unwrap();
        assert_eq!(registry.action(""), "evm_admin");
        assert_eq!(registry.action("_add"), "evm_admin_add");
        assert_eq!(registry.action("_remove"), "evm_admin_remove");
    }

    #[tokio::test]
    async fn test_memory_registry_round_trip() {
        use testing::MemoryRegistry;

        let registry = MemoryRegistry::default();
        let scored = crate::types::ScoredEndpoint::compute(
            "http://c:8545".to_string(),
            1.0,
            100,
            3000,
            Some(10),
        );
        let descriptor = NodeDescriptor::for_endpoint(&scored, 0);

        registry.add(&descriptor).await.unwrap();
        let snapshot = registry.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].endpoint, "http://c:8545");

        registry.remove(snapshot[0].id).await.unwrap();
        assert!(registry.snapshot().await.unwrap().is_empty());
    }
}
