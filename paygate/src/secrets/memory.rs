//! In-process [`SecretStore`] populated from configuration.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{Result, SecretError, SecretStore};

/// Serves a fixed set of secrets. Used for local development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    /// Build from configuration values. Strings are stored as-is; any other JSON value is
    /// stored in its serialized form, so tenant secrets can be written inline as YAML maps.
    pub fn from_values(values: &HashMap<String, serde_json::Value>) -> Self {
        let secrets = values
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), value)
            })
            .collect();
        Self { secrets }
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }
}
