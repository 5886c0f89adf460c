//! AWS Secrets Manager backed [`SecretStore`].

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::error::ProvideErrorMetadata;
use tracing::instrument;

use super::{Result, SecretError, SecretStore};
use crate::config::AwsSecretsConfig;

/// Reads secrets with `GetSecretValue`.
#[derive(Debug, Clone)]
pub struct AwsSecretStore {
    client: Client,
}

impl AwsSecretStore {
    /// Build a client from the default AWS credential chain.
    ///
    /// `endpoint_url` points the client at LocalStack or another compatible endpoint.
    pub async fn new(config: &AwsSecretsConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let client = match &config.endpoint_url {
            Some(endpoint_url) => Client::from_conf(
                aws_sdk_secretsmanager::config::Builder::from(&sdk_config)
                    .endpoint_url(endpoint_url)
                    .build(),
            ),
            None => Client::new(&sdk_config),
        };

        Self { client }
    }
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    #[instrument(skip(self), err)]
    async fn get_secret(&self, name: &str) -> Result<String> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|err| {
                if err.code() == Some("ResourceNotFoundException") {
                    SecretError::NotFound(name.to_string())
                } else {
                    SecretError::Provider(format!("GetSecretValue failed for '{name}': {}", err.into_service_error()))
                }
            })?;

        match output.secret_string() {
            Some(value) => Ok(value.to_string()),
            None => Err(SecretError::Malformed {
                name: name.to_string(),
                reason: "secret has no string value".to_string(),
            }),
        }
    }
}
