//! # paygate: tenant-aware edge for the payment backend
//!
//! `paygate` sits in front of a multi-tenant payment API that processes card payments through
//! Adyen. It answers two kinds of traffic that never reach the payment API itself:
//!
//! - **Authorization**: API Gateway calls `POST /authorize` before routing a request. The
//!   answer is an IAM policy allowing or denying the call, based on public route rules, tenant
//!   API keys for storefront calls and tenant bearer tokens for everything else. Every tenant
//!   has an IP allowlist that applies to both credential kinds.
//! - **Webhooks**: Adyen posts notification batches to `POST /webhooks/adyen`. Each item is
//!   verified against the merchant account's HMAC key and, when enabled, projected onto the
//!   stored transaction status with an audit row per operation.
//!
//! ## Architecture
//!
//! Tenants and transactions live in PostgreSQL, accessed through the [`db::handlers`] store
//! traits. Per-tenant configuration (HMAC key, API keys, IP allowlist) lives in AWS Secrets
//! Manager under `tenant-{merchantAccount}-config`, read through the [`secrets::SecretStore`]
//! trait. HMAC keys are cached per merchant account; the JWT signing key is read per request.
//!
//! ## Modules
//!
//! - [`auth`]: the authorizer decision, IP allowlists, tenant tokens and the policy format
//! - [`webhooks`]: notification payloads, signature verification and the status projection
//! - [`secrets`]: secret stores, tenant secret parsing and the HMAC key cache
//! - [`db`]: connection pool, retry policy, models and store implementations
//! - [`config`]: YAML + environment configuration
//! - [`telemetry`]: tracing and optional OTLP export
//!
//! ## Running
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/payments paygate -f config.yaml
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod secrets;
pub mod telemetry;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};

use crate::auth::Authorizer;
use crate::config::SecretsConfig;
use crate::db::handlers::{PgTenants, PgTransactions, TenantStore, TransactionStore};
use crate::secrets::SecretStore;
use crate::secrets::aws::AwsSecretStore;
use crate::secrets::cache::KeyCache;
use crate::secrets::memory::StaticSecretStore;
use crate::webhooks::WebhookProcessor;

pub use types::{TenantId, TransactionId};

/// State shared by the request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .authorizer(authorizer)
///     .processor(processor)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub authorizer: Authorizer,
    pub processor: WebhookProcessor,
}

/// Build the router with request tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::handlers::health::health))
        .route("/authorize", post(api::handlers::authorizer::authorize))
        .route("/webhooks/adyen", post(api::handlers::webhooks::adyen_webhook))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

async fn build_secret_store(config: &SecretsConfig) -> Arc<dyn SecretStore> {
    match config {
        SecretsConfig::Aws(aws) => Arc::new(AwsSecretStore::new(aws).await),
        SecretsConfig::Static { secrets } => {
            info!(count = secrets.len(), "Using static secrets from configuration");
            Arc::new(StaticSecretStore::from_values(secrets))
        }
    }
}

/// The server and the resources it owns.
///
/// 1. **Create**: [`Application::new`] connects to the database, applies migrations and
///    builds the secret store
/// 2. **Serve**: [`Application::serve`] binds the port and handles requests until the
///    shutdown future resolves, then closes the pool
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Config carries keys, so only the shape is logged
        debug!(
            bind_address = %config.bind_address(),
            secrets = config.secrets.kind(),
            require_valid_hmac = config.webhooks.require_valid_hmac,
            enable_db_writes = config.webhooks.enable_db_writes,
            "Starting paygate"
        );

        let pool = db::connect(&config.database).await?;
        let secrets = build_secret_store(&config.secrets).await;

        let retry = config.database.retry;
        let tenants: Arc<dyn TenantStore> = Arc::new(PgTenants::new(pool.clone(), retry));
        let transactions: Arc<dyn TransactionStore> = Arc::new(PgTransactions::new(pool.clone(), retry));

        let key_cache = KeyCache::new(config.key_cache.max_capacity, config.key_cache.ttl);

        let state = AppState::builder()
            .authorizer(Authorizer::new(tenants.clone(), secrets.clone(), config.authorizer.clone()))
            .processor(WebhookProcessor::new(
                tenants,
                transactions,
                secrets,
                key_cache,
                config.webhooks.clone(),
            ))
            .build();

        Ok(Self {
            router: build_router(state),
            config,
            pool,
        })
    }

    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "paygate listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
