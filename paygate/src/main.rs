use std::future::pending;

use clap::Parser;
use paygate::{Application, Config, config::Args, telemetry};
use tokio::signal;
use tracing::{error, info};

/// Resolves once Ctrl+C arrives.
///
/// A handler that cannot be installed never resolves, so the other signal still stops the
/// server.
async fn interrupt() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for Ctrl+C");
        pending::<()>().await;
    }
}

/// Resolves once SIGTERM arrives, which is how the container runtime stops the task.
#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Cannot listen for SIGTERM");
            pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    pending::<()>().await;
}

async fn wait_for_shutdown() {
    let signal = tokio::select! {
        _ = interrupt() => "SIGINT",
        _ = terminate() => "SIGTERM",
    };
    info!(signal, "Shutdown requested, draining in-flight requests");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The AWS SDK and sqlx pull in different rustls backends; pick one before any client is built
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let args = Args::parse();
    let config = Config::load(&args)?;
    if args.validate {
        println!("Configuration for {} is valid.", config.bind_address());
        return Ok(());
    }

    telemetry::init_telemetry(config.enable_otel_export)?;
    info!(config_file = %args.config, "paygate starting");

    let app = Application::new(config).await?;
    app.serve(wait_for_shutdown()).await
}
