use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub mod config;
pub mod ldap_probe;
pub mod logging;
pub mod metrics;
pub mod mimir;

use config::load_config;
use ldap_probe::{client::LdapClient, probe::ProbeExecutor, scheduler::ProbeScheduler};
use metrics::{MetricsSink, server};
use mimir::RemoteWrite;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    logging::init();

    let app = load_config().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;

    let probe = Arc::new(app.probe);
    tracing::info!(
        url = %probe.url,
        base_dn = %probe.base_dn,
        search_filter = %probe.search_filter,
        search_attributes = ?probe.search_attributes,
        "Configuration loaded"
    );

    let sink = Arc::new(MetricsSink::new()?);
    let listener = server::bind(app.listen_addr).await?;

    let remote_write = match app.remote_write {
        Some(config) => {
            tracing::info!(endpoint = %config.endpoint, "Pushing metrics to Mimir");
            Some(RemoteWrite::new(config, probe.instance())?)
        }
        None => None,
    };

    let scheduler = ProbeScheduler::new(
        ProbeExecutor::new(LdapClient::new(), Arc::clone(&probe)),
        Arc::clone(&sink),
    )
    .with_remote_write(remote_write);

    let shutdown = CancellationToken::new();
    let probe_task = tokio::spawn(scheduler.run(shutdown.clone()));
    let server_task = tokio::spawn(server::serve(listener, sink, shutdown.clone()));

    shutdown_signal().await;
    tracing::info!("Shutting down");
    shutdown.cancel();

    let (probe_result, server_result) = tokio::join!(probe_task, server_task);
    probe_result?;
    server_result?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
