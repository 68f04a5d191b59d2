use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;

use super::client::{DirectoryClient, DirectorySession};
use super::error::{DirectoryError, PhaseError, PhaseFailure};
use super::report;
use super::result::{Phase, PhaseOutcome, ProbeResult, as_millis};
use crate::config::probe_config::ProbeConfig;

/// Runs one connect/bind/search cycle at a time against the configured directory.
pub struct ProbeExecutor<C> {
    client: C,
    config: Arc<ProbeConfig>,
}

impl<C: DirectoryClient> ProbeExecutor<C> {
    pub fn new(client: C, config: Arc<ProbeConfig>) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Perform a single probe cycle.
    ///
    /// Phases run strictly in order and the first failure ends the cycle; later
    /// phases are reported as [`PhaseOutcome::Skipped`]. Once a session has been
    /// opened it is always closed before returning, whatever the outcome.
    pub async fn probe_once(&self, shutdown: &CancellationToken) -> ProbeResult {
        let config = &*self.config;
        let limit = config.phase_timeout;
        let started = Instant::now();

        let (connection, session) = run_phase(
            Phase::Connect,
            limit,
            shutdown,
            self.client.connect(&config.url),
        )
        .await;

        let mut result = ProbeResult {
            connection,
            bind: PhaseOutcome::Skipped,
            search: PhaseOutcome::Skipped,
            total: Duration::ZERO,
        };

        let Some(mut session) = session else {
            result.total = started.elapsed();
            return result;
        };

        let (bind, bound) = run_phase(
            Phase::Bind,
            limit,
            shutdown,
            session.bind(&config.bind_user, &config.bind_password),
        )
        .await;
        result.bind = bind;

        if bound.is_some() {
            let request = config.search_request();
            let (search, entries) =
                run_phase(Phase::Search, limit, shutdown, session.search(&request)).await;
            result.search = search;

            if let Some(entries) = entries {
                tracing::info!(entries = entries.len(), base_dn = %config.base_dn, "Search returned");
                for dn in &entries {
                    tracing::debug!(dn = %dn, "Search entry");
                }
            }
        }

        if timeout(limit, session.close()).await.is_err() {
            tracing::warn!(timeout_ms = as_millis(limit), "Closing the LDAP session timed out");
        }

        result.total = started.elapsed();
        result
    }
}

/// Time a single phase, bounded by `limit` and aborted on shutdown.
async fn run_phase<T, F>(
    phase: Phase,
    limit: Duration,
    shutdown: &CancellationToken,
    operation: F,
) -> (PhaseOutcome, Option<T>)
where
    F: Future<Output = Result<T, DirectoryError>>,
{
    let start = Instant::now();
    let outcome = tokio::select! {
        biased;
        _ = shutdown.cancelled() => Err(PhaseFailure::Cancelled),
        res = timeout(limit, operation) => match res {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(PhaseFailure::Directory(e)),
            Err(_) => Err(PhaseFailure::TimedOut(limit)),
        },
    };
    let elapsed = start.elapsed();

    match outcome {
        Ok(value) => {
            tracing::info!(phase = %phase, duration_ms = as_millis(elapsed), "Phase completed");
            (PhaseOutcome::Completed(elapsed), Some(value))
        }
        Err(cause) => {
            let error = PhaseError::new(phase, cause);
            if error.is_cancelled() {
                tracing::info!(phase = %phase, "Phase cancelled by shutdown");
            } else {
                tracing::error!(
                    phase = %phase,
                    elapsed_ms = as_millis(elapsed),
                    error = %report(&error.cause),
                    "Phase failed"
                );
            }
            (PhaseOutcome::Failed { elapsed, error }, None)
        }
    }
}
