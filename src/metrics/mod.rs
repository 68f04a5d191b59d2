use std::sync::{PoisonError, RwLock};

use prometheus::{Encoder, Gauge, IntCounterVec, Opts, Registry, TextEncoder};

use crate::ldap_probe::result::{Phase, ProbeResult};

pub mod server;

pub const CONNECTION_DELAY_METRIC: &str = "ldap_connection_delay";
pub const BIND_DELAY_METRIC: &str = "ldap_bind_delay";
pub const SEARCH_DELAY_METRIC: &str = "ldap_search_delay";
pub const PROBE_FAILURES_METRIC: &str = "ldap_probe_failures_total";

/// Latest value of each delay gauge, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeSnapshot {
    pub connection_ms: f64,
    pub bind_ms: f64,
    pub search_ms: f64,
}

/// The probe's gauges and their registry.
///
/// The scheduler writes one cycle at a time through [`MetricsSink::record`];
/// scrapes read through [`MetricsSink::encode`]. Both go through `cycle`, so a
/// scrape never observes gauges from two different cycles.
pub struct MetricsSink {
    registry: Registry,
    connection: Gauge,
    bind: Gauge,
    search: Gauge,
    failures: IntCounterVec,
    cycle: RwLock<()>,
}

impl MetricsSink {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let connection = Gauge::with_opts(Opts::new(
            CONNECTION_DELAY_METRIC,
            "LDAP connection delay milliseconds",
        ))?;
        let bind = Gauge::with_opts(Opts::new(BIND_DELAY_METRIC, "LDAP bind delay milliseconds"))?;
        let search = Gauge::with_opts(Opts::new(
            SEARCH_DELAY_METRIC,
            "LDAP search request delay milliseconds",
        ))?;
        let failures = IntCounterVec::new(
            Opts::new(PROBE_FAILURES_METRIC, "LDAP probe phase failures"),
            &["phase"],
        )?;

        registry.register(Box::new(connection.clone()))?;
        registry.register(Box::new(bind.clone()))?;
        registry.register(Box::new(search.clone()))?;
        registry.register(Box::new(failures.clone()))?;

        // Export every phase's counter from the start, not only after a first failure.
        for phase in Phase::ALL {
            failures.with_label_values(&[phase.as_str()]);
        }

        Ok(Self {
            registry,
            connection,
            bind,
            search,
            failures,
            cycle: RwLock::new(()),
        })
    }

    /// Publish one cycle's measurements.
    ///
    /// A phase that ran moves its gauge whether it succeeded or failed. Phases
    /// skipped after an earlier failure, or cut short by shutdown, keep the
    /// previous value.
    pub fn record(&self, result: &ProbeResult) {
        let _guard = self.cycle.write().unwrap_or_else(PoisonError::into_inner);

        let gauges = [
            (&result.connection, &self.connection),
            (&result.bind, &self.bind),
            (&result.search, &self.search),
        ];
        for (outcome, gauge) in gauges {
            if let Some(ms) = outcome.measured_ms() {
                gauge.set(ms);
            }
        }

        if let Some(error) = result.failure().filter(|error| !error.is_cancelled()) {
            self.failures.with_label_values(&[error.phase.as_str()]).inc();
        }
    }

    pub fn snapshot(&self) -> GaugeSnapshot {
        let _guard = self.cycle.read().unwrap_or_else(PoisonError::into_inner);
        GaugeSnapshot {
            connection_ms: self.connection.get(),
            bind_ms: self.bind.get(),
            search_ms: self.search.get(),
        }
    }

    #[cfg(test)]
    pub fn failures(&self, phase: Phase) -> u64 {
        self.failures.with_label_values(&[phase.as_str()]).get()
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let families = {
            let _guard = self.cycle.read().unwrap_or_else(PoisonError::into_inner);
            self.registry.gather()
        };

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(buffer)
    }
}
