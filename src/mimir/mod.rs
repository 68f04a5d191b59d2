use std::time::Duration;

use reqwest::Client;

use crate::config::RemoteWriteConfig;
use crate::metrics::{
    BIND_DELAY_METRIC, CONNECTION_DELAY_METRIC, GaugeSnapshot, SEARCH_DELAY_METRIC,
};

pub mod client;
pub mod prompb;

const INSTANCE_LABEL: &str = "instance";
const JOB_LABEL: &str = "job";
const LDAPBOX_JOB: &str = "ldapbox";

const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

fn create_time_series(metric_name: &str, instance: &str, value: f64) -> prompb::TimeSeries {
    let labels = [(INSTANCE_LABEL, instance), (JOB_LABEL, LDAPBOX_JOB)];
    client::create_time_series(metric_name, &labels, value, None)
}

/// Creates one series per delay gauge from the current gauge values.
/// ## Arguments:
///     - `snapshot`: The gauge values to push.
///     - `instance`: The `host:port` of the probed directory.
pub fn create_probe_metrics(snapshot: &GaugeSnapshot, instance: &str) -> Vec<prompb::TimeSeries> {
    vec![
        create_time_series(CONNECTION_DELAY_METRIC, instance, snapshot.connection_ms),
        create_time_series(BIND_DELAY_METRIC, instance, snapshot.bind_ms),
        create_time_series(SEARCH_DELAY_METRIC, instance, snapshot.search_ms),
    ]
}

/// Pushes gauge snapshots to a Mimir tenant after every probe cycle.
pub struct RemoteWrite {
    client: Client,
    config: RemoteWriteConfig,
    instance: String,
}

impl RemoteWrite {
    pub fn new(config: RemoteWriteConfig, instance: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(PUSH_TIMEOUT)
            .user_agent(concat!("ldapbox/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            config,
            instance,
        })
    }

    /// Push `snapshot`. Failures are logged and otherwise ignored.
    pub async fn push(&self, snapshot: &GaugeSnapshot) {
        let metrics = create_probe_metrics(snapshot, &self.instance);
        if let Err(e) = client::send_to_mimir(
            &self.client,
            &self.config.endpoint,
            self.config.tenant.as_deref(),
            metrics,
        )
        .await
        {
            tracing::warn!(endpoint = %self.config.endpoint, error = %e, "Failed to send metrics to Mimir");
        }
    }
}
