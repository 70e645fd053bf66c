//! Concrete [`RemoteHealthProbe`] backed by [`DiscoveryClient`], wired
//! into `discovery-registry`'s [`discovery_registry::HealthChecker`] by
//! `discovery-service`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use discovery_registry::{ProbeOutcome, RemoteHealthProbe};

use crate::client::DiscoveryClient;

/// Probes a remote agent's `GET /discovery/health` endpoint.
pub struct HttpHealthProbe {
    client: DiscoveryClient,
}

impl HttpHealthProbe {
    /// Creates a probe using its own HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self { client: DiscoveryClient::new(Duration::from_secs(5)) }
    }
}

impl Default for HttpHealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteHealthProbe for HttpHealthProbe {
    async fn probe(&self, endpoint: &str, timeout: Duration) -> ProbeOutcome {
        let url = format!("{}/discovery/health", endpoint.trim_end_matches('/'));
        let started = Instant::now();
        match tokio::time::timeout(timeout, self.client.discover_health(&url)).await {
            Ok(Ok(())) => ProbeOutcome { healthy: true, latency: started.elapsed(), reason: "" },
            Ok(Err(_)) => ProbeOutcome { healthy: false, latency: started.elapsed(), reason: "http probe failed" },
            Err(_) => ProbeOutcome { healthy: false, latency: started.elapsed(), reason: "health probe timed out" },
        }
    }
}
