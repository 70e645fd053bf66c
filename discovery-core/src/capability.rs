//! Runtime state for one agent's offering of one capability.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::CapabilityDescriptor;
use crate::ids::AgentId;

/// Exponential moving average smoothing factor applied to latency
/// samples (spec.md §3: alpha = 0.2).
pub const LATENCY_EMA_ALPHA: f64 = 0.2;

/// Observed health/availability of a capability.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    /// Serving normally.
    Active,
    /// Explicitly disabled.
    Inactive,
    /// Serving, but with reduced quality or partial failures.
    Degraded,
    /// Health has not yet been determined.
    Unknown,
}

/// One agent's offering of one capability, with accumulated runtime
/// statistics (spec.md §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapabilityInfo {
    capability: CapabilityDescriptor,
    agent_id: AgentId,
    agent_name: String,
    status: CapabilityStatus,
    score: f64,
    load: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, String>,
    success_count: u64,
    failure_count: u64,
    #[serde(with = "crate::duration_nanos")]
    avg_latency: Duration,
    registered_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
    last_health_check: Option<DateTime<Utc>>,
}

impl CapabilityInfo {
    /// Creates a new capability record at registration time, with the
    /// configured default score and zeroed statistics.
    #[must_use]
    pub fn new(
        capability: CapabilityDescriptor,
        agent_id: AgentId,
        agent_name: impl Into<String>,
        default_score: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            capability,
            agent_id,
            agent_name: agent_name.into(),
            status: CapabilityStatus::Active,
            score: default_score,
            load: 0.0,
            tags: Vec::new(),
            metadata: HashMap::new(),
            success_count: 0,
            failure_count: 0,
            avg_latency: Duration::ZERO,
            registered_at: now,
            last_updated_at: now,
            last_health_check: None,
        }
    }

    /// Returns the underlying capability descriptor.
    #[must_use]
    pub const fn capability(&self) -> &CapabilityDescriptor {
        &self.capability
    }

    /// Returns the name of the owning agent.
    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Returns the denormalized owner name.
    #[must_use]
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Returns the current health status.
    #[must_use]
    pub const fn status(&self) -> CapabilityStatus {
        self.status
    }

    /// Sets the health status, bumping `last_updated_at`.
    pub fn set_status(&mut self, status: CapabilityStatus, now: DateTime<Utc>) {
        self.status = status;
        self.last_updated_at = now;
    }

    /// Replaces the capability descriptor (name/description/kind) while
    /// preserving `registered_at` and accumulated statistics
    /// (spec.md §4.1: "UpdateCapability preserves the original
    /// `registered_at` timestamp").
    pub fn set_descriptor(&mut self, descriptor: CapabilityDescriptor, now: DateTime<Utc>) {
        self.capability = descriptor;
        self.last_updated_at = now;
    }

    /// Returns the current quality score in `[0, 100]`.
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// Returns the current load in `[0, 1]`, mirroring the owning agent.
    #[must_use]
    pub const fn load(&self) -> f64 {
        self.load
    }

    /// Propagates the owning agent's load onto this capability.
    pub fn set_load(&mut self, load: f64, now: DateTime<Utc>) {
        self.load = load.clamp(0.0, 1.0);
        self.last_updated_at = now;
    }

    /// Returns the capability's tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Replaces the capability's tags.
    pub fn set_tags(&mut self, tags: Vec<String>, now: DateTime<Utc>) {
        self.tags = tags;
        self.last_updated_at = now;
    }

    /// Returns the capability's metadata map.
    #[must_use]
    pub const fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Replaces the capability's metadata map.
    pub fn set_metadata(&mut self, metadata: HashMap<String, String>, now: DateTime<Utc>) {
        self.metadata = metadata;
        self.last_updated_at = now;
    }

    /// Number of recorded successful executions.
    #[must_use]
    pub const fn success_count(&self) -> u64 {
        self.success_count
    }

    /// Number of recorded failed executions.
    #[must_use]
    pub const fn failure_count(&self) -> u64 {
        self.failure_count
    }

    /// The exponentially averaged execution latency.
    #[must_use]
    pub const fn avg_latency(&self) -> Duration {
        self.avg_latency
    }

    /// Timestamp this capability was first registered.
    #[must_use]
    pub const fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Timestamp of the most recent mutation.
    #[must_use]
    pub const fn last_updated_at(&self) -> DateTime<Utc> {
        self.last_updated_at
    }

    /// Timestamp of the most recent health probe, if any.
    #[must_use]
    pub const fn last_health_check(&self) -> Option<DateTime<Utc>> {
        self.last_health_check
    }

    /// Records the outcome of a probe, independent of execution
    /// statistics.
    pub fn record_health_check(&mut self, now: DateTime<Utc>) {
        self.last_health_check = Some(now);
    }

    /// Records an execution outcome: updates success/failure counters,
    /// recomputes the EMA latency, and re-derives `score` as the
    /// observed success ratio × 100 (spec.md §4.1 `RecordExecution`).
    pub fn record_execution(&mut self, success: bool, latency: Duration, now: DateTime<Utc>) {
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }

        self.avg_latency = if self.success_count + self.failure_count <= 1 {
            latency
        } else {
            let prev = self.avg_latency.as_secs_f64();
            let sample = latency.as_secs_f64();
            let smoothed = (1.0 - LATENCY_EMA_ALPHA).mul_add(prev, LATENCY_EMA_ALPHA * sample);
            Duration::from_secs_f64(smoothed.max(0.0))
        };

        let total = self.success_count + self.failure_count;
        self.score = if total == 0 {
            self.score
        } else {
            (self.success_count as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        };

        self.last_updated_at = now;
    }
}
