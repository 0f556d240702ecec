use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine-wide tunables. Every field has a default, so partial config
/// files deserialize cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long an idle channel waits before looking for work again.
    pub poll_interval_ms: u64,
    /// Bandwidth of channels created by `connect`.
    pub default_bandwidth: usize,
    /// Latency of channels created by `connect`.
    pub default_latency_ms: u64,
    /// How far an event subscriber may fall behind before events are skipped.
    pub event_capacity: usize,
    /// Retry cadence for starved production nodes. When unset, a starved
    /// node retries after its own production interval. A zero retry is
    /// raised to the poll interval.
    pub starvation_retry_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            default_bandwidth: 1000,
            default_latency_ms: 0,
            event_capacity: 1024,
            starvation_retry_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.poll_interval_ms == 0 {
            return Err(FlowError::InvalidParameter(
                "poll_interval_ms must be positive".into(),
            ));
        }
        if self.default_bandwidth == 0 {
            return Err(FlowError::InvalidParameter(
                "default_bandwidth must be at least 1".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(FlowError::InvalidParameter(
                "event_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn default_latency(&self) -> Duration {
        Duration::from_millis(self.default_latency_ms)
    }

    /// Wait before a starved node retries, given its production interval.
    /// A zero retry becomes one poll interval.
    pub fn starvation_retry(&self, interval: Duration) -> Duration {
        let retry = self
            .starvation_retry_ms
            .map_or(interval, Duration::from_millis);
        if retry.is_zero() {
            self.poll_interval()
        } else {
            retry
        }
    }
}
