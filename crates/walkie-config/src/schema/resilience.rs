use serde::{Deserialize, Serialize};

/// Session-level reconnect loop that outlives the transport's retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// How long a disconnection may last before the session reports "retrying".
    pub grace_period_ms: u64,
    /// Interval between forced reconnect cycles.
    pub retry_interval_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 2000,
            retry_interval_ms: 2000,
        }
    }
}
