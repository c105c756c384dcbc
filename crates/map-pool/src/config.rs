//! Pool configuration.

use std::time::Duration;

/// Tunables for a [`KeyedPool`](crate::KeyedPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum simultaneously checked-out resources per identity.
    pub max_per_identity: usize,

    /// Default deadline for `acquire`. `None` waits forever.
    pub acquire_timeout: Option<Duration>,

    /// Idle resources older than this are destroyed by the sweeper.
    pub idle_timeout: Duration,

    /// Minimum idle resources the sweeper leaves warm per identity.
    pub min_idle: usize,

    /// How often the background sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_per_identity: 4,
            acquire_timeout: Some(Duration::from_secs(5)),
            idle_timeout: Duration::from_secs(300),
            min_idle: 0,
            sweep_interval: Duration::from_secs(60),
        }
    }
}
