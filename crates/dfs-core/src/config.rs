//! Configuration types for the naming core

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shared accesses a file tolerates before it is replicated.
pub const DEFAULT_REPLICATION_THRESHOLD: u32 = 20;

/// How `create_file` chooses the storage node that hosts a new file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementPolicy {
    /// The most recently registered storage node hosts every new file.
    #[default]
    LastRegistered,
    /// Rotate through registered storage nodes in registration order.
    RoundRobin,
}

/// Main naming server configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Replication triggers once a file's access counter exceeds this value.
    pub replication_threshold: u32,
    /// Upper bound on a single per-node lock wait. `None` waits forever.
    pub lock_wait_timeout_ms: Option<u64>,
    /// Connect/read/write timeout for commands sent to storage nodes.
    pub command_timeout_ms: u64,
    pub placement: PlacementPolicy,
}

impl NamingConfig {
    pub fn lock_wait_timeout(&self) -> Option<Duration> {
        self.lock_wait_timeout_ms.map(Duration::from_millis)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            replication_threshold: DEFAULT_REPLICATION_THRESHOLD,
            lock_wait_timeout_ms: None,
            command_timeout_ms: 5000,
            placement: PlacementPolicy::default(),
        }
    }
}
