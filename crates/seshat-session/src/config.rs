//! Configuration for the session cache.

use std::time::Duration;

/// Default inactivity window (seconds) assigned to decoded legacy records,
/// which never stored one of their own.
pub const DEFAULT_LEGACY_MAX_INACTIVE_INTERVAL: i64 = 1800;

/// Default minimum time between key-set re-syncs from the table.
pub const DEFAULT_KEYS_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Configuration for [`SessionCache`](crate::SessionCache).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delete records that no converter can read.
    ///
    /// When disabled, unreadable records are left in place for manual
    /// inspection; loads still return nothing for them.
    pub delete_corrupt_records: bool,

    /// Minimum interval between [`refresh_keys`](crate::SessionCache::refresh_keys)
    /// actually hitting the table. Other instances share the table, so the
    /// local key set drifts and is re-synced at most this often.
    pub keys_refresh_interval: Duration,

    /// Inactivity window (seconds) assigned to sessions decoded from
    /// legacy records.
    pub legacy_max_inactive_interval: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            delete_corrupt_records: true,
            keys_refresh_interval: DEFAULT_KEYS_REFRESH_INTERVAL,
            legacy_max_inactive_interval: DEFAULT_LEGACY_MAX_INACTIVE_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable deletion of unreadable records.
    pub fn with_delete_corrupt_records(mut self, delete: bool) -> Self {
        self.delete_corrupt_records = delete;
        self
    }

    /// Set the minimum key re-sync interval.
    pub fn with_keys_refresh_interval(mut self, interval: Duration) -> Self {
        self.keys_refresh_interval = interval;
        self
    }

    /// Set the inactivity window assigned to legacy records.
    pub fn with_legacy_max_inactive_interval(mut self, seconds: i64) -> Self {
        self.legacy_max_inactive_interval = seconds;
        self
    }
}
