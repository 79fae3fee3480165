//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::EvictionPolicy;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Size budget of the in-memory tier in bytes
    pub max_size_bytes: u64,
    /// TTL applied when `set` is called without one; `None` = no expiry
    pub default_ttl_seconds: Option<u64>,
    /// Victim selection policy when the budget is exceeded
    pub eviction_policy: EvictionPolicy,
    /// Interval between expired-entry sweeps
    pub sweep_interval_seconds: u64,
    /// Interval between durable-store backups; `0` disables backups
    pub backup_interval_hours: u64,
    /// Number of backup files kept after rotation
    pub backup_retention_count: usize,
    /// Root directory for the durable store and its backups
    pub data_dir: PathBuf,
    /// HTTP server port
    pub server_port: u16,
    /// Scheduler poll interval in milliseconds
    pub scheduler_tick_ms: u64,
    /// Attempts granted to tasks submitted without an explicit limit
    pub default_max_attempts: u32,
    /// Execution timeout for tasks submitted without an explicit one
    pub default_task_timeout_seconds: u64,
    /// First retry delay; doubled on every further attempt
    pub retry_backoff_base_ms: u64,
    /// Upper bound for the retry delay
    pub retry_backoff_max_ms: u64,
    /// Idle workers silent for longer than this go offline; `None` disables
    pub worker_heartbeat_timeout_seconds: Option<u64>,
    /// Buffered events per subscriber
    pub event_channel_capacity: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_SIZE_BYTES` - Cache budget in bytes (default: 100 MiB)
    /// - `DEFAULT_TTL_SECONDS` - Default TTL, `0` for none (default: 3600)
    /// - `EVICTION_POLICY` - `lru`, `lfu` or `fifo` (default: lru)
    /// - `SWEEP_INTERVAL_SECONDS` - Expiry sweep frequency (default: 60)
    /// - `BACKUP_INTERVAL_HOURS` - Backup frequency, `0` disables (default: 24)
    /// - `BACKUP_RETENTION_COUNT` - Backups kept (default: 7)
    /// - `DATA_DIR` - Durable data root (default: ./data)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SCHEDULER_TICK_MS` - Scheduler poll interval (default: 5000)
    /// - `DEFAULT_MAX_ATTEMPTS` - Task attempts (default: 3)
    /// - `DEFAULT_TASK_TIMEOUT_SECONDS` - Task timeout (default: 300)
    /// - `RETRY_BACKOFF_BASE_MS` / `RETRY_BACKOFF_MAX_MS` - Retry delay (default: 1000 / 60000)
    /// - `WORKER_HEARTBEAT_TIMEOUT_SECONDS` - `0` disables (default: 0)
    /// - `EVENT_CHANNEL_CAPACITY` - Event buffer (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_size_bytes: env_or("MAX_SIZE_BYTES", defaults.max_size_bytes),
            default_ttl_seconds: optional_secs(env_or(
                "DEFAULT_TTL_SECONDS",
                defaults.default_ttl_seconds.unwrap_or(0),
            )),
            eviction_policy: env_or("EVICTION_POLICY", defaults.eviction_policy),
            sweep_interval_seconds: env_or(
                "SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval_seconds,
            ),
            backup_interval_hours: env_or("BACKUP_INTERVAL_HOURS", defaults.backup_interval_hours),
            backup_retention_count: env_or(
                "BACKUP_RETENTION_COUNT",
                defaults.backup_retention_count,
            ),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            scheduler_tick_ms: env_or("SCHEDULER_TICK_MS", defaults.scheduler_tick_ms),
            default_max_attempts: env_or("DEFAULT_MAX_ATTEMPTS", defaults.default_max_attempts),
            default_task_timeout_seconds: env_or(
                "DEFAULT_TASK_TIMEOUT_SECONDS",
                defaults.default_task_timeout_seconds,
            ),
            retry_backoff_base_ms: env_or("RETRY_BACKOFF_BASE_MS", defaults.retry_backoff_base_ms),
            retry_backoff_max_ms: env_or("RETRY_BACKOFF_MAX_MS", defaults.retry_backoff_max_ms),
            worker_heartbeat_timeout_seconds: optional_secs(env_or(
                "WORKER_HEARTBEAT_TIMEOUT_SECONDS",
                0,
            )),
            event_channel_capacity: env_or(
                "EVENT_CHANNEL_CAPACITY",
                defaults.event_channel_capacity,
            ),
        }
    }

    /// Directory holding one record per cache key.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    /// Directory holding rotated backups of the durable store.
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// Backup interval, or `None` when backups are disabled.
    pub fn backup_interval(&self) -> Option<Duration> {
        (self.backup_interval_hours > 0)
            .then(|| Duration::from_secs(self.backup_interval_hours * 60 * 60))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_size_bytes: 100 * 1024 * 1024,
            default_ttl_seconds: Some(3600),
            eviction_policy: EvictionPolicy::Lru,
            sweep_interval_seconds: 60,
            backup_interval_hours: 24,
            backup_retention_count: 7,
            data_dir: PathBuf::from("./data"),
            server_port: 3000,
            scheduler_tick_ms: 5000,
            default_max_attempts: 3,
            default_task_timeout_seconds: 300,
            retry_backoff_base_ms: 1000,
            retry_backoff_max_ms: 60_000,
            worker_heartbeat_timeout_seconds: None,
            event_channel_capacity: 1000,
        }
    }
}

/// Reads and parses an environment variable, falling back on absence or parse failure.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn optional_secs(secs: u64) -> Option<u64> {
    (secs > 0).then_some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_size_bytes, 104_857_600);
        assert_eq!(config.default_ttl_seconds, Some(3600));
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert_eq!(config.sweep_interval_seconds, 60);
        assert_eq!(config.backup_interval_hours, 24);
        assert_eq!(config.backup_retention_count, 7);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.default_max_attempts, 3);
        assert_eq!(config.default_task_timeout_seconds, 300);
        assert!(config.worker_heartbeat_timeout_seconds.is_none());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "MAX_SIZE_BYTES",
            "DEFAULT_TTL_SECONDS",
            "EVICTION_POLICY",
            "SWEEP_INTERVAL_SECONDS",
            "SERVER_PORT",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env();
        assert_eq!(config.max_size_bytes, 104_857_600);
        assert_eq!(config.default_ttl_seconds, Some(3600));
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert_eq!(config.sweep_interval_seconds, 60);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("TIERED_CACHE_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("TIERED_CACHE_TEST_GARBAGE", 42u64), 42);
        env::remove_var("TIERED_CACHE_TEST_GARBAGE");
    }

    #[test]
    fn test_env_or_parses_policy() {
        env::set_var("TIERED_CACHE_TEST_POLICY", "LFU");
        assert_eq!(
            env_or("TIERED_CACHE_TEST_POLICY", EvictionPolicy::Lru),
            EvictionPolicy::Lfu
        );
        env::remove_var("TIERED_CACHE_TEST_POLICY");
    }

    #[test]
    fn test_zero_disables_optional_durations() {
        assert_eq!(optional_secs(0), None);
        assert_eq!(optional_secs(5), Some(5));

        let config = Config {
            backup_interval_hours: 0,
            ..Config::default()
        };
        assert!(config.backup_interval().is_none());
        assert_eq!(
            Config::default().backup_interval(),
            Some(Duration::from_secs(24 * 3600))
        );
    }

    #[test]
    fn test_data_subdirectories() {
        let config = Config {
            data_dir: PathBuf::from("/var/lib/tc"),
            ..Config::default()
        };
        assert_eq!(config.cache_dir(), PathBuf::from("/var/lib/tc/cache"));
        assert_eq!(config.backup_dir(), PathBuf::from("/var/lib/tc/backups"));
    }
}
