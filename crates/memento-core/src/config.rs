//! Environment configuration (spec §6 "Environment configuration (enumerated)").

use std::env;

fn parse_bool_env(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<bool>().ok())
        .unwrap_or(default)
}

fn parse_int_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn clamp_hops(hops: u8) -> u8 {
    hops.clamp(1, 5)
}

/// History-layer configuration (spec §4.3, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Toggles every history-emitting operation (`appendVersion`, `openEdge`,
    /// `closeEdge`, `createCheckpoint`, ...) between real writes and
    /// synthetic no-ops (spec §9 "History flag everywhere").
    pub enabled: bool,
    /// Default checkpoint radius, clamped to `[1,5]`.
    pub checkpoint_hops: u8,
    /// Whether incident-triggered checkpoints are enabled.
    pub incident_enabled: bool,
    /// Incident checkpoint radius, clamped to `[1,5]`.
    pub incident_hops: u8,
    /// Whether checkpoint members are also embedded, tagged with their
    /// `checkpointId`.
    pub embed_versions: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            checkpoint_hops: 2,
            incident_enabled: true,
            incident_hops: 3,
            embed_versions: false,
        }
    }
}

impl HistoryConfig {
    /// Load from environment variables, falling back to spec defaults for
    /// anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: parse_bool_env("HISTORY_ENABLED", defaults.enabled),
            checkpoint_hops: clamp_hops(parse_int_env(
                "HISTORY_CHECKPOINT_HOPS",
                defaults.checkpoint_hops,
            )),
            incident_enabled: parse_bool_env("HISTORY_INCIDENT_ENABLED", defaults.incident_enabled),
            incident_hops: clamp_hops(parse_int_env("HISTORY_INCIDENT_HOPS", defaults.incident_hops)),
            embed_versions: parse_bool_env("HISTORY_EMBED_VERSIONS", defaults.embed_versions),
        }
    }
}

/// Synchronization Coordinator tunables (spec §4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Bounded concurrency for per-file work within one operation.
    pub max_concurrency: usize,
    /// File batch size for bulk upserts.
    pub batch_size: usize,
    /// Maximum number of retry attempts before `operationAbandoned`.
    pub max_retry_attempts: u32,
    /// Base retry delay in seconds; actual delay is `retry_delay * attempt`.
    pub retry_delay_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            batch_size: 10,
            max_retry_attempts: 3,
            retry_delay_secs: 5,
        }
    }
}

impl SyncConfig {
    /// Load from environment variables, falling back to spec defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrency: parse_int_env("MEMENTO_MAX_CONCURRENCY", defaults.max_concurrency),
            batch_size: parse_int_env("MEMENTO_BATCH_SIZE", defaults.batch_size),
            max_retry_attempts: parse_int_env(
                "MEMENTO_MAX_RETRY_ATTEMPTS",
                defaults.max_retry_attempts,
            ),
            retry_delay_secs: parse_int_env("MEMENTO_RETRY_DELAY_SECS", defaults.retry_delay_secs),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub history: HistoryConfig,
    pub sync: SyncConfig,
}

impl EngineConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            history: HistoryConfig::from_env(),
            sync: SyncConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize the tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn history_defaults_match_spec() {
        let h = HistoryConfig::default();
        assert!(h.enabled);
        assert_eq!(h.checkpoint_hops, 2);
        assert!(h.incident_enabled);
        assert_eq!(h.incident_hops, 3);
        assert!(!h.embed_versions);
    }

    #[test]
    fn sync_defaults_match_spec() {
        let s = SyncConfig::default();
        assert_eq!(s.max_concurrency, 4);
        assert_eq!(s.batch_size, 10);
        assert_eq!(s.max_retry_attempts, 3);
        assert_eq!(s.retry_delay_secs, 5);
    }

    #[test]
    fn checkpoint_hops_are_clamped_from_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("HISTORY_CHECKPOINT_HOPS", "9");
        let h = HistoryConfig::from_env();
        assert_eq!(h.checkpoint_hops, 5);
        env::remove_var("HISTORY_CHECKPOINT_HOPS");
    }

    #[test]
    fn history_enabled_reads_from_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("HISTORY_ENABLED", "false");
        let h = HistoryConfig::from_env();
        assert!(!h.enabled);
        env::remove_var("HISTORY_ENABLED");
    }

    #[test]
    fn unparseable_env_falls_back_to_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("HISTORY_CHECKPOINT_HOPS", "not-a-number");
        let h = HistoryConfig::from_env();
        assert_eq!(h.checkpoint_hops, 2);
        env::remove_var("HISTORY_CHECKPOINT_HOPS");
    }
}
