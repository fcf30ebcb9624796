use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 3_000;
/// Shortest poll period the store will use.
pub const MIN_INTERVAL_MS: u64 = 100;

/// Polling settings for a `NodeStatusStore`.
///
/// Deserializes from `{ "intervalMs": 1000, "timeoutMs": 2000 }`; missing
/// keys fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(alias = "interval_ms")]
    pub interval_ms: u64,
    #[serde(alias = "timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl SyncConfig {
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Defaults overridden by `NODEWATCH_INTERVAL_MS` / `NODEWATCH_TIMEOUT_MS`.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let interval_ms = std::env::var("NODEWATCH_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.interval_ms);
        let timeout_ms = std::env::var("NODEWATCH_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.timeout_ms);
        Self {
            interval_ms,
            timeout_ms,
        }
    }

    /// Poll period, never below `MIN_INTERVAL_MS`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(MIN_INTERVAL_MS))
    }

    /// Bound on a single fetch attempt. Zero means "same as the interval".
    pub fn timeout(&self) -> Duration {
        if self.timeout_ms == 0 {
            self.interval()
        } else {
            Duration::from_millis(self.timeout_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial() {
        let cfg: SyncConfig = serde_json::from_str(r#"{"intervalMs": 1000}"#).unwrap();
        assert_eq!(cfg.interval_ms, 1000);
        assert_eq!(cfg.timeout_ms, DEFAULT_TIMEOUT_MS);

        let cfg: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, SyncConfig::default());

        let cfg: SyncConfig = serde_json::from_str(r#"{"timeout_ms": 250}"#).unwrap();
        assert_eq!(cfg.timeout_ms, 250);
    }

    #[test]
    fn test_interval_is_clamped() {
        let cfg = SyncConfig::default().with_interval_ms(0);
        assert_eq!(cfg.interval(), Duration::from_millis(MIN_INTERVAL_MS));

        let cfg = SyncConfig::default().with_interval_ms(1500);
        assert_eq!(cfg.interval(), Duration::from_millis(1500));
    }

    #[test]
    fn test_zero_timeout_follows_interval() {
        let cfg = SyncConfig::default().with_interval_ms(2000).with_timeout_ms(0);
        assert_eq!(cfg.timeout(), Duration::from_millis(2000));
    }
}
