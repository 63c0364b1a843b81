//! Scheduler configuration

use serde::{Deserialize, Serialize};

/// What happens to the rest of a batch when one callback fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failure; the remaining callbacks are dropped
    #[default]
    Abort,
    /// Run every callback, then report the first failure
    Isolate,
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Debounce delay for newly created labels, in milliseconds
    #[serde(rename = "default-interval-ms", default = "default_interval_ms")]
    pub default_interval_ms: u64,

    /// Handling of failing callbacks within a batch
    #[serde(rename = "failure-policy", default)]
    pub failure_policy: FailurePolicy,

    /// Mode for labels created without an explicit debounce or queue choice
    #[serde(rename = "default-queue", default)]
    pub default_queue: bool,
}

fn default_interval_ms() -> u64 {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: default_interval_ms(),
            failure_policy: FailurePolicy::Abort,
            default_queue: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.default_interval_ms, 100);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert!(!config.default_queue);
    }

    #[test]
    fn test_failure_policy_yaml() {
        let config: SchedulerConfig = serde_yaml::from_str("failure-policy: isolate\ndefault-queue: true").unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Isolate);
        assert!(config.default_queue);
        assert_eq!(config.default_interval_ms, 100);
    }
}
