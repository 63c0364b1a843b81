//! Idle monitor configuration

use serde::{Deserialize, Serialize};

/// Idle monitor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Expected poll interval in milliseconds
    #[serde(rename = "tick-ms", default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Consecutive on-time polls required to declare idle
    #[serde(rename = "idle-threshold", default = "default_idle_threshold")]
    pub idle_threshold: u32,

    /// Jitter absorbed before a poll counts as late
    #[serde(rename = "fuzziness-ms", default = "default_fuzziness_ms")]
    pub fuzziness_ms: u64,
}

fn default_tick_ms() -> u64 {
    17
}

fn default_idle_threshold() -> u32 {
    100
}

fn default_fuzziness_ms() -> u64 {
    2
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            idle_threshold: default_idle_threshold(),
            fuzziness_ms: default_fuzziness_ms(),
        }
    }
}

impl MonitorConfig {
    /// Largest gap between polls that still counts as on time
    pub fn late_after_ms(&self) -> u64 {
        self.tick_ms.saturating_add(self.fuzziness_ms)
    }
}
