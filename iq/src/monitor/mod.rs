//! Idle detection by timer drift
//!
//! A repeating timer fires roughly every `tick` milliseconds. When the host is
//! busy its callbacks are delayed, so the measured gap between polls grows.
//! A run of on-time polls is taken as evidence that the host is idle.

mod config;
mod core;

pub use config::MonitorConfig;
pub use core::{IdleMonitor, MonitorStats, PollOutcome};
