//! Configuration settings for the reconciler.
//!
//! This module defines runtime configuration for flush scheduling and telemetry.
//! Configuration can be loaded from environment variables or constructed
//! programmatically.

use core::time::Duration;
use std::env;

/// Runtime configuration for a rendered application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Whether mutation requests are batched into one flush per frame
    pub batching: bool,
    /// Frame interval in milliseconds used by timer-driven frame loops
    pub frame_interval_ms: u64,
    /// Whether to emit flush counters through the log after every flush
    pub telemetry_enabled: bool,
}

impl ReconcilerConfig {
    /// Construct a new `ReconcilerConfig` with explicit values.
    ///
    /// # Arguments
    ///
    /// * `batching` - Batch mutations per frame instead of flushing synchronously
    /// * `frame_interval_ms` - Frame interval in milliseconds (minimum 1ms)
    /// * `telemetry_enabled` - Whether to emit telemetry logs
    #[inline]
    #[must_use]
    pub const fn new(batching: bool, frame_interval_ms: u64, telemetry_enabled: bool) -> Self {
        let interval = if frame_interval_ms < 1 {
            1
        } else {
            frame_interval_ms
        };
        Self {
            batching,
            frame_interval_ms: interval,
            telemetry_enabled,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `RECONCILER_BATCHING`: Set to "0" to flush synchronously (default: batched)
    /// - `RECONCILER_FRAME_MS`: Frame interval in milliseconds (default: 16)
    /// - `RECONCILER_TELEMETRY`: Set to "1" to enable telemetry (default: disabled)
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        let batching = env::var("RECONCILER_BATCHING").ok().as_deref() != Some("0");
        let frame_interval_ms = env::var("RECONCILER_FRAME_MS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(16)
            .max(1);
        let telemetry_enabled = env::var("RECONCILER_TELEMETRY").ok().as_deref() == Some("1");
        Self {
            batching,
            frame_interval_ms,
            telemetry_enabled,
        }
    }

    /// Get the frame interval as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::new(true, 16, false)
    }
}

/// How a rendered application turns mutation requests into flushes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Coalesce requests and flush once on the next frame.
    Batched,
    /// Flush synchronously before the request returns.
    Immediate,
}

/// Options for [`crate::App::render`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub mode: Mode,
    pub telemetry: bool,
}

impl RenderOptions {
    #[inline]
    #[must_use]
    pub const fn from_config(config: &ReconcilerConfig) -> Self {
        Self {
            mode: if config.batching {
                Mode::Batched
            } else {
                Mode::Immediate
            },
            telemetry: config.telemetry_enabled,
        }
    }

    #[inline]
    #[must_use]
    pub const fn batched() -> Self {
        Self {
            mode: Mode::Batched,
            telemetry: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            mode: Mode::Immediate,
            telemetry: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_telemetry(mut self, enabled: bool) -> Self {
        self.telemetry = enabled;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&ReconcilerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_clamped_to_one_millisecond() {
        let config = ReconcilerConfig::new(true, 0, false);
        assert_eq!(config.frame_interval(), Duration::from_millis(1));
    }

    #[test]
    fn defaults_batch_without_telemetry() {
        let options = RenderOptions::default();
        assert_eq!(options.mode, Mode::Batched);
        assert!(!options.telemetry);
        assert_eq!(ReconcilerConfig::default().frame_interval_ms, 16);
    }

    #[test]
    fn options_follow_config() {
        let config = ReconcilerConfig::new(false, 8, true);
        let options = RenderOptions::from_config(&config);
        assert_eq!(options, RenderOptions::immediate().with_telemetry(true));
    }
}
