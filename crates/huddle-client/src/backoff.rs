//! Reconnect delay policy.

use std::time::Duration;

use huddle_settings::ClientSettings;

/// Exponential backoff with symmetric jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on the un-jittered delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter range (0.0–1.0).
    pub jitter_factor: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_settings(&ClientSettings::default())
    }
}

impl ReconnectPolicy {
    /// Build from the `client` settings section.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            base_delay_ms: settings.reconnect_base_delay_ms,
            max_delay_ms: settings.reconnect_max_delay_ms,
            jitter_factor: settings.jitter_factor,
        }
    }

    /// Delay before retry number `attempt` (zero-based), using a fresh random draw.
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_with_random(attempt, rand::random::<f64>()))
    }

    /// Deterministic form of [`delay`](Self::delay). `random` is in `[0.0, 1.0)`.
    ///
    /// `base * 2^attempt`, capped at `max`, then scaled by
    /// `1 ± jitter_factor`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_with_random(&self, attempt: u32, random: f64) -> u64 {
        let exponential = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(31));
        let capped = exponential.min(self.max_delay_ms);
        let jitter = 1.0 + (random * 2.0 - 1.0) * self.jitter_factor;
        ((capped as f64) * jitter).round().max(0.0) as u64
    }
}
