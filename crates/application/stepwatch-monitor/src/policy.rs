use std::time::Duration;

use serde::{Deserialize, Serialize};

use stepwatch_config::{
    clamp_attempts, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_RECONNECT_BASE_DELAY_MS, DEFAULT_RECONNECT_MAX_DELAY_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// `base * attempt`
    #[default]
    Linear,
    /// `base * 2^(attempt - 1)`
    Exponential,
}

/// Bounded reconnection policy: how many consecutive failures are tolerated
/// and how long to wait before each reopen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    #[serde(rename = "base_delay_ms", with = "millis")]
    pub base_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,
    pub backoff: Backoff,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RECONNECT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RECONNECT_MAX_DELAY_MS),
            backoff: Backoff::Linear,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reopen number `attempt` (1-based), capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let raw = match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(attempt - 1)),
        };
        raw.min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub reconnect: ReconnectPolicy,
    /// An open stream silent for longer than this counts as lost. `None` disables the check.
    #[serde(rename = "idle_timeout_ms", with = "opt_millis")]
    pub idle_timeout: Option<Duration>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            idle_timeout: Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)),
        }
    }
}

impl MonitorConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(raw).map(Self::normalized)
    }

    /// Clamp values into the supported ranges.
    pub fn normalized(mut self) -> Self {
        self.reconnect.max_attempts = clamp_attempts(self.reconnect.max_attempts);
        if self.reconnect.max_delay < self.reconnect.base_delay {
            self.reconnect.max_delay = self.reconnect.base_delay;
        }
        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            self.idle_timeout = None;
        }
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(backoff: Backoff) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: 30,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
            backoff,
        }
    }

    #[test]
    fn linear_backoff_is_capped() {
        let p = policy(Backoff::Linear);
        let delays: Vec<u128> = (1..=8).map(|a| p.delay_for(a).as_millis()).collect();
        assert_eq!(delays, vec![500, 1000, 1500, 2000, 2500, 3000, 3000, 3000]);
    }

    #[test]
    fn exponential_backoff_is_capped_and_never_overflows() {
        let p = policy(Backoff::Exponential);
        let delays: Vec<u128> = (1..=5).map(|a| p.delay_for(a).as_millis()).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 3000, 3000]);
        assert_eq!(p.delay_for(u32::MAX), Duration::from_secs(3));
        assert_eq!(p.delay_for(0), Duration::from_millis(500));
    }

    #[test]
    fn config_parses_partial_json_with_defaults() {
        let cfg = MonitorConfig::from_json(
            r#"{ "reconnect": { "max_attempts": 5, "backoff": "exponential" }, "idle_timeout_ms": 0 }"#,
        )
        .unwrap();
        assert_eq!(cfg.reconnect.max_attempts, 5);
        assert_eq!(cfg.reconnect.backoff, Backoff::Exponential);
        assert_eq!(
            cfg.reconnect.base_delay,
            Duration::from_millis(DEFAULT_RECONNECT_BASE_DELAY_MS)
        );
        assert_eq!(cfg.idle_timeout, None, "zero disables the idle check");

        let cfg = MonitorConfig::from_json("{}").unwrap();
        assert_eq!(cfg, MonitorConfig::default());
    }

    #[test]
    fn normalization_clamps_out_of_range_values() {
        let cfg = MonitorConfig::from_json(
            r#"{ "reconnect": { "max_attempts": 4000000000, "base_delay_ms": 5000, "max_delay_ms": 10 } }"#,
        )
        .unwrap();
        assert_eq!(
            cfg.reconnect.max_attempts,
            stepwatch_config::MAX_RECONNECT_ATTEMPTS
        );
        assert_eq!(cfg.reconnect.max_delay, Duration::from_millis(5000));
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = MonitorConfig::default();
        let raw = serde_json::to_string(&cfg).unwrap();
        assert!(raw.contains("\"idle_timeout_ms\":90000"));
        assert_eq!(MonitorConfig::from_json(&raw).unwrap(), cfg);
    }
}
