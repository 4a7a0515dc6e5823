use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{error::Error, Result};

pub const DEFAULT_TIER: &str = "default";

/// Operation classes that carry their own quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    RequestsPerMinute,
    RequestsPerHour,
    CodeExecutionsPerMinute,
    AiRequestsPerMinute,
}

impl LimitType {
    pub const ALL: [LimitType; 4] = [
        LimitType::RequestsPerMinute,
        LimitType::RequestsPerHour,
        LimitType::CodeExecutionsPerMinute,
        LimitType::AiRequestsPerMinute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitType::RequestsPerMinute => "requests_per_minute",
            LimitType::RequestsPerHour => "requests_per_hour",
            LimitType::CodeExecutionsPerMinute => "code_executions_per_minute",
            LimitType::AiRequestsPerMinute => "ai_requests_per_minute",
        }
    }

    /// Window length follows the name: `*_per_hour` limits use an hour,
    /// everything else a minute.
    pub fn window(&self) -> Duration {
        window_for(self.as_str())
    }
}

pub(crate) fn window_for(name: &str) -> Duration {
    if name.ends_with("_per_hour") {
        Duration::from_secs(3600)
    } else {
        Duration::from_secs(60)
    }
}

/// Longest window of any limit type; the sweep keeps nothing older.
pub fn longest_window() -> Duration {
    LimitType::ALL
        .iter()
        .map(LimitType::window)
        .max()
        .unwrap_or(Duration::from_secs(60))
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        LimitType::ALL
            .into_iter()
            .find(|limit| limit.as_str() == s)
            .ok_or_else(|| format!("Unknown limit type: {}", s))
    }
}

/// Ceilings for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierLimits {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub code_executions_per_minute: u32,
    pub ai_requests_per_minute: u32,
}

impl TierLimits {
    pub const fn new(
        requests_per_minute: u32,
        requests_per_hour: u32,
        code_executions_per_minute: u32,
        ai_requests_per_minute: u32,
    ) -> Self {
        Self {
            requests_per_minute,
            requests_per_hour,
            code_executions_per_minute,
            ai_requests_per_minute,
        }
    }

    pub fn ceiling(&self, limit_type: LimitType) -> u32 {
        match limit_type {
            LimitType::RequestsPerMinute => self.requests_per_minute,
            LimitType::RequestsPerHour => self.requests_per_hour,
            LimitType::CodeExecutionsPerMinute => self.code_executions_per_minute,
            LimitType::AiRequestsPerMinute => self.ai_requests_per_minute,
        }
    }
}

impl Default for TierLimits {
    fn default() -> Self {
        Self::new(60, 1000, 10, 20)
    }
}

fn builtin_tiers() -> HashMap<String, TierLimits> {
    HashMap::from([
        (DEFAULT_TIER.to_string(), TierLimits::default()),
        ("premium".to_string(), TierLimits::new(90, 2500, 25, 50)),
        ("admin".to_string(), TierLimits::new(120, 5000, 50, 100)),
        ("demo".to_string(), TierLimits::new(30, 500, 5, 10)),
    ])
}

/// A tier as written in a config file; missing fields keep the base tier's
/// values.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TierOverride {
    requests_per_minute: Option<u32>,
    requests_per_hour: Option<u32>,
    code_executions_per_minute: Option<u32>,
    ai_requests_per_minute: Option<u32>,
}

impl TierOverride {
    fn apply(self, base: TierLimits) -> TierLimits {
        TierLimits {
            requests_per_minute: self.requests_per_minute.unwrap_or(base.requests_per_minute),
            requests_per_hour: self.requests_per_hour.unwrap_or(base.requests_per_hour),
            code_executions_per_minute: self
                .code_executions_per_minute
                .unwrap_or(base.code_executions_per_minute),
            ai_requests_per_minute: self
                .ai_requests_per_minute
                .unwrap_or(base.ai_requests_per_minute),
        }
    }
}

/// Configured tiers layered over the built-in ones. A built-in tier keeps
/// every ceiling the file does not mention; a new tier starts from the
/// default tier.
fn deserialize_tiers<'de, D>(
    deserializer: D,
) -> std::result::Result<HashMap<String, TierLimits>, D::Error>
where
    D: Deserializer<'de>,
{
    let configured = HashMap::<String, TierOverride>::deserialize(deserializer)?;
    let mut tiers = builtin_tiers();
    for (name, overrides) in configured {
        let base = tiers.get(&name).copied().unwrap_or_default();
        tiers.insert(name, overrides.apply(base));
    }
    Ok(tiers)
}

/// Tier table and sweep cadence for a [`RateLimiter`](super::RateLimiter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    #[serde(deserialize_with = "deserialize_tiers")]
    pub tiers: HashMap<String, TierLimits>,
    /// How often the background sweep drops stale windows
    #[serde(with = "crate::types::duration_serde")]
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            tiers: builtin_tiers(),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl RateLimitConfig {
    /// Ceilings for `tier`, falling back to the default tier when the name
    /// is not configured.
    pub fn limits_for(&self, tier: &str) -> TierLimits {
        self.tiers
            .get(tier)
            .or_else(|| self.tiers.get(DEFAULT_TIER))
            .copied()
            .unwrap_or_default()
    }

    /// Replaces one ceiling of one tier, creating the tier from the default
    /// tier's values if needed.
    pub fn with_ceiling(mut self, tier: &str, limit_type: LimitType, ceiling: u32) -> Self {
        let mut limits = self.limits_for(tier);
        match limit_type {
            LimitType::RequestsPerMinute => limits.requests_per_minute = ceiling,
            LimitType::RequestsPerHour => limits.requests_per_hour = ceiling,
            LimitType::CodeExecutionsPerMinute => limits.code_executions_per_minute = ceiling,
            LimitType::AiRequestsPerMinute => limits.ai_requests_per_minute = ceiling,
        }
        self.tiers.insert(tier.to_string(), limits);
        self
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(Error::Config(
                "rate_limits.sweep_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_follows_name() {
        assert_eq!(LimitType::RequestsPerMinute.window(), Duration::from_secs(60));
        assert_eq!(LimitType::RequestsPerHour.window(), Duration::from_secs(3600));
        assert_eq!(LimitType::AiRequestsPerMinute.window(), Duration::from_secs(60));
        assert_eq!(longest_window(), Duration::from_secs(3600));
    }

    #[test]
    fn test_limit_type_round_trips_through_name() {
        for limit in LimitType::ALL {
            assert_eq!(limit.as_str().parse::<LimitType>(), Ok(limit));
        }
        assert!("bogus".parse::<LimitType>().is_err());
    }

    #[test]
    fn test_unknown_tier_falls_back_to_default() {
        let config = RateLimitConfig::default();
        assert_eq!(config.limits_for("nobody"), config.limits_for(DEFAULT_TIER));
        assert_eq!(
            config.limits_for("admin").ceiling(LimitType::CodeExecutionsPerMinute),
            50
        );
        assert_eq!(
            config.limits_for("demo").ceiling(LimitType::AiRequestsPerMinute),
            10
        );
    }

    #[test]
    fn test_configured_tiers_keep_builtins() {
        let config: RateLimitConfig = toml::from_str(
            r#"
            [tiers.premium]
            ai_requests_per_minute = 500
            "#,
        )
        .unwrap();
        assert_eq!(
            config.limits_for("premium"),
            TierLimits::new(90, 2500, 25, 500)
        );
        assert_eq!(config.limits_for("admin"), TierLimits::new(120, 5000, 50, 100));
        assert_eq!(config.limits_for(DEFAULT_TIER), TierLimits::default());
    }

    #[test]
    fn test_new_tier_starts_from_default_tier() {
        let config: RateLimitConfig = toml::from_str(
            r#"
            [tiers.classroom]
            code_executions_per_minute = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.limits_for("classroom"), TierLimits::new(60, 1000, 3, 20));
    }

    #[test]
    fn test_unknown_tier_field_is_rejected() {
        let parsed = toml::from_str::<RateLimitConfig>(
            r#"
            [tiers.premium]
            code_executions_per_hour = 3
            "#,
        );
        assert!(parsed.is_err());
    }
}
