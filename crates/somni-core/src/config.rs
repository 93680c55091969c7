//! Engine configuration: sampling parameters, gate thresholds, and the
//! default lookback window.
//!
//! Built explicitly and handed to [`crate::plan::PlanEngine::new`]. The
//! environment is only consulted by [`EngineConfig::from_env`]; unset or
//! unparsable variables fall back to the defaults.

use std::str::FromStr;

use chrono::Duration;

/// Environment variable overriding [`EngineConfig::temperature`].
pub const TEMPERATURE_ENV: &str = "SOMNI_PLAN_TEMPERATURE";
/// Environment variable overriding [`EngineConfig::max_tokens`].
pub const MAX_TOKENS_ENV: &str = "SOMNI_PLAN_MAX_TOKENS";
/// Environment variable overriding [`EngineConfig::min_events`].
pub const MIN_EVENTS_ENV: &str = "SOMNI_PLAN_MIN_EVENTS";
/// Environment variable overriding [`EngineConfig::min_distinct_types`].
pub const MIN_DISTINCT_TYPES_ENV: &str = "SOMNI_PLAN_MIN_DISTINCT_TYPES";
/// Environment variable overriding [`EngineConfig::lookback_days`].
pub const LOOKBACK_DAYS_ENV: &str = "SOMNI_PLAN_LOOKBACK_DAYS";

/// Tunables for plan generation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Sampling temperature passed to the model.
    pub temperature: f32,
    /// Output token budget passed to the model.
    pub max_tokens: u32,
    /// Minimum number of events in the window for the sanity gate to pass.
    pub min_events: u64,
    /// Minimum number of distinct event types for the sanity gate to pass.
    pub min_distinct_types: usize,
    /// Length of the window used when the caller does not supply one.
    pub lookback_days: u32,
}

impl EngineConfig {
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;
    pub const DEFAULT_MAX_TOKENS: u32 = 2000;
    pub const DEFAULT_MIN_EVENTS: u64 = 10;
    pub const DEFAULT_MIN_DISTINCT_TYPES: usize = 2;
    pub const DEFAULT_LOOKBACK_DAYS: u32 = 14;
    /// Longest lookback accepted; larger settings are clamped to this.
    pub const MAX_LOOKBACK_DAYS: u32 = 3650;

    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (testable without env vars).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            temperature: parse_or(&lookup, TEMPERATURE_ENV, defaults.temperature),
            max_tokens: parse_or(&lookup, MAX_TOKENS_ENV, defaults.max_tokens),
            min_events: parse_or(&lookup, MIN_EVENTS_ENV, defaults.min_events),
            min_distinct_types: parse_or(
                &lookup,
                MIN_DISTINCT_TYPES_ENV,
                defaults.min_distinct_types,
            ),
            lookback_days: clamp_lookback(parse_or(
                &lookup,
                LOOKBACK_DAYS_ENV,
                defaults.lookback_days,
            )),
        }
    }

    /// The default lookback as a duration, between one day and
    /// [`Self::MAX_LOOKBACK_DAYS`].
    pub fn lookback(&self) -> Duration {
        let days = self.lookback_days.clamp(1, Self::MAX_LOOKBACK_DAYS);
        Duration::try_days(i64::from(days))
            .unwrap_or_else(|| Duration::days(i64::from(Self::DEFAULT_LOOKBACK_DAYS)))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            temperature: Self::DEFAULT_TEMPERATURE,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            min_events: Self::DEFAULT_MIN_EVENTS,
            min_distinct_types: Self::DEFAULT_MIN_DISTINCT_TYPES,
            lookback_days: Self::DEFAULT_LOOKBACK_DAYS,
        }
    }
}

fn clamp_lookback(days: u32) -> u32 {
    if days > EngineConfig::MAX_LOOKBACK_DAYS {
        tracing::warn!(
            key = LOOKBACK_DAYS_ENV,
            days,
            max = EngineConfig::MAX_LOOKBACK_DAYS,
            "clamping engine lookback"
        );
        return EngineConfig::MAX_LOOKBACK_DAYS;
    }
    days
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparsable engine setting");
                default
            }
        },
        None => default,
    }
}
