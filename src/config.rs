//! Gate configuration
//!
//! Configuration is normally built programmatically, but it can also be parsed
//! from a TOML table so that embedding services keep it next to their own
//! settings. All values are validated at construction and at deserialization
//! time; a `GateConfig` that exists is a valid one.

use crate::error::{GateError, GateResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound for every configured duration (one day)
const MAX_DURATION_SECONDS: f64 = 86_400.0;

/// Lower bound for every configured duration; the timer wheel ticks in milliseconds
const MIN_DURATION: Duration = Duration::from_millis(1);

/// Default result-store key used by the backend round-trip check
pub const DEFAULT_BACKEND_CHECK_KEY: &str = "celery_health_check";

/// Immutable settings for a [`HealthGate`](crate::gate::HealthGate)
///
/// Fields are private; use the `with_*` setters, which validate, or
/// deserialize from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGateConfig", into = "RawGateConfig")]
pub struct GateConfig {
    cache_capacity: usize,
    cache_ttl: Duration,
    inspect_timeout: Duration,
    monitoring_interval: Duration,
    broker_connect_timeout: Duration,
    result_store_timeout: Duration,
    stop_timeout: Duration,
    backend_check_key: String,
}

/// Wire form of [`GateConfig`]; durations are fractional seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGateConfig {
    #[serde(default = "default_cache_capacity")]
    cache_capacity: usize,
    #[serde(default = "default_cache_ttl")]
    cache_ttl_seconds: f64,
    #[serde(default = "default_inspect_timeout")]
    inspect_timeout_seconds: f64,
    #[serde(default = "default_monitoring_interval")]
    monitoring_interval_seconds: f64,
    #[serde(default = "default_broker_connect_timeout")]
    broker_connect_timeout_seconds: f64,
    #[serde(default = "default_result_store_timeout")]
    result_store_timeout_seconds: f64,
    #[serde(default = "default_stop_timeout")]
    stop_timeout_seconds: f64,
    #[serde(default = "default_backend_check_key")]
    backend_check_key: String,
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_cache_ttl() -> f64 {
    60.0
}

fn default_inspect_timeout() -> f64 {
    5.0
}

fn default_monitoring_interval() -> f64 {
    60.0
}

// The task-queue client takes no connect timeout of its own; 5s matches the
// inspect default so a dead broker costs no more than a silent worker fleet.
fn default_broker_connect_timeout() -> f64 {
    5.0
}

fn default_result_store_timeout() -> f64 {
    5.0
}

fn default_stop_timeout() -> f64 {
    5.0
}

fn default_backend_check_key() -> String {
    DEFAULT_BACKEND_CHECK_KEY.to_string()
}

/// Convert a seconds value into a `Duration`, rejecting non-positive,
/// non-finite and absurdly large values
fn seconds(field: &str, value: f64) -> GateResult<Duration> {
    if !value.is_finite() || value <= 0.0 {
        return Err(GateError::Config(format!(
            "{} must be a positive number of seconds, got {}",
            field, value
        )));
    }
    if value > MAX_DURATION_SECONDS {
        return Err(GateError::Config(format!(
            "{} cannot exceed {} seconds, got {}",
            field, MAX_DURATION_SECONDS, value
        )));
    }
    // Anything smaller would round to a zero-length timer
    if value < MIN_DURATION.as_secs_f64() {
        return Err(below_minimum(field, value));
    }
    Ok(Duration::from_secs_f64(value))
}

fn below_minimum(field: &str, value: f64) -> GateError {
    GateError::Config(format!(
        "{} must be at least {} seconds, got {}",
        field,
        MIN_DURATION.as_secs_f64(),
        value
    ))
}

fn check_duration(field: &str, value: Duration) -> GateResult<Duration> {
    if value < MIN_DURATION {
        return Err(below_minimum(field, value.as_secs_f64()));
    }
    if value.as_secs_f64() > MAX_DURATION_SECONDS {
        return Err(GateError::Config(format!(
            "{} cannot exceed {} seconds, got {}",
            field,
            MAX_DURATION_SECONDS,
            value.as_secs_f64()
        )));
    }
    Ok(value)
}

impl TryFrom<RawGateConfig> for GateConfig {
    type Error = GateError;

    fn try_from(raw: RawGateConfig) -> GateResult<Self> {
        if raw.cache_capacity == 0 {
            return Err(GateError::Config(
                "cache_capacity must be greater than 0".to_string(),
            ));
        }
        if raw.backend_check_key.trim().is_empty() {
            return Err(GateError::Config(
                "backend_check_key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            cache_capacity: raw.cache_capacity,
            cache_ttl: seconds("cache_ttl_seconds", raw.cache_ttl_seconds)?,
            inspect_timeout: seconds("inspect_timeout_seconds", raw.inspect_timeout_seconds)?,
            monitoring_interval: seconds(
                "monitoring_interval_seconds",
                raw.monitoring_interval_seconds,
            )?,
            broker_connect_timeout: seconds(
                "broker_connect_timeout_seconds",
                raw.broker_connect_timeout_seconds,
            )?,
            result_store_timeout: seconds(
                "result_store_timeout_seconds",
                raw.result_store_timeout_seconds,
            )?,
            stop_timeout: seconds("stop_timeout_seconds", raw.stop_timeout_seconds)?,
            backend_check_key: raw.backend_check_key,
        })
    }
}

impl From<GateConfig> for RawGateConfig {
    fn from(config: GateConfig) -> Self {
        Self {
            cache_capacity: config.cache_capacity,
            cache_ttl_seconds: config.cache_ttl.as_secs_f64(),
            inspect_timeout_seconds: config.inspect_timeout.as_secs_f64(),
            monitoring_interval_seconds: config.monitoring_interval.as_secs_f64(),
            broker_connect_timeout_seconds: config.broker_connect_timeout.as_secs_f64(),
            result_store_timeout_seconds: config.result_store_timeout.as_secs_f64(),
            stop_timeout_seconds: config.stop_timeout.as_secs_f64(),
            backend_check_key: config.backend_check_key,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            cache_ttl: Duration::from_secs_f64(default_cache_ttl()),
            inspect_timeout: Duration::from_secs_f64(default_inspect_timeout()),
            monitoring_interval: Duration::from_secs_f64(default_monitoring_interval()),
            broker_connect_timeout: Duration::from_secs_f64(default_broker_connect_timeout()),
            result_store_timeout: Duration::from_secs_f64(default_result_store_timeout()),
            stop_timeout: Duration::from_secs_f64(default_stop_timeout()),
            backend_check_key: default_backend_check_key(),
        }
    }
}

impl GateConfig {
    /// Load configuration from a TOML file
    ///
    /// The file holds the gate's keys at the top level, e.g.
    /// `cache_ttl_seconds = 30`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> GateResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| GateError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        // Parse into the raw form first so that syntax errors and semantic
        // validation errors stay distinguishable.
        let raw: RawGateConfig =
            toml::from_str(&content).map_err(|source| GateError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        Self::try_from(raw).map_err(|e| GateError::ConfigValidationFailed {
            path: path_display,
            reason: e.to_string(),
        })
    }

    /// Set the maximum number of cached entries
    pub fn with_cache_capacity(mut self, capacity: usize) -> GateResult<Self> {
        if capacity == 0 {
            return Err(GateError::Config(
                "cache_capacity must be greater than 0".to_string(),
            ));
        }
        self.cache_capacity = capacity;
        Ok(self)
    }

    /// Set how long a verdict stays fresh
    pub fn with_cache_ttl(mut self, ttl: Duration) -> GateResult<Self> {
        self.cache_ttl = check_duration("cache_ttl_seconds", ttl)?;
        Ok(self)
    }

    /// Set the worker ping timeout
    pub fn with_inspect_timeout(mut self, timeout: Duration) -> GateResult<Self> {
        self.inspect_timeout = check_duration("inspect_timeout_seconds", timeout)?;
        Ok(self)
    }

    /// Set the background refresh interval
    pub fn with_monitoring_interval(mut self, interval: Duration) -> GateResult<Self> {
        self.monitoring_interval = check_duration("monitoring_interval_seconds", interval)?;
        Ok(self)
    }

    /// Set the bound on connecting to and releasing the broker
    pub fn with_broker_connect_timeout(mut self, timeout: Duration) -> GateResult<Self> {
        self.broker_connect_timeout = check_duration("broker_connect_timeout_seconds", timeout)?;
        Ok(self)
    }

    /// Set the bound on the result-store write/read round-trip
    pub fn with_result_store_timeout(mut self, timeout: Duration) -> GateResult<Self> {
        self.result_store_timeout = check_duration("result_store_timeout_seconds", timeout)?;
        Ok(self)
    }

    /// Set how long `stop_monitoring` waits for the loop to exit
    pub fn with_stop_timeout(mut self, timeout: Duration) -> GateResult<Self> {
        self.stop_timeout = check_duration("stop_timeout_seconds", timeout)?;
        Ok(self)
    }

    /// Set the result-store key used for the round-trip check
    pub fn with_backend_check_key(mut self, key: impl Into<String>) -> GateResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(GateError::Config(
                "backend_check_key must not be empty".to_string(),
            ));
        }
        self.backend_check_key = key;
        Ok(self)
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn inspect_timeout(&self) -> Duration {
        self.inspect_timeout
    }

    pub fn monitoring_interval(&self) -> Duration {
        self.monitoring_interval
    }

    pub fn broker_connect_timeout(&self) -> Duration {
        self.broker_connect_timeout
    }

    pub fn result_store_timeout(&self) -> Duration {
        self.result_store_timeout
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    pub fn backend_check_key(&self) -> &str {
        &self.backend_check_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = GateConfig::default();
        assert_eq!(config.cache_capacity(), 1000);
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.inspect_timeout(), Duration::from_secs(5));
        assert_eq!(config.monitoring_interval(), Duration::from_secs(60));
        assert_eq!(config.broker_connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.result_store_timeout(), Duration::from_secs(5));
        assert_eq!(config.stop_timeout(), Duration::from_secs(5));
        assert_eq!(config.backend_check_key(), "celery_health_check");
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: GateConfig = toml::from_str("").expect("empty table should parse");
        assert_eq!(config, GateConfig::default());
    }

    #[test]
    fn test_fractional_seconds_parse() {
        let config: GateConfig = toml::from_str(
            r#"
cache_ttl_seconds = 1
monitoring_interval_seconds = 0.5
"#,
        )
        .expect("should parse");
        assert_eq!(config.cache_ttl(), Duration::from_secs(1));
        assert_eq!(config.monitoring_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_capacity_rejected_at_parse_time() {
        let err = toml::from_str::<GateConfig>("cache_capacity = 0").unwrap_err();
        assert!(err.to_string().contains("cache_capacity"));
    }

    #[test]
    fn test_negative_ttl_rejected() {
        let err = toml::from_str::<GateConfig>("cache_ttl_seconds = -1.0").unwrap_err();
        assert!(err.to_string().contains("cache_ttl_seconds"));
    }

    #[test]
    fn test_sub_millisecond_durations_rejected() {
        let err = toml::from_str::<GateConfig>(
            "monitoring_interval_seconds = 1e-10\ncache_ttl_seconds = 1e-10",
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be at least"));

        assert!(
            GateConfig::default()
                .with_monitoring_interval(Duration::from_nanos(1))
                .is_err()
        );
        assert!(
            GateConfig::default()
                .with_cache_ttl(Duration::from_micros(999))
                .is_err()
        );
        assert!(
            GateConfig::default()
                .with_cache_ttl(Duration::from_millis(1))
                .is_ok()
        );
    }

    #[test]
    fn test_oversized_interval_rejected() {
        let err =
            toml::from_str::<GateConfig>("monitoring_interval_seconds = 100000").unwrap_err();
        assert!(err.to_string().contains("cannot exceed"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<GateConfig>("cache_timeout = 60").is_err());
    }

    #[test]
    fn test_blank_backend_key_rejected() {
        assert!(toml::from_str::<GateConfig>("backend_check_key = \"  \"").is_err());
        assert!(GateConfig::default().with_backend_check_key("").is_err());
    }

    #[test]
    fn test_setters_validate() {
        assert!(GateConfig::default().with_cache_capacity(0).is_err());
        assert!(GateConfig::default().with_cache_ttl(Duration::ZERO).is_err());
        assert!(
            GateConfig::default()
                .with_stop_timeout(Duration::from_secs(200_000))
                .is_err()
        );

        let config = GateConfig::default()
            .with_cache_capacity(2)
            .and_then(|c| c.with_inspect_timeout(Duration::from_millis(250)))
            .and_then(|c| c.with_backend_check_key("probe"))
            .expect("valid settings");
        assert_eq!(config.cache_capacity(), 2);
        assert_eq!(config.inspect_timeout(), Duration::from_millis(250));
        assert_eq!(config.backend_check_key(), "probe");
    }

    #[test]
    fn test_serialize_round_trips_through_toml() {
        let config = GateConfig::default()
            .with_cache_ttl(Duration::from_millis(1500))
            .expect("valid ttl");
        let text = toml::to_string(&config).expect("should serialize");
        assert!(text.contains("cache_ttl_seconds = 1.5"));
        let parsed: GateConfig = toml::from_str(&text).expect("should parse back");
        assert_eq!(parsed, config);
    }
}
