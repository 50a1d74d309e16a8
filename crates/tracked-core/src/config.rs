//! Configuration management for Tracked.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Every tunable the scanner uses (page
//! size, pacing, retry budgets, backoff curves, cooldowns, filter
//! thresholds and scoring weights) lives here rather than inline.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/tracked/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Upstream listing API settings
    pub api: ApiConfig,
    /// Per-request pacing, timeout and retry settings
    pub fetch: FetchConfig,
    /// Paginated "emptiest server" scan settings
    pub scan: ScanConfig,
    /// Newly opened instance search settings
    pub new_server: NewServerConfig,
    /// Hunt (poll until found) settings
    pub hunt: HuntConfig,
    /// Auto-blocker filter settings
    pub auto_blocker: AutoBlockerConfig,
    /// Cross-operation guard settings
    pub orchestrator: OrchestratorConfig,
    /// Scoring weights
    pub scoring: ScoringConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults
    /// if the file does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `TRACKED_API_BASE_URL`: Override the listing API origin
    /// - `TRACKED_REQUEST_TIMEOUT_SECS`: Override the per-request timeout
    /// - `TRACKED_RETRY_ATTEMPTS`: Override the per-request retry budget
    /// - `TRACKED_COOLDOWN_MS`: Override the post-operation cooldown
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("TRACKED_API_BASE_URL") {
            tracing::debug!("Override api.base_url from env: {}", val);
            self.api.base_url = val;
        }

        if let Some(val) = lookup("TRACKED_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.fetch.request_timeout_secs = secs;
                tracing::debug!("Override fetch.request_timeout_secs from env: {}", secs);
            }
        }

        if let Some(val) = lookup("TRACKED_RETRY_ATTEMPTS") {
            if let Ok(attempts) = val.parse() {
                self.fetch.retry_attempts = attempts;
                tracing::debug!("Override fetch.retry_attempts from env: {}", attempts);
            }
        }

        if let Some(val) = lookup("TRACKED_COOLDOWN_MS") {
            if let Ok(ms) = val.parse() {
                self.orchestrator.cooldown_ms = ms;
                tracing::debug!("Override orchestrator.cooldown_ms from env: {}", ms);
            }
        }
    }

    /// Reject values the scanner cannot operate with.
    pub fn validate(&self) -> ConfigResult<()> {
        fn invalid(field: &str, reason: &str) -> ConfigError {
            ConfigError::InvalidValue {
                field: field.to_string(),
                reason: reason.to_string(),
            }
        }

        if self.api.base_url.trim().is_empty() {
            return Err(invalid("api.base_url", "must not be empty"));
        }
        if self.api.page_size == 0 || self.api.page_size > 100 {
            return Err(invalid("api.page_size", "must be between 1 and 100"));
        }
        if self.fetch.request_timeout_secs == 0 {
            return Err(invalid("fetch.request_timeout_secs", "must be greater than zero"));
        }
        if self.fetch.rate_limit_backoff_base_ms > self.fetch.rate_limit_backoff_cap_ms {
            return Err(invalid(
                "fetch.rate_limit_backoff_base_ms",
                "must not exceed rate_limit_backoff_cap_ms",
            ));
        }
        if self.fetch.transient_backoff_base_ms > self.fetch.transient_backoff_cap_ms {
            return Err(invalid(
                "fetch.transient_backoff_base_ms",
                "must not exceed transient_backoff_cap_ms",
            ));
        }
        if self.scan.max_results == 0 || self.scan.max_pages == 0 {
            return Err(invalid("scan", "max_results and max_pages must be greater than zero"));
        }
        if self.scan.max_consecutive_errors == 0 {
            return Err(invalid("scan.max_consecutive_errors", "must be greater than zero"));
        }
        if self.new_server.max_scan == 0 || self.new_server.max_pages == 0 {
            return Err(invalid(
                "new_server",
                "max_scan and max_pages must be greater than zero",
            ));
        }
        if !(0.0..=100.0).contains(&self.new_server.max_fullness_percent) {
            return Err(invalid("new_server.max_fullness_percent", "must be within 0-100"));
        }
        if self.hunt.max_attempts == 0 || self.hunt.request_timeout_secs == 0 {
            return Err(invalid(
                "hunt",
                "max_attempts and request_timeout_secs must be greater than zero",
            ));
        }
        if self.auto_blocker.max_rounds == 0 || self.auto_blocker.request_timeout_secs == 0 {
            return Err(invalid(
                "auto_blocker",
                "max_rounds and request_timeout_secs must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let config_dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/tracked/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "tracked", "tracked").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Upstream listing API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Origin of the games API
    pub base_url: String,
    /// Instances requested per page (API maximum is 100)
    pub page_size: u32,
    /// User agent string
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://games.roblox.com".to_string(),
            page_size: 100,
            user_agent: "Tracked/0.1.0 (+https://github.com/tracked-ext/tracked)".to_string(),
        }
    }
}

/// Per-request pacing, timeout and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Fixed delay before every request, retries included
    pub pacing_delay_ms: u64,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Retries allowed after the first attempt
    pub retry_attempts: u32,
    /// First backoff after an HTTP 429
    pub rate_limit_backoff_base_ms: u64,
    /// Growth factor between consecutive 429 backoffs
    pub rate_limit_backoff_factor: f64,
    /// Upper bound for a single 429 backoff
    pub rate_limit_backoff_cap_ms: u64,
    /// Maximum random jitter added to a 429 backoff
    pub rate_limit_jitter_ms: u64,
    /// First backoff after any other failure
    pub transient_backoff_base_ms: u64,
    /// Growth factor between consecutive transient backoffs
    pub transient_backoff_factor: f64,
    /// Upper bound for a single transient backoff
    pub transient_backoff_cap_ms: u64,
    /// Maximum random jitter added to a transient backoff
    pub transient_jitter_ms: u64,
    /// How long the shared rate limiter stays tripped after 429 exhaustion
    pub rate_limit_cooldown_ms: u64,
}

impl FetchConfig {
    /// Pacing delay as a `Duration`.
    #[must_use]
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Rate limiter trip duration as a `Duration`.
    #[must_use]
    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            pacing_delay_ms: 1500,
            request_timeout_secs: 15,
            retry_attempts: 2,
            rate_limit_backoff_base_ms: 5000,
            rate_limit_backoff_factor: 2.0,
            rate_limit_backoff_cap_ms: 30_000,
            rate_limit_jitter_ms: 3000,
            transient_backoff_base_ms: 3000,
            transient_backoff_factor: 1.5,
            transient_backoff_cap_ms: 15_000,
            transient_jitter_ms: 1000,
            rate_limit_cooldown_ms: 15_000,
        }
    }
}

/// Paginated "emptiest server" scan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Qualifying instances to collect before stopping
    pub max_results: usize,
    /// Result limit for a deep scan
    pub deep_scan_limit: usize,
    /// Page cap for one scan
    pub max_pages: u32,
    /// Minimum occupancy for an instance to count (skips dead instances)
    pub min_players: u32,
    /// Consecutive failed pages before the scan gives up
    pub max_consecutive_errors: u32,
    /// Pause after a failed page
    pub error_pause_ms: u64,
    /// Pause after a page without a `data` array
    pub malformed_pause_ms: u64,
    /// Length of the ranked list a deep scan presents
    pub max_scored_servers: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_results: 100,
            deep_scan_limit: 100,
            max_pages: 10,
            min_players: 1,
            max_consecutive_errors: 3,
            error_pause_ms: 3000,
            malformed_pause_ms: 2000,
            max_scored_servers: 20,
        }
    }
}

/// Newly opened instance search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewServerConfig {
    /// Qualifying instances to collect before stopping
    pub max_scan: usize,
    /// Page cap for one search
    pub max_pages: u32,
    /// Stop early once this many candidates are collected
    pub sufficient_results: usize,
    /// Instances at or above this fullness are skipped
    pub max_fullness_percent: f64,
    /// Instances with a measured ping at or above this are skipped
    pub max_ping_ms: u32,
}

impl Default for NewServerConfig {
    fn default() -> Self {
        Self {
            max_scan: 100,
            max_pages: 5,
            sufficient_results: 15,
            max_fullness_percent: 40.0,
            max_ping_ms: 200,
        }
    }
}

/// Hunt (poll until found) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntConfig {
    /// Polling rounds before giving up
    pub max_attempts: u32,
    /// Spacing between rounds
    pub poll_interval_ms: u64,
    /// Delay before the first request
    pub startup_delay_ms: u64,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Highest occupancy a hunted instance may have
    pub max_players: u32,
}

impl Default for HuntConfig {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            poll_interval_ms: 8000,
            startup_delay_ms: 1000,
            request_timeout_secs: 6,
            max_players: 1,
        }
    }
}

/// Auto-blocker filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoBlockerConfig {
    /// Instances with more players than this are blocked
    pub max_players: u32,
    /// Instances with a measured ping above this are blocked
    pub max_ping_ms: u32,
    /// Delay after every request
    pub request_delay_ms: u64,
    /// Rounds (one page per sort order) before giving up
    pub max_rounds: u32,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for AutoBlockerConfig {
    fn default() -> Self {
        Self {
            max_players: 2,
            max_ping_ms: 150,
            request_delay_ms: 500,
            max_rounds: 20,
            request_timeout_secs: 6,
        }
    }
}

/// Cross-operation guard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Window after an operation during which new scans are rejected
    pub cooldown_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { cooldown_ms: 8000 }
    }
}

/// Scoring weights for the ranked strategies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weights for the general "emptiest" ranking
    pub general: GeneralWeights,
    /// Weights for the "freshest instance" ranking
    pub freshness: FreshnessWeights,
}

/// Weights for the general "emptiest" ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralWeights {
    /// Starting score
    pub base: i64,
    /// Subtracted per current player
    pub per_player_penalty: i64,
    /// Ping strictly below this earns `low_ping_bonus`
    pub low_ping_ms: u32,
    /// Bonus for low ping
    pub low_ping_bonus: i64,
    /// Ping strictly below this earns `fair_ping_bonus`
    pub fair_ping_ms: u32,
    /// Bonus for fair ping
    pub fair_ping_bonus: i64,
    /// Ping strictly above this costs `high_ping_penalty`
    pub high_ping_ms: u32,
    /// Penalty for high ping
    pub high_ping_penalty: i64,
    /// Tick rate at or above this earns `smooth_fps_bonus`
    pub smooth_fps: f64,
    /// Bonus for a smooth tick rate
    pub smooth_fps_bonus: i64,
    /// Tick rate at or above this earns `steady_fps_bonus`
    pub steady_fps: f64,
    /// Bonus for a steady tick rate
    pub steady_fps_bonus: i64,
    /// Fullness strictly below this percentage earns `sparse_bonus`
    pub sparse_percent: f64,
    /// Bonus for a sparse instance
    pub sparse_bonus: i64,
    /// Fullness strictly above this percentage costs `crowded_penalty`
    pub crowded_percent: f64,
    /// Penalty for a crowded instance
    pub crowded_penalty: i64,
}

impl Default for GeneralWeights {
    fn default() -> Self {
        Self {
            base: 1000,
            per_player_penalty: 80,
            low_ping_ms: 80,
            low_ping_bonus: 60,
            fair_ping_ms: 120,
            fair_ping_bonus: 30,
            high_ping_ms: 200,
            high_ping_penalty: 40,
            smooth_fps: 58.0,
            smooth_fps_bonus: 40,
            steady_fps: 55.0,
            steady_fps_bonus: 20,
            sparse_percent: 30.0,
            sparse_bonus: 20,
            crowded_percent: 80.0,
            crowded_penalty: 30,
        }
    }
}

/// Weights for the "freshest instance" ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessWeights {
    /// Starting score
    pub base: i64,
    /// Subtracted per percentage point of fullness
    pub fullness_penalty_per_percent: f64,
    /// Occupancy at or below this earns `near_empty_bonus`
    pub near_empty_players: u32,
    /// Bonus for a near-empty instance
    pub near_empty_bonus: i64,
    /// Occupancy at or below this earns `quiet_bonus`
    pub quiet_players: u32,
    /// Bonus for a quiet instance
    pub quiet_bonus: i64,
    /// Occupancy at or below this earns `small_bonus`
    pub small_players: u32,
    /// Bonus for a small instance
    pub small_bonus: i64,
    /// Ping strictly below this earns `low_ping_bonus`
    pub low_ping_ms: u32,
    /// Bonus for low ping
    pub low_ping_bonus: i64,
    /// Ping strictly below this earns `fair_ping_bonus`
    pub fair_ping_ms: u32,
    /// Bonus for fair ping
    pub fair_ping_bonus: i64,
    /// Ping strictly above this costs `high_ping_penalty`
    pub high_ping_ms: u32,
    /// Penalty for high ping
    pub high_ping_penalty: i64,
    /// Tick rate at or above this earns `smooth_fps_bonus`
    pub smooth_fps: f64,
    /// Bonus for a smooth tick rate
    pub smooth_fps_bonus: i64,
    /// Tick rate at or above this earns `steady_fps_bonus`
    pub steady_fps: f64,
    /// Bonus for a steady tick rate
    pub steady_fps_bonus: i64,
}

impl Default for FreshnessWeights {
    fn default() -> Self {
        Self {
            base: 1000,
            fullness_penalty_per_percent: 15.0,
            near_empty_players: 2,
            near_empty_bonus: 200,
            quiet_players: 5,
            quiet_bonus: 100,
            small_players: 10,
            small_bonus: 50,
            low_ping_ms: 80,
            low_ping_bonus: 100,
            fair_ping_ms: 120,
            fair_ping_bonus: 50,
            high_ping_ms: 200,
            high_ping_penalty: 50,
            smooth_fps: 58.0,
            smooth_fps_bonus: 80,
            steady_fps: 55.0,
            steady_fps_bonus: 40,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api.page_size, 100);
        assert_eq!(config.fetch.pacing_delay_ms, 1500);
        assert_eq!(config.fetch.retry_attempts, 2);
        assert_eq!(config.fetch.rate_limit_cooldown_ms, 15_000);
        assert_eq!(config.scan.max_consecutive_errors, 3);
        assert_eq!(config.hunt.max_attempts, 15);
        assert_eq!(config.auto_blocker.max_ping_ms, 150);
        assert_eq!(config.orchestrator.cooldown_ms, 8000);
        assert_eq!(config.scoring.general.per_player_penalty, 80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duration_helpers() {
        let fetch = FetchConfig::default();
        assert_eq!(fetch.pacing_delay(), Duration::from_millis(1500));
        assert_eq!(fetch.request_timeout(), Duration::from_secs(15));
        assert_eq!(fetch.rate_limit_cooldown(), Duration::from_secs(15));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[fetch]"));
        assert!(toml_str.contains("[scoring.general]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.api.base_url, config.api.base_url);
        assert_eq!(parsed.scoring.freshness.near_empty_bonus, 200);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.scan.max_pages = 4;
        config.hunt.poll_interval_ms = 10_000;

        config.save_to(&config_path).expect("save config");
        let loaded = AppConfig::load_from(&config_path).expect("load config");

        assert_eq!(loaded.scan.max_pages, 4);
        assert_eq!(loaded.hunt.poll_interval_ms, 10_000);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let loaded = AppConfig::load_from(&tmp.path().join("absent.toml")).expect("load defaults");
        assert_eq!(loaded.api.page_size, 100);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[api]\npage_size = 0\n").expect("write config file");

        let err = AppConfig::load_from(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "api.page_size"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TRACKED_API_BASE_URL", "http://127.0.0.1:9000"),
            ("TRACKED_REQUEST_TIMEOUT_SECS", "5"),
            ("TRACKED_RETRY_ATTEMPTS", "not-a-number"),
            ("TRACKED_COOLDOWN_MS", "2500"),
        ]);

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.api.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.fetch.request_timeout_secs, 5);
        // Unparseable values leave the default in place
        assert_eq!(config.fetch.retry_attempts, 2);
        assert_eq!(config.orchestrator.cooldown_ms, 2500);
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut config = AppConfig::default();
        config.fetch.transient_backoff_base_ms = 20_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[new_server]
sufficient_results = 5

[scoring.general]
per_player_penalty = 100
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.new_server.sufficient_results, 5);
        assert_eq!(config.scoring.general.per_player_penalty, 100);
        // These should be defaults
        assert_eq!(config.new_server.max_pages, 5);
        assert_eq!(config.scoring.general.base, 1000);
        assert_eq!(config.scan.max_results, 100);
    }
}
