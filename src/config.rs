//! Configuration management for the delivery tracker
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::tracker::{WaitOptions, DEFAULT_JITTER, DEFAULT_MAX_CONSECUTIVE_ERRORS};

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "DELIVERY_TRACKER_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub tracker: TrackerConfig,
    pub status: StatusConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    pub slow_poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub slow_after_polls: u32,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    #[serde(default)]
    pub initial_delay_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            slow_poll_interval_ms: None,
            slow_after_polls: 0,
            max_wait_secs: default_max_wait_secs(),
            max_consecutive_errors: default_max_consecutive_errors(),
            jitter: default_jitter(),
            initial_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    /// URL templates containing `{chain}` and `{tx_hash}` placeholders, tried in order
    pub urls: Vec<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub chain_key: ChainKey,
}

/// How a chain is rendered into status URLs
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChainKey {
    #[default]
    Name,
    Id,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_poll_interval_ms() -> u64 {
    15_000
}

fn default_max_wait_secs() -> u64 {
    600
}

fn default_max_consecutive_errors() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_ERRORS
}

fn default_jitter() -> f64 {
    DEFAULT_JITTER
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_enabled() -> bool {
    true
}

impl Settings {
    /// Load settings from the file named by `DELIVERY_TRACKER_CONFIG`, or `config/default.toml`
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(input: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(input);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.enabled_chains().is_empty() {
            anyhow::bail!("At least one chain must be enabled");
        }

        let mut seen = HashSet::new();
        for (name, chain) in &self.chains {
            if chain.name.trim().is_empty() {
                anyhow::bail!("Chain {} has an empty name", name);
            }
            if chain.enabled && !seen.insert(chain.chain_id) {
                anyhow::bail!("Chain id {} is configured more than once", chain.chain_id);
            }
        }

        if self.status.urls.is_empty() {
            anyhow::bail!("No status service URLs configured");
        }
        for url in &self.status.urls {
            if !url.contains("{tx_hash}") {
                anyhow::bail!("Status URL {} has no {{tx_hash}} placeholder", url);
            }
        }

        let tracker = &self.tracker;
        if tracker.poll_interval_ms == 0 {
            anyhow::bail!("tracker.poll_interval_ms must be greater than zero");
        }
        if tracker.max_wait_secs == 0 {
            anyhow::bail!("tracker.max_wait_secs must be greater than zero");
        }
        if tracker.max_consecutive_errors == 0 {
            anyhow::bail!("tracker.max_consecutive_errors must be greater than zero");
        }
        if !(0.0..=1.0).contains(&tracker.jitter) {
            anyhow::bail!("tracker.jitter must be between 0 and 1");
        }
        if tracker.slow_poll_interval_ms == Some(0) {
            anyhow::bail!("tracker.slow_poll_interval_ms must be greater than zero");
        }

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }

    /// Polling policy described by the `[tracker]` section
    pub fn wait_options(&self) -> WaitOptions {
        let tracker = &self.tracker;
        let mut options = WaitOptions::default()
            .with_poll_interval(Duration::from_millis(tracker.poll_interval_ms))
            .with_max_wait(Duration::from_secs(tracker.max_wait_secs))
            .with_max_consecutive_errors(tracker.max_consecutive_errors)
            .with_jitter(tracker.jitter)
            .with_initial_delay(Duration::from_millis(tracker.initial_delay_ms));

        if let Some(slow_ms) = tracker.slow_poll_interval_ms {
            options = options.with_slow_down(tracker.slow_after_polls, Duration::from_millis(slow_ms));
        }

        options
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
    }

    ENV_VAR
        .replace_all(input, |caps: &regex::Captures| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[tracker]
poll_interval_ms = 2000
slow_poll_interval_ms = 60000
slow_after_polls = 5
max_wait_secs = 10
max_consecutive_errors = 4
jitter = 0.0

[status]
urls = ["https://relayer.example/v1/relays/{chain}/{tx_hash}"]

[api]
host = "127.0.0.1"
port = 8080

[metrics]
enabled = false
port = 9090

[chains.avalanche]
chain_id = 6
name = "avalanche"

[chains.celo]
chain_id = 14
name = "celo"
enabled = false
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("DELIVERY_TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${DELIVERY_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_missing_env_var_substitutes_empty() {
        let result = substitute_env_vars("key = \"${DELIVERY_TEST_UNSET_VAR}\"");
        assert_eq!(result, "key = \"\"");
    }

    #[test]
    fn test_parse_sample() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();

        assert_eq!(settings.enabled_chains().len(), 1);
        assert_eq!(settings.status.chain_key, ChainKey::Name);
        assert_eq!(settings.status.request_timeout_ms, 10_000);
        assert!(!settings.chains["celo"].enabled);

        let options = settings.wait_options();
        assert_eq!(options.poll_interval, Duration::from_secs(2));
        assert_eq!(options.max_wait, Duration::from_secs(10));
        assert_eq!(options.max_consecutive_errors, 4);
        assert_eq!(options.interval_for(4), Duration::from_secs(2));
        assert_eq!(options.interval_for(5), Duration::from_secs(60));
    }

    #[test]
    fn test_tracker_section_defaults() {
        let without_tracker = SAMPLE.split("[status]").nth(1).unwrap();
        let settings = Settings::from_toml_str(&format!("[status]{}", without_tracker)).unwrap();

        assert_eq!(settings.tracker.poll_interval_ms, 15_000);
        assert_eq!(settings.tracker.max_wait_secs, 600);
        assert_eq!(
            settings.tracker.max_consecutive_errors,
            DEFAULT_MAX_CONSECUTIVE_ERRORS
        );
    }

    #[test]
    fn test_rejects_url_without_tx_hash() {
        let input = SAMPLE.replace("{tx_hash}", "fixed");
        let err = Settings::from_toml_str(&input).unwrap_err();
        assert!(err.to_string().contains("tx_hash"));
    }

    #[test]
    fn test_rejects_invalid_tracker_values() {
        assert!(Settings::from_toml_str(&SAMPLE.replace("jitter = 0.0", "jitter = 1.5")).is_err());
        assert!(Settings::from_toml_str(
            &SAMPLE.replace("max_consecutive_errors = 4", "max_consecutive_errors = 0")
        )
        .is_err());
        assert!(
            Settings::from_toml_str(&SAMPLE.replace("max_wait_secs = 10", "max_wait_secs = 0"))
                .is_err()
        );
    }

    #[test]
    fn test_rejects_duplicate_chain_ids() {
        let input = SAMPLE.replace("chain_id = 14", "chain_id = 6").replace(
            "name = \"celo\"\nenabled = false",
            "name = \"celo\"",
        );
        let err = Settings::from_toml_str(&input).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.api.port, 8080);
        assert!(Settings::load_from(Path::new("/nonexistent/delivery.toml")).is_err());
    }
}
