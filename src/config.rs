//! Configuration for the swap engine
//!
//! Loads configuration from TOML files with environment variable substitution.
//! Embedders that don't ship a config file can use [`Settings::default`],
//! which carries the production polling cycles.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub assets: AssetConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rate polling cycle, both providers.
    pub rates_poll_secs: u64,
    /// Hard timeout raced against the ShapeShift rates fetch.
    pub shapeshift_rates_timeout_secs: u64,
    /// Order status polling cycle.
    pub status_poll_secs: u64,
    /// Expiry countdown tick.
    pub timer_tick_ms: u64,
    /// Payment address resolution: retries after the first poll.
    pub payment_address_retries: u32,
    pub payment_address_retry_delay_ms: u64,
    /// Event bus capacity.
    pub bus_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Units tradeable through the lite-send flow.
    pub supported_units: Vec<String>,
    /// The network's native unit; everything else is a token.
    pub network_unit: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rates_poll_secs: 30,
            shapeshift_rates_timeout_secs: 10,
            status_poll_secs: 5,
            timer_tick_ms: 1_000,
            payment_address_retries: 5,
            payment_address_retry_delay_ms: 500,
            bus_capacity: 1_024,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            supported_units: vec!["ETH".into(), "BTC".into(), "REP".into()],
            network_unit: "ETH".into(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            assets: AssetConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn rates_poll_interval(&self) -> Duration {
        Duration::from_secs(self.rates_poll_secs)
    }

    pub fn shapeshift_rates_timeout(&self) -> Duration {
        Duration::from_secs(self.shapeshift_rates_timeout_secs)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_secs)
    }

    pub fn timer_tick(&self) -> Duration {
        Duration::from_millis(self.timer_tick_ms)
    }

    pub fn payment_address_retry_delay(&self) -> Duration {
        Duration::from_millis(self.payment_address_retry_delay_ms)
    }
}

impl Settings {
    /// Load settings from the configuration file named by `SWAP_ENGINE_CONFIG`,
    /// falling back to `config/default.toml`.
    pub fn load() -> Result<Self> {
        let config_path = env::var("SWAP_ENGINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file.
    pub fn load_from(config_path: &PathBuf) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.timer_tick_ms == 0 {
            anyhow::bail!("timer_tick_ms must be non-zero");
        }
        if self.engine.rates_poll_secs == 0 || self.engine.status_poll_secs == 0 {
            anyhow::bail!("polling cycles must be non-zero");
        }
        if self.engine.bus_capacity == 0 {
            anyhow::bail!("bus_capacity must be non-zero");
        }
        if self.assets.network_unit.is_empty() {
            anyhow::bail!("network_unit must be set");
        }
        if !self
            .assets
            .supported_units
            .iter()
            .any(|u| u == &self.assets.network_unit)
        {
            anyhow::bail!(
                "network unit {} must be listed in supported_units",
                self.assets.network_unit
            );
        }
        Ok(())
    }
}

impl AssetConfig {
    pub fn is_supported_unit(&self, unit: &str) -> bool {
        self.supported_units.iter().any(|u| u == unit)
    }

    pub fn is_network_unit(&self, unit: &str) -> bool {
        self.network_unit == unit
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
