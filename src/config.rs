//! Configuration management for wotledger

use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize)]
pub struct CurrencyConfig {
    #[serde(default = "default_currency_name")]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_path")]
    pub path: String,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self { name: default_currency_name() }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_data_path() }
    }
}

pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    load_config_from("config.toml")
}

pub fn load_config_from(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let config_str = fs::read_to_string(path).unwrap_or_default();
    let config: Config = if config_str.is_empty() {
        // Sane defaults when the config file is absent
        Config {
            currency: CurrencyConfig::default(),
            database: DatabaseConfig::default(),
        }
    } else {
        toml::from_str(&config_str)?
    };

    // Validate critical values
    if config.database.path.is_empty() {
        return Err("database.path must be set in config.toml".into());
    }

    if config.currency.name.is_empty() {
        return Err("currency.name must be set in config.toml".into());
    }

    Ok(config)
}

fn default_currency_name() -> String {
    "devnet_currency".to_string()
}

fn default_data_path() -> String {
    "./data/wotledger.db".to_string()
}
