//! Configuration loader - YAML manifest + .env overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse YAML configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration loaded from dashboard.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub dataset: PathBuf,
    pub web_dir: PathBuf,
    pub entity_column: String,
    pub year_column: String,
    pub energy_types: EnergyColumns,
    pub sectors: Vec<String>,
    pub defaults: Defaults,
}

/// Column names of the two aggregate energy-type totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyColumns {
    pub renewable: String,
    pub non_renewable: String,
}

/// Initial control values shown when the page first loads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub countries: Vec<String>,
    pub sectors: Vec<String>,
    pub year: Option<i32>,
}

/// Settings loaded from the environment (.env supported)
#[derive(Debug, Clone)]
pub struct Env {
    pub port: u16,
    pub data_file: Option<PathBuf>,
    pub log_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        let sectors: Vec<String> = [
            "Biofuels Production - TWh - Total",
            "Electricity from hydro (TWh)",
            "Electricity from solar (TWh)",
            "Electricity from wind (TWh)",
            "Coal Consumption - TWh",
            "Oil Consumption - TWh",
            "Gas Consumption - TWh",
            "Nuclear Consumption - TWh",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Config {
            title: "Energy production Dashboard".to_string(),
            dataset: PathBuf::from("Data.xlsx"),
            web_dir: PathBuf::from("web"),
            entity_column: "Entity".to_string(),
            year_column: "Year".to_string(),
            energy_types: EnergyColumns {
                renewable: "Total Renewable".to_string(),
                non_renewable: "Total Not Renewable".to_string(),
            },
            defaults: Defaults {
                countries: vec!["Portugal".to_string()],
                sectors: vec![sectors[0].clone(), sectors[4].clone()],
                year: None,
            },
            sectors,
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        config.narrow_default_sectors();
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sectors.is_empty() {
            return Err(ConfigError::Invalid("at least one sector column is required".into()));
        }
        if self.energy_types.renewable.is_empty() || self.energy_types.non_renewable.is_empty() {
            return Err(ConfigError::Invalid("both energy-type columns must be named".into()));
        }
        if self.energy_types.renewable == self.energy_types.non_renewable {
            return Err(ConfigError::Invalid("energy-type columns must differ".into()));
        }
        Ok(())
    }

    /// Default sectors must come from `sectors`. Unknown ones are dropped and
    /// an empty result falls back to the first configured sector.
    fn narrow_default_sectors(&mut self) {
        let sectors = &self.sectors;
        self.defaults.sectors.retain(|s| {
            let known = sectors.contains(s);
            if !known {
                tracing::warn!("Default sector '{}' is not a configured sector, ignoring it", s);
            }
            known
        });
        if self.defaults.sectors.is_empty() {
            self.defaults.sectors.extend(self.sectors.first().cloned());
        }
    }

    /// Apply environment overrides on top of the file config
    pub fn with_env(mut self, env: &Env) -> Self {
        if let Some(data_file) = &env.data_file {
            self.dataset = data_file.clone();
        }
        self
    }
}

impl Env {
    /// Load settings from .env file and process environment
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Env {
            port: std::env::var("DASHBOARD_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8050),
            data_file: std::env::var("DASHBOARD_DATA").ok().map(PathBuf::from),
            log_dir: std::env::var("DASHBOARD_LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        }
    }
}

/// Human-readable label for a column name
pub fn label(column: &str) -> String {
    column.replace('_', " ")
}
