use crate::error::{AerOpsError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeatherConfig {
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    #[serde(default = "default_sun_url")]
    pub sun_url: String,
    /// MET Norway rejects requests without an identifying User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_forecast_ttl_secs")]
    pub forecast_ttl_secs: u64,
    #[serde(default = "default_sun_hours_ttl_secs")]
    pub sun_hours_ttl_secs: u64,
    #[serde(default = "default_forecast_hours")]
    pub forecast_hours: usize,
    /// Fixed offset of establishment-local time from UTC
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_coordinate_decimals")]
    pub coordinate_decimals: usize,
}

fn default_forecast_url() -> String {
    "https://api.met.no/weatherapi/locationforecast/2.0/compact".into()
}

fn default_sun_url() -> String {
    "https://api.sunrise-sunset.org/json".into()
}

fn default_user_agent() -> String {
    format!("aerops/{} (ops@example.com)", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_forecast_ttl_secs() -> u64 {
    5 * 60
}

fn default_sun_hours_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_forecast_hours() -> usize {
    24
}

fn default_utc_offset_hours() -> i32 {
    -3
}

fn default_coordinate_decimals() -> usize {
    4
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_url: default_forecast_url(),
            sun_url: default_sun_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            forecast_ttl_secs: default_forecast_ttl_secs(),
            sun_hours_ttl_secs: default_sun_hours_ttl_secs(),
            forecast_hours: default_forecast_hours(),
            utc_offset_hours: default_utc_offset_hours(),
            coordinate_decimals: default_coordinate_decimals(),
        }
    }
}

impl WeatherConfig {
    pub fn utc_offset(&self) -> Result<chrono::FixedOffset> {
        chrono::FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            AerOpsError::Config(format!(
                "utc_offset_hours {} is out of range",
                self.utc_offset_hours
            ))
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorConfig {
    /// Trailing window of internal readings used by intelligent mode
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
    /// Oldest aerator current reading still trusted for overcurrent protection
    #[serde(default = "default_current_max_age_minutes")]
    pub current_max_age_minutes: i64,
}

fn default_window_hours() -> i64 {
    24
}

fn default_current_max_age_minutes() -> i64 {
    60
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            current_max_age_minutes: default_current_max_age_minutes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Number of fan outputs on an edge controller board
    #[serde(default = "default_aerator_positions")]
    pub aerator_positions: u32,
}

fn default_aerator_positions() -> u32 {
    8
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            aerator_positions: default_aerator_positions(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

impl Config {
    /// Loads config from an explicit path or the standard locations.
    /// Falls back to defaults when no file exists and none was requested.
    pub fn load(config_override: Option<&PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => {
                if !p.exists() {
                    return Err(AerOpsError::Config(format!(
                        "Config file not found at {:?}",
                        p
                    )));
                }
                p.clone()
            }
            None => match Self::find_config_path() {
                Some(p) => p,
                None => {
                    tracing::info!("No config file found, using built-in defaults");
                    return Ok(Self::default());
                }
            },
        };

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| AerOpsError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let content = Self::substitute_env_vars(content);
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| AerOpsError::Config(format!("Failed to parse config: {}", e)))?;
        config.weather.utc_offset()?;
        Ok(config)
    }

    /// Search for config.yaml in the working directory, then the XDG config dir.
    fn find_config_path() -> Option<PathBuf> {
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir()
            .map(|dir| dir.join("aerops").join("config.yaml"))
            .filter(|p| p.exists())
    }

    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
            Ok(re) => re,
            Err(_) => return result,
        };

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        result
    }

    pub fn data_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("AEROPS_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| AerOpsError::Config("Cannot determine data directory".into()))?
            .join("aerops");

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(p) => Ok(p.clone()),
            None => Ok(Self::data_dir()?.join("aerops.db")),
        }
    }
}
