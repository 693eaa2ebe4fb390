use crate::config::LimitsConfig;
use crate::error::{AerOpsError, Result};
use serde::{Deserialize, Serialize};

/// How a silo's fan is driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    #[default]
    Auto,
    On,
    Off,
    Intelligent,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Auto => "auto",
            OperatingMode::On => "on",
            OperatingMode::Off => "off",
            OperatingMode::Intelligent => "intelligent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(OperatingMode::Auto),
            "on" => Some(OperatingMode::On),
            "off" => Some(OperatingMode::Off),
            "intelligent" | "inteligente" => Some(OperatingMode::Intelligent),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrainType {
    #[serde(alias = "trigo")]
    Wheat,
    #[serde(alias = "soja")]
    Soybean,
    #[serde(alias = "maiz")]
    Corn,
}

impl GrainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrainType::Wheat => "trigo",
            GrainType::Soybean => "soja",
            GrainType::Corn => "maiz",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trigo" | "wheat" => Some(GrainType::Wheat),
            "soja" | "soybean" | "soy" => Some(GrainType::Soybean),
            "maiz" | "maíz" | "corn" | "maize" => Some(GrainType::Corn),
            _ => None,
        }
    }
}

impl std::fmt::Display for GrainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    #[default]
    Dry,
    Humidify,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Dry => "dry",
            OperationType::Humidify => "humidify",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "dry" | "secar" => Some(OperationType::Dry),
            "humidify" | "humectar" => Some(OperationType::Humidify),
            _ => None,
        }
    }
}

/// Autonomous control profile driven by internal grain sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelligentConfig {
    pub grain_type: GrainType,
    /// Grain moisture content to reach, in percent wet basis
    pub target_grain_moisture: f64,
    pub target_temp: Option<f64>,
    pub achieve_temperature: bool,
    pub achieve_humidity: bool,
    pub operation_type: OperationType,
    pub anti_condensation: bool,
    pub delta_temp_min: f64,
    pub delta_temp_hyst: f64,
    pub delta_emc_min: f64,
    pub active: bool,
}

impl Default for IntelligentConfig {
    fn default() -> Self {
        Self {
            grain_type: GrainType::Corn,
            target_grain_moisture: 14.0,
            target_temp: None,
            achieve_temperature: false,
            achieve_humidity: false,
            operation_type: OperationType::Dry,
            anti_condensation: true,
            delta_temp_min: 5.0,
            delta_temp_hyst: 2.0,
            delta_emc_min: 1.0,
            active: false,
        }
    }
}

/// Aeration time window: either fixed clock hours or sunrise..sunset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub air_start_hour: u32,
    pub air_end_hour: u32,
    #[serde(default)]
    pub use_sun_schedule: bool,
}

impl Default for ScheduleWindow {
    fn default() -> Self {
        Self {
            air_start_hour: 22,
            air_end_hour: 6,
            use_sun_schedule: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiloConfig {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub establishment_id: i64,
    pub aerator_position: u32,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub min_humidity: f64,
    pub max_humidity: f64,
    #[serde(flatten)]
    pub schedule: ScheduleWindow,
    #[serde(default)]
    pub peak_hours_shutdown: bool,
    #[serde(default)]
    pub mode: OperatingMode,
    #[serde(default)]
    pub modified: bool,
    #[serde(default)]
    pub intelligent: Option<IntelligentConfig>,
}

impl SiloConfig {
    /// Active intelligent profile, if one is configured and switched on.
    pub fn active_intelligent(&self) -> Option<&IntelligentConfig> {
        self.intelligent.as_ref().filter(|c| c.active)
    }

    /// Write-time checks. The decision engine assumes these already hold.
    pub fn validate(&self, limits: &LimitsConfig) -> Result<()> {
        if self.min_temperature >= self.max_temperature {
            return Err(AerOpsError::InvalidData(format!(
                "silo '{}': min_temperature ({}) must be below max_temperature ({})",
                self.name, self.min_temperature, self.max_temperature
            )));
        }
        if self.min_humidity >= self.max_humidity {
            return Err(AerOpsError::InvalidData(format!(
                "silo '{}': min_humidity ({}) must be below max_humidity ({})",
                self.name, self.min_humidity, self.max_humidity
            )));
        }
        if self.schedule.air_start_hour > 23 || self.schedule.air_end_hour > 23 {
            return Err(AerOpsError::InvalidData(format!(
                "silo '{}': aeration hours must be within 0-23",
                self.name
            )));
        }
        if self.aerator_position == 0 || self.aerator_position > limits.aerator_positions {
            return Err(AerOpsError::InvalidData(format!(
                "silo '{}': aerator position {} outside 1-{}",
                self.name, self.aerator_position, limits.aerator_positions
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
impl SiloConfig {
    /// Defaults used by fixtures: 10-25 °C, 40-70 % RH, night window.
    pub fn new(id: i64, establishment_id: i64, aerator_position: u32) -> Self {
        Self {
            id,
            name: format!("Silo {}", aerator_position),
            establishment_id,
            aerator_position,
            min_temperature: 10.0,
            max_temperature: 25.0,
            min_humidity: 40.0,
            max_humidity: 70.0,
            schedule: ScheduleWindow::default(),
            peak_hours_shutdown: false,
            mode: OperatingMode::Auto,
            modified: false,
            intelligent: None,
        }
    }
}
