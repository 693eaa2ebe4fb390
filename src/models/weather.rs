use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One hourly forecast sample, already shifted to establishment-local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherHour {
    #[serde(with = "hour_label")]
    pub time: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
    /// Precipitation total for the following hour, in mm
    pub precipitation_amount: f64,
    pub cloud_cover: f64,
    pub fog: bool,
    #[serde(default)]
    pub wind_speed: f64,
    #[serde(default)]
    pub symbol_code: String,
}

impl WeatherHour {
    pub fn hour_of_day(&self) -> u32 {
        self.time.hour()
    }

    pub fn label(&self) -> String {
        format_hour_label(&self.time)
    }
}

pub fn format_hour_label(time: &NaiveDateTime) -> String {
    time.format(hour_label::FORMAT).to_string()
}

mod hour_label {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:00";

    pub fn serialize<S: Serializer>(time: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        use serde::de::Error;
        let value = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&format!("{}:00", value), "%Y-%m-%d %H:%M:%S")
            .map_err(|e| D::Error::custom(format!("invalid hour label '{}': {}", value, e)))
    }
}

/// Local sunrise and sunset hours (0-23).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunHours {
    pub sunrise_hour: u32,
    pub sunset_hour: u32,
}

/// Forecast indices blocked by rain. Each rainy hour also blocks its
/// neighbours to cover forecast timing error and wet surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RainWindow {
    blocked: BTreeSet<usize>,
}

impl RainWindow {
    pub fn from_forecast(hours: &[WeatherHour]) -> Self {
        let mut blocked = BTreeSet::new();
        for (idx, hour) in hours.iter().enumerate() {
            if hour.precipitation_amount > 0.0 {
                blocked.insert(idx);
                if idx > 0 {
                    blocked.insert(idx - 1);
                }
                if idx + 1 < hours.len() {
                    blocked.insert(idx + 1);
                }
            }
        }
        Self { blocked }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.blocked.contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}
