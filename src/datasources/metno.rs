use super::{ForecastSample, ForecastSource};
use crate::config::WeatherConfig;
use crate::error::{AerOpsError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Fog fraction (%) above which an hour counts as foggy.
const FOG_FRACTION_THRESHOLD: f64 = 50.0;

pub struct MetNorwayClient {
    client: reqwest::Client,
    base_url: String,
    coordinate_decimals: usize,
}

// MET Norway locationforecast 2.0 response structures
#[derive(Debug, Deserialize)]
struct MetResponse {
    properties: MetProperties,
}

#[derive(Debug, Deserialize)]
struct MetProperties {
    timeseries: Vec<MetEntry>,
}

#[derive(Debug, Deserialize)]
struct MetEntry {
    time: DateTime<Utc>,
    data: MetData,
}

#[derive(Debug, Deserialize)]
struct MetData {
    instant: MetInstant,
    next_1_hours: Option<MetNextHour>,
}

#[derive(Debug, Deserialize)]
struct MetInstant {
    details: MetInstantDetails,
}

#[derive(Debug, Deserialize)]
struct MetInstantDetails {
    air_temperature: Option<f64>,
    relative_humidity: Option<f64>,
    wind_speed: Option<f64>,
    cloud_area_fraction: Option<f64>,
    // Only present in the "complete" product
    fog_area_fraction: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MetNextHour {
    summary: Option<MetSummary>,
    details: Option<MetNextHourDetails>,
}

#[derive(Debug, Deserialize)]
struct MetSummary {
    symbol_code: String,
}

#[derive(Debug, Deserialize)]
struct MetNextHourDetails {
    precipitation_amount: Option<f64>,
}

impl MetNorwayClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.forecast_url.clone(),
            coordinate_decimals: config.coordinate_decimals,
        })
    }

    fn forecast_url(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}?lat={:.*}&lon={:.*}",
            self.base_url, self.coordinate_decimals, latitude, self.coordinate_decimals, longitude
        )
    }

    fn convert_response(response: MetResponse) -> Vec<ForecastSample> {
        response
            .properties
            .timeseries
            .into_iter()
            .map(Self::convert_entry)
            .collect()
    }

    fn convert_entry(entry: MetEntry) -> ForecastSample {
        let instant = entry.data.instant.details;
        let next_hour = entry.data.next_1_hours;

        let precipitation_amount = next_hour
            .as_ref()
            .and_then(|n| n.details.as_ref())
            .and_then(|d| d.precipitation_amount)
            .unwrap_or(0.0);
        let symbol_code = next_hour
            .and_then(|n| n.summary)
            .map(|s| s.symbol_code)
            .unwrap_or_else(|| "unknown".to_string());

        ForecastSample {
            time: entry.time,
            temperature: instant.air_temperature.unwrap_or(0.0),
            humidity: instant.relative_humidity.unwrap_or(0.0),
            precipitation_amount,
            cloud_cover: instant.cloud_area_fraction.unwrap_or(0.0),
            fog: instant
                .fog_area_fraction
                .is_some_and(|f| f > FOG_FRACTION_THRESHOLD),
            wind_speed: instant.wind_speed.unwrap_or(0.0),
            symbol_code,
        }
    }
}

#[async_trait]
impl ForecastSource for MetNorwayClient {
    async fn fetch_hourly(&self, latitude: f64, longitude: f64) -> Result<Vec<ForecastSample>> {
        let url = self.forecast_url(latitude, longitude);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AerOpsError::DataSourceUnavailable(format!("MET Norway: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AerOpsError::DataSourceUnavailable(format!(
                "MET Norway returned {}: {}",
                status, body
            )));
        }

        let met_response: MetResponse = response.json().await.map_err(|e| {
            AerOpsError::DataSourceUnavailable(format!(
                "Failed to parse MET Norway response: {}",
                e
            ))
        })?;

        Ok(Self::convert_response(met_response))
    }

    fn name(&self) -> &'static str {
        "MET Norway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "Feature",
        "properties": {
            "meta": {"updated_at": "2025-03-10T11:30:00Z"},
            "timeseries": [
                {
                    "time": "2025-03-10T12:00:00Z",
                    "data": {
                        "instant": {"details": {
                            "air_temperature": 18.4,
                            "relative_humidity": 61.2,
                            "wind_speed": 3.1,
                            "cloud_area_fraction": 12.5
                        }},
                        "next_1_hours": {
                            "summary": {"symbol_code": "fair_day"},
                            "details": {"precipitation_amount": 0.0}
                        }
                    }
                },
                {
                    "time": "2025-03-10T13:00:00Z",
                    "data": {
                        "instant": {"details": {
                            "air_temperature": 16.0,
                            "relative_humidity": 92.0,
                            "cloud_area_fraction": 100.0,
                            "fog_area_fraction": 80.0
                        }},
                        "next_1_hours": {
                            "summary": {"symbol_code": "rain"},
                            "details": {"precipitation_amount": 1.4}
                        }
                    }
                },
                {
                    "time": "2025-03-13T00:00:00Z",
                    "data": {
                        "instant": {"details": {"air_temperature": 9.0}}
                    }
                }
            ]
        }
    }"#;

    fn client() -> MetNorwayClient {
        MetNorwayClient::new(&WeatherConfig::default()).unwrap()
    }

    #[test]
    fn parses_timeseries() {
        let response: MetResponse = serde_json::from_str(SAMPLE).unwrap();
        let samples = MetNorwayClient::convert_response(response);

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].temperature, 18.4);
        assert_eq!(samples[0].humidity, 61.2);
        assert_eq!(samples[0].precipitation_amount, 0.0);
        assert_eq!(samples[0].symbol_code, "fair_day");
        assert!(!samples[0].fog);

        assert_eq!(samples[1].precipitation_amount, 1.4);
        assert!(samples[1].fog);
        assert_eq!(samples[1].cloud_cover, 100.0);
    }

    #[test]
    fn missing_fields_read_as_zero() {
        let response: MetResponse = serde_json::from_str(SAMPLE).unwrap();
        let samples = MetNorwayClient::convert_response(response);
        let sparse = &samples[2];

        assert_eq!(sparse.humidity, 0.0);
        assert_eq!(sparse.precipitation_amount, 0.0);
        assert_eq!(sparse.symbol_code, "unknown");
        assert!(!sparse.fog);
    }

    #[test]
    fn coordinates_are_rounded() {
        let url = client().forecast_url(-34.603722, -58.381592);
        assert!(url.ends_with("?lat=-34.6037&lon=-58.3816"));
    }
}
