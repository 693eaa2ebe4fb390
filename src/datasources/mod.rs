pub mod metno;
pub mod sunrise;

pub use metno::MetNorwayClient;
pub use sunrise::SunriseSunsetClient;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// One upstream forecast entry, still in UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSample {
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub precipitation_amount: f64,
    pub cloud_cover: f64,
    pub fog: bool,
    pub wind_speed: f64,
    pub symbol_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

/// Hourly forecast feed keyed by coordinates.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch_hourly(&self, latitude: f64, longitude: f64) -> Result<Vec<ForecastSample>>;

    /// Data source name for logging
    fn name(&self) -> &'static str;
}

/// Sunrise/sunset feed keyed by coordinates and date.
#[async_trait]
pub trait SunTimesSource: Send + Sync {
    async fn fetch_sun_times(
        &self,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
    ) -> Result<SunTimes>;

    fn name(&self) -> &'static str;
}
