use crate::cache::{Clock, TtlCache};
use crate::config::WeatherConfig;
use crate::datasources::{ForecastSample, ForecastSource, SunTimesSource};
use crate::error::Result;
use crate::models::{SunHours, WeatherHour};
use chrono::{Duration, DurationRound, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Forecast and sun-hour lookups behind TTL caches.
///
/// Upstream failures never propagate: callers get an empty forecast or
/// `None` and must treat that as "hold fans off". An empty or failed
/// forecast is cached for the same TTL as a good one, so an outage costs
/// one upstream call per TTL rather than one per poll.
pub struct WeatherProvider {
    forecast_source: Arc<dyn ForecastSource>,
    sun_source: Arc<dyn SunTimesSource>,
    forecasts: TtlCache<i64, Vec<WeatherHour>>,
    sun_hours: TtlCache<String, SunHours>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    horizon: usize,
    coordinate_decimals: usize,
}

impl WeatherProvider {
    pub fn new(
        config: &WeatherConfig,
        forecast_source: Arc<dyn ForecastSource>,
        sun_source: Arc<dyn SunTimesSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let offset = config.utc_offset()?;
        Ok(Self {
            forecast_source,
            sun_source,
            forecasts: TtlCache::new(
                Duration::seconds(config.forecast_ttl_secs as i64),
                clock.clone(),
            ),
            sun_hours: TtlCache::new(
                Duration::seconds(config.sun_hours_ttl_secs as i64),
                clock.clone(),
            ),
            clock,
            offset,
            horizon: config.forecast_hours,
            coordinate_decimals: config.coordinate_decimals,
        })
    }

    /// Establishment-local wall clock.
    pub fn local_now(&self) -> NaiveDateTime {
        self.clock.now().with_timezone(&self.offset).naive_local()
    }

    /// Start of the current local hour.
    pub fn current_local_hour(&self) -> NaiveDateTime {
        let now = self.local_now();
        now.duration_trunc(Duration::hours(1)).unwrap_or(now)
    }

    /// Number of hourly rows in a full schedule.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Up to `horizon` hourly samples starting at the current local hour.
    /// Empty when the upstream source is unavailable.
    pub async fn get_forecast(
        &self,
        establishment_id: i64,
        latitude: f64,
        longitude: f64,
    ) -> Vec<WeatherHour> {
        if let Some((hours, age)) = self.forecasts.get(&establishment_id).await {
            debug!(
                establishment_id,
                age_secs = age.num_seconds(),
                "Forecast cache hit"
            );
            return hours;
        }
        debug!(establishment_id, "Forecast cache miss");

        let started = Instant::now();
        match self.forecast_source.fetch_hourly(latitude, longitude).await {
            Ok(samples) => {
                let hours = self.localize(samples);
                info!(
                    establishment_id,
                    source = self.forecast_source.name(),
                    hours = hours.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Fetched forecast"
                );
                if hours.is_empty() {
                    warn!(establishment_id, "Forecast has no hours from now onward");
                }
                self.forecasts.set(establishment_id, hours.clone()).await;
                hours
            }
            Err(e) => {
                warn!(
                    establishment_id,
                    source = self.forecast_source.name(),
                    error = %e,
                    "Forecast unavailable"
                );
                self.forecasts.set(establishment_id, Vec::new()).await;
                Vec::new()
            }
        }
    }

    /// Local sunrise and sunset hours for a date, or `None` on upstream failure.
    pub async fn get_sun_hours(
        &self,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
    ) -> Option<SunHours> {
        let key = format!(
            "{:.*}_{:.*}_{}",
            self.coordinate_decimals,
            latitude,
            self.coordinate_decimals,
            longitude,
            date.format("%Y-%m-%d")
        );

        if let Some((hours, _)) = self.sun_hours.get(&key).await {
            debug!(key = %key, "Sun hours cache hit");
            return Some(hours);
        }

        match self
            .sun_source
            .fetch_sun_times(latitude, longitude, date)
            .await
        {
            Ok(times) => {
                let hours = SunHours {
                    sunrise_hour: times.sunrise.with_timezone(&self.offset).hour(),
                    sunset_hour: times.sunset.with_timezone(&self.offset).hour(),
                };
                info!(
                    key = %key,
                    sunrise = hours.sunrise_hour,
                    sunset = hours.sunset_hour,
                    "Fetched sun hours"
                );
                self.sun_hours.set(key, hours).await;
                Some(hours)
            }
            Err(e) => {
                warn!(
                    key = %key,
                    source = self.sun_source.name(),
                    error = %e,
                    "Sun hours unavailable"
                );
                None
            }
        }
    }

    /// Drops one establishment's forecast, or every cached entry when `None`.
    pub async fn clear_cache(&self, establishment_id: Option<i64>) {
        match establishment_id {
            Some(id) => {
                self.forecasts.remove(&id).await;
                debug!(establishment_id = id, "Cleared forecast cache entry");
            }
            None => {
                self.forecasts.clear().await;
                self.sun_hours.clear().await;
                debug!("Cleared all weather caches");
            }
        }
    }

    fn localize(&self, samples: Vec<ForecastSample>) -> Vec<WeatherHour> {
        let from = self.current_local_hour();
        samples
            .into_iter()
            .map(|s| WeatherHour {
                time: s.time.with_timezone(&self.offset).naive_local(),
                temperature: s.temperature,
                humidity: s.humidity,
                precipitation_amount: s.precipitation_amount,
                cloud_cover: s.cloud_cover,
                fog: s.fog,
                wind_speed: s.wind_speed,
                symbol_code: s.symbol_code,
            })
            .filter(|h| h.time >= from)
            .take(self.horizon)
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::datasources::{ForecastSample, ForecastSource, SunTimes, SunTimesSource};
    use crate::error::{AerOpsError, Result};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, NaiveDate, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mild, dry, clear hours starting at `start`.
    pub fn mild_series(start: DateTime<Utc>, count: usize) -> Vec<ForecastSample> {
        (0..count)
            .map(|i| ForecastSample {
                time: start + Duration::hours(i as i64),
                temperature: 18.0,
                humidity: 55.0,
                precipitation_amount: 0.0,
                cloud_cover: 20.0,
                fog: false,
                wind_speed: 3.0,
                symbol_code: "clearsky_day".into(),
            })
            .collect()
    }

    pub struct FakeForecast {
        pub samples: Mutex<Vec<ForecastSample>>,
        pub fail: AtomicBool,
        pub calls: AtomicUsize,
    }

    impl FakeForecast {
        pub fn new(samples: Vec<ForecastSample>) -> Self {
            Self {
                samples: Mutex::new(samples),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            let fake = Self::new(Vec::new());
            fake.fail.store(true, Ordering::SeqCst);
            fake
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ForecastSource for FakeForecast {
        async fn fetch_hourly(&self, _lat: f64, _lon: f64) -> Result<Vec<ForecastSample>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(AerOpsError::DataSourceUnavailable("timed out".into()));
            }
            Ok(self.samples.lock().unwrap().clone())
        }

        fn name(&self) -> &'static str {
            "fake forecast"
        }
    }

    pub struct FakeSun {
        pub times: Option<SunTimes>,
        pub calls: AtomicUsize,
    }

    impl FakeSun {
        pub fn new(times: Option<SunTimes>) -> Self {
            Self {
                times,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SunTimesSource for FakeSun {
        async fn fetch_sun_times(
            &self,
            _lat: f64,
            _lon: f64,
            _date: NaiveDate,
        ) -> Result<SunTimes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.times
                .ok_or_else(|| AerOpsError::DataSourceUnavailable("status INVALID_DATE".into()))
        }

        fn name(&self) -> &'static str {
            "fake sun"
        }
    }
}
