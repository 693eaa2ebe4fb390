use super::engine::{DecisionEngine, HourContext};
use super::weather::WeatherProvider;
use crate::cache::Clock;
use crate::config::SensorConfig;
use crate::db::Database;
use crate::error::{AerOpsError, Result};
use crate::models::{
    format_hour_label, DashboardView, Decision, DevicePoll, Establishment, HourlyState,
    OffReason, OperatingMode, RainWindow, Schedule, SensorWindow, SiloConfig, SiloState,
    WeatherHour,
};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs the decision engine over every silo of an establishment and every
/// forecast hour, and owns the device-sync "modified" acknowledgment.
pub struct ScheduleAggregator {
    db: Database,
    weather: Arc<WeatherProvider>,
    engine: DecisionEngine,
    clock: Arc<dyn Clock>,
    sensor_window: Duration,
    current_max_age: Duration,
}

struct Computed {
    establishment: Establishment,
    schedule: Schedule,
    forecast: Vec<WeatherHour>,
}

impl ScheduleAggregator {
    pub fn new(
        db: Database,
        weather: Arc<WeatherProvider>,
        clock: Arc<dyn Clock>,
        sensors: &SensorConfig,
    ) -> Self {
        Self {
            db,
            weather,
            engine: DecisionEngine::new(),
            clock,
            sensor_window: Duration::hours(sensors.window_hours),
            current_max_age: Duration::minutes(sensors.current_max_age_minutes),
        }
    }

    /// The hourly schedule for an establishment. Clears every silo's
    /// modified flag afterwards: calling this acknowledges pending changes.
    pub async fn get_24_hour_states(&self, establishment_id: i64) -> Result<Schedule> {
        let computed = self.compute(establishment_id).await?;
        let cleared = self.db.clear_modified(establishment_id)?;
        if cleared > 0 {
            debug!(establishment_id, silos = cleared, "Acknowledged configuration changes");
        }
        Ok(computed.schedule)
    }

    /// Edge-device poll: whether configuration changed since the last poll,
    /// plus the fresh schedule.
    pub async fn poll(&self, establishment_id: i64) -> Result<DevicePoll> {
        let modified = self.db.check_modified(establishment_id)?;
        let schedule = self.get_24_hour_states(establishment_id).await?;
        Ok(DevicePoll { modified, schedule })
    }

    /// Operator view. Leaves the modified flag for devices to consume.
    pub async fn dashboard(&self, establishment_id: i64) -> Result<DashboardView> {
        let computed = self.compute(establishment_id).await?;
        Ok(DashboardView {
            establishment: computed.establishment,
            schedule: computed.schedule,
            forecast: computed.forecast,
        })
    }

    pub fn check_modified(&self, establishment_id: i64) -> Result<bool> {
        self.establishment(establishment_id)?;
        self.db.check_modified(establishment_id)
    }

    /// Flags a configuration push for devices and drops the cached
    /// forecast so the next schedule is computed from fresh data.
    pub async fn mark_modified(&self, establishment_id: i64) -> Result<usize> {
        self.establishment(establishment_id)?;
        let count = self.db.mark_modified(establishment_id)?;
        self.weather.clear_cache(Some(establishment_id)).await;
        info!(establishment_id, silos = count, "Marked silos as modified");
        Ok(count)
    }

    fn establishment(&self, establishment_id: i64) -> Result<Establishment> {
        self.db
            .get_establishment(establishment_id)?
            .ok_or_else(|| AerOpsError::NotFound(format!("establishment {}", establishment_id)))
    }

    async fn compute(&self, establishment_id: i64) -> Result<Computed> {
        let establishment = self.establishment(establishment_id)?;
        let silos = self.db.list_silos(establishment_id)?;

        let forecast = self
            .weather
            .get_forecast(
                establishment_id,
                establishment.latitude,
                establishment.longitude,
            )
            .await;

        if forecast.is_empty() {
            warn!(
                establishment_id,
                silos = silos.len(),
                "No forecast available, holding every fan off"
            );
            let schedule = self.degraded_schedule(establishment_id, &silos);
            return Ok(Computed {
                establishment,
                schedule,
                forecast,
            });
        }

        let rain_window = RainWindow::from_forecast(&forecast);

        // One lookup shared by every sun-scheduled silo
        let sun_hours = if silos.iter().any(|s| s.schedule.use_sun_schedule) {
            let today = self.weather.local_now().date();
            self.weather
                .get_sun_hours(establishment.latitude, establishment.longitude, today)
                .await
        } else {
            None
        };

        let sensors = self.sensor_windows(&silos)?;
        let empty = SensorWindow::default();

        let states: Vec<HourlyState> = forecast
            .iter()
            .enumerate()
            .map(|(index, hour)| HourlyState {
                hour: hour.label(),
                states: silos
                    .iter()
                    .map(|silo| {
                        let ctx = HourContext {
                            index,
                            weather: hour,
                            rain_window: &rain_window,
                            sun_hours,
                            sensors: sensors.get(&silo.id).unwrap_or(&empty),
                        };
                        SiloState {
                            silo_id: silo.id,
                            position: silo.aerator_position,
                            decision: self.engine.evaluate_hour(silo, &ctx),
                        }
                    })
                    .collect(),
            })
            .collect();

        let mut schedule = Schedule {
            establishment_id,
            current_time: forecast[0].label(),
            states,
        };
        self.apply_protections(&establishment, &mut schedule)?;

        debug!(
            establishment_id,
            silos = silos.len(),
            hours = schedule.states.len(),
            rain_expected = !rain_window.is_empty(),
            "Computed schedule"
        );

        Ok(Computed {
            establishment,
            schedule,
            forecast,
        })
    }

    /// Overrides applied after the engine: an aerator current above the
    /// establishment limit stops the current hour, and the global switch
    /// stops every hour.
    fn apply_protections(&self, establishment: &Establishment, schedule: &mut Schedule) -> Result<()> {
        if let Some(limit) = establishment.max_operating_current {
            let since = self.clock.now() - self.current_max_age;
            if let Some(current) = self.db.latest_current(establishment.id, since)? {
                if current > limit {
                    let stopped = schedule.states.first_mut().map_or(0, |row| {
                        row.states
                            .iter_mut()
                            .map(|s| s.decision.force_off(OffReason::MaxCurrentExceeded))
                            .filter(|changed| *changed)
                            .count()
                    });
                    warn!(
                        establishment_id = establishment.id,
                        current,
                        limit,
                        stopped,
                        "Aerator current above limit, stopping fans for the current hour"
                    );
                }
            }
        }

        if !self.db.global_aerator_enabled()? {
            let stopped = schedule
                .states
                .iter_mut()
                .flat_map(|row| row.states.iter_mut())
                .map(|s| s.decision.force_off(OffReason::GlobalAeratorControlDisabled))
                .filter(|changed| *changed)
                .count();
            info!(
                establishment_id = establishment.id,
                stopped, "Aerators globally disabled, holding every fan off"
            );
        }
        Ok(())
    }

    /// Sensor history for silos that drive themselves from it.
    fn sensor_windows(&self, silos: &[SiloConfig]) -> Result<HashMap<i64, SensorWindow>> {
        let since = self.clock.now() - self.sensor_window;
        let mut windows = HashMap::new();
        for silo in silos.iter().filter(|s| s.mode == OperatingMode::Intelligent) {
            windows.insert(silo.id, self.db.sensor_window(silo.id, since)?);
        }
        Ok(windows)
    }

    /// All-off rows from the current local hour, one state per silo.
    fn degraded_schedule(&self, establishment_id: i64, silos: &[SiloConfig]) -> Schedule {
        let start = self.weather.current_local_hour();
        let states = (0..self.weather.horizon())
            .map(|i| HourlyState {
                hour: format_hour_label(&(start + Duration::hours(i as i64))),
                states: silos
                    .iter()
                    .map(|silo| SiloState {
                        silo_id: silo.id,
                        position: silo.aerator_position,
                        decision: Decision::off(OffReason::ForecastUnavailable),
                    })
                    .collect(),
            })
            .collect();

        Schedule {
            establishment_id,
            current_time: format_hour_label(&start),
            states,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::ManualClock;
    use crate::config::{LimitsConfig, WeatherConfig};
    use crate::datasources::{ForecastSample, SunTimes};
    use crate::logic::weather::test_support::{mild_series, FakeForecast, FakeSun};
    use crate::models::{IntelligentConfig, ScheduleWindow};
    use chrono::{DateTime, TimeZone, Utc};

    struct Fixture {
        db: Database,
        establishment_id: i64,
        forecast: Arc<FakeForecast>,
        sun: Arc<FakeSun>,
        aggregator: ScheduleAggregator,
    }

    // 12:30 local at the default -3 offset
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 15, 30, 0).unwrap()
    }

    fn series() -> Vec<ForecastSample> {
        mild_series(Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap(), 30)
    }

    fn sun_times() -> SunTimes {
        SunTimes {
            sunrise: Utc.with_ymd_and_hms(2025, 3, 10, 9, 45, 0).unwrap(),
            sunset: Utc.with_ymd_and_hms(2025, 3, 10, 22, 31, 0).unwrap(),
        }
    }

    fn fixture(forecast: FakeForecast, silos: Vec<SiloConfig>) -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let establishment_id = db.insert_establishment("La Esperanza", -34.6, -58.4).unwrap();
        for mut silo in silos {
            silo.establishment_id = establishment_id;
            db.insert_silo(&silo, &LimitsConfig::default()).unwrap();
        }

        let clock = Arc::new(ManualClock::at(now()));
        let forecast = Arc::new(forecast);
        let sun = Arc::new(FakeSun::new(Some(sun_times())));
        let weather = WeatherProvider::new(
            &WeatherConfig::default(),
            forecast.clone(),
            sun.clone(),
            clock.clone(),
        )
        .unwrap();
        let aggregator = ScheduleAggregator::new(
            db.clone(),
            Arc::new(weather),
            clock,
            &SensorConfig::default(),
        );

        Fixture {
            db,
            establishment_id,
            forecast,
            sun,
            aggregator,
        }
    }

    fn silo(position: u32, mode: OperatingMode) -> SiloConfig {
        let mut silo = SiloConfig::new(0, 0, position);
        silo.mode = mode;
        silo.schedule = ScheduleWindow {
            air_start_hour: 0,
            air_end_hour: 23,
            use_sun_schedule: false,
        };
        silo
    }

    #[tokio::test]
    async fn schedule_has_a_row_per_hour_and_a_state_per_silo() {
        let f = fixture(
            FakeForecast::new(series()),
            vec![silo(1, OperatingMode::Auto), silo(2, OperatingMode::Off)],
        );
        let schedule = f.aggregator.get_24_hour_states(f.establishment_id).await.unwrap();

        assert_eq!(schedule.states.len(), 24);
        assert_eq!(schedule.current_time, "2025-03-10 12:00");
        assert_eq!(schedule.states[0].hour, "2025-03-10 12:00");
        for row in &schedule.states {
            assert_eq!(row.states.len(), 2);
            assert!(row.states[0].decision.is_on);
            assert_eq!(row.states[1].decision, Decision::off(OffReason::ManualOff));
        }
    }

    #[tokio::test]
    async fn rain_window_is_shared_by_every_silo() {
        let mut samples = series();
        samples[5].precipitation_amount = 1.2;
        let f = fixture(
            FakeForecast::new(samples),
            vec![silo(1, OperatingMode::On), silo(2, OperatingMode::Auto)],
        );
        let schedule = f.aggregator.get_24_hour_states(f.establishment_id).await.unwrap();
        let silo_ids: Vec<i64> = schedule.states[0].states.iter().map(|s| s.silo_id).collect();

        for id in silo_ids {
            for row in [4, 5, 6] {
                let decision = schedule.decision_for(row, id).unwrap();
                assert!(decision.has_reason(OffReason::Rain));
            }
            assert!(schedule.decision_for(3, id).unwrap().is_on);
            assert!(schedule.decision_for(10, id).unwrap().is_on);
        }
    }

    #[tokio::test]
    async fn missing_forecast_holds_every_silo_off() {
        let f = fixture(
            FakeForecast::failing(),
            vec![silo(1, OperatingMode::On), silo(2, OperatingMode::Auto)],
        );
        let schedule = f.aggregator.get_24_hour_states(f.establishment_id).await.unwrap();

        assert_eq!(schedule.states.len(), 24);
        assert_eq!(schedule.states[0].hour, "2025-03-10 12:00");
        assert_eq!(schedule.states[23].hour, "2025-03-11 11:00");
        for row in &schedule.states {
            assert_eq!(row.states.len(), 2);
            for state in &row.states {
                assert_eq!(state.decision, Decision::off(OffReason::ForecastUnavailable));
            }
        }
    }

    #[tokio::test]
    async fn unknown_establishment_is_not_found() {
        let f = fixture(FakeForecast::new(series()), vec![]);
        let err = f.aggregator.get_24_hour_states(999).await.unwrap_err();
        assert!(matches!(err, AerOpsError::NotFound(_)));
        assert_eq!(f.forecast.calls(), 0);
    }

    #[tokio::test]
    async fn poll_reports_and_consumes_modified_flag() {
        let f = fixture(FakeForecast::new(series()), vec![silo(1, OperatingMode::Auto)]);

        let first = f.aggregator.poll(f.establishment_id).await.unwrap();
        assert!(first.modified);
        let second = f.aggregator.poll(f.establishment_id).await.unwrap();
        assert!(!second.modified);
        assert_eq!(first.schedule, second.schedule);

        assert_eq!(f.forecast.calls(), 1);

        f.aggregator.mark_modified(f.establishment_id).await.unwrap();
        assert!(f.aggregator.check_modified(f.establishment_id).unwrap());
        assert!(f.aggregator.poll(f.establishment_id).await.unwrap().modified);
        assert_eq!(f.forecast.calls(), 2);
    }

    #[tokio::test]
    async fn dashboard_leaves_modified_flag_set() {
        let f = fixture(FakeForecast::new(series()), vec![silo(1, OperatingMode::Auto)]);

        let view = f.aggregator.dashboard(f.establishment_id).await.unwrap();
        assert_eq!(view.forecast.len(), 24);
        assert_eq!(view.establishment.name, "La Esperanza");
        assert!(f.db.check_modified(f.establishment_id).unwrap());
    }

    #[tokio::test]
    async fn sun_hours_fetched_once_only_when_needed() {
        let f = fixture(FakeForecast::new(series()), vec![silo(1, OperatingMode::Auto)]);
        f.aggregator.get_24_hour_states(f.establishment_id).await.unwrap();
        assert_eq!(f.sun.calls(), 0);

        let mut a = silo(1, OperatingMode::Auto);
        a.schedule.use_sun_schedule = true;
        let mut b = silo(2, OperatingMode::Auto);
        b.schedule.use_sun_schedule = true;
        let f = fixture(FakeForecast::new(series()), vec![a, b]);
        let schedule = f.aggregator.get_24_hour_states(f.establishment_id).await.unwrap();
        assert_eq!(f.sun.calls(), 1);

        // Sunrise 06, sunset 19 local: row 0 is 12:00, row 8 is 20:00
        let id = schedule.states[0].states[0].silo_id;
        assert!(schedule.decision_for(0, id).unwrap().is_on);
        assert!(schedule
            .decision_for(8, id)
            .unwrap()
            .has_reason(OffReason::OutsideSolarSchedule));
    }

    #[tokio::test]
    async fn intelligent_silo_reads_trailing_sensor_window() {
        let mut smart = silo(1, OperatingMode::Intelligent);
        smart.intelligent = Some(IntelligentConfig {
            target_temp: Some(20.0),
            achieve_temperature: true,
            anti_condensation: false,
            delta_temp_min: 5.0,
            delta_temp_hyst: 2.0,
            active: true,
            ..IntelligentConfig::default()
        });
        let f = fixture(FakeForecast::new(series()), vec![smart]);
        let id = f.db.list_silos(f.establishment_id).unwrap()[0].id;

        // Stale reading only
        f.db.record_temperature(id, 28.0, now() - Duration::hours(30)).unwrap();
        let schedule = f.aggregator.get_24_hour_states(f.establishment_id).await.unwrap();
        assert_eq!(
            schedule.decision_for(0, id).unwrap(),
            &Decision::off(OffReason::NoRecentSensorReadings)
        );

        // Hot grain, 18° air: 28 > 22 and 18 < 23
        f.db.record_temperature(id, 28.0, now() - Duration::hours(2)).unwrap();
        let schedule = f.aggregator.get_24_hour_states(f.establishment_id).await.unwrap();
        assert!(schedule.decision_for(0, id).unwrap().is_on);
    }

    #[tokio::test]
    async fn overcurrent_stops_only_the_current_hour() {
        let f = fixture(
            FakeForecast::new(series()),
            vec![silo(1, OperatingMode::Auto), silo(2, OperatingMode::Off)],
        );
        f.db.set_max_operating_current(f.establishment_id, Some(40.0))
            .unwrap();

        // At the limit is still allowed
        f.db.record_current(f.establishment_id, 40.0, now() - Duration::minutes(5))
            .unwrap();
        let schedule = f.aggregator.get_24_hour_states(f.establishment_id).await.unwrap();
        assert!(schedule.states[0].states[0].decision.is_on);

        f.db.record_current(f.establishment_id, 46.5, now() - Duration::minutes(1))
            .unwrap();
        let schedule = f.aggregator.get_24_hour_states(f.establishment_id).await.unwrap();
        let current = &schedule.states[0].states;
        assert_eq!(
            current[0].decision,
            Decision::off(OffReason::MaxCurrentExceeded)
        );
        assert_eq!(current[1].decision, Decision::off(OffReason::ManualOff));
        for row in &schedule.states[1..] {
            assert!(row.states[0].decision.is_on);
        }
    }

    #[tokio::test]
    async fn overcurrent_needs_a_limit_and_a_fresh_reading() {
        let f = fixture(FakeForecast::new(series()), vec![silo(1, OperatingMode::Auto)]);

        f.db.record_current(f.establishment_id, 90.0, now() - Duration::minutes(1))
            .unwrap();
        let schedule = f.aggregator.get_24_hour_states(f.establishment_id).await.unwrap();
        assert!(schedule.states[0].states[0].decision.is_on);

        f.db.set_max_operating_current(f.establishment_id, Some(40.0))
            .unwrap();
        f.db.with_conn(|conn| {
            conn.execute("DELETE FROM current_readings", [])?;
            Ok(())
        })
        .unwrap();
        f.db.record_current(f.establishment_id, 90.0, now() - Duration::hours(2))
            .unwrap();
        let schedule = f.aggregator.get_24_hour_states(f.establishment_id).await.unwrap();
        assert!(schedule.states[0].states[0].decision.is_on);
    }

    #[tokio::test]
    async fn global_switch_holds_every_fan_off() {
        let mut samples = series();
        samples[5].precipitation_amount = 2.0;
        let f = fixture(
            FakeForecast::new(samples),
            vec![silo(1, OperatingMode::On), silo(2, OperatingMode::Auto)],
        );
        f.db.set_global_aerator_enabled(false).unwrap();

        let poll = f.aggregator.poll(f.establishment_id).await.unwrap();
        for (index, row) in poll.schedule.states.iter().enumerate() {
            for state in &row.states {
                assert!(!state.decision.is_on);
                if (4..=6).contains(&index) {
                    assert_eq!(state.decision.forced_off_reason, vec![OffReason::Rain]);
                } else {
                    assert_eq!(
                        state.decision,
                        Decision::off(OffReason::GlobalAeratorControlDisabled)
                    );
                }
            }
        }

        f.db.set_global_aerator_enabled(true).unwrap();
        let view = f.aggregator.dashboard(f.establishment_id).await.unwrap();
        assert!(view.schedule.states[0].states.iter().all(|s| s.decision.is_on));
    }
}
