use crate::models::{OffReason, SiloConfig, SunHours, WeatherHour};

/// Peak electricity demand window, [start, end) in local hours.
pub const PEAK_HOURS: (u32, u32) = (17, 23);

const FOG_HUMIDITY: f64 = 95.0;
const FOG_MAX_TEMPERATURE: f64 = 15.0;
const HEAVY_CLOUD_COVER: f64 = 90.0;
/// Above this cover a sun-relative window is treated as closed.
const SOLAR_CLOUD_COVER: f64 = 70.0;

/// Universal safety conditions for one silo at one forecast hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyGates {
    pub no_rain: bool,
    pub fog: bool,
    pub heavy_clouds: bool,
    pub peak_hours_ok: bool,
    pub air_time_ok: bool,
    pub sun_schedule: bool,
}

impl SafetyGates {
    pub fn evaluate(
        silo: &SiloConfig,
        hour: &WeatherHour,
        rainy: bool,
        sun_hours: Option<SunHours>,
    ) -> Self {
        let hour_of_day = hour.hour_of_day();

        let fog = hour.fog
            || (hour.humidity > FOG_HUMIDITY && hour.temperature < FOG_MAX_TEMPERATURE);
        let heavy_clouds = hour.cloud_cover > HEAVY_CLOUD_COVER;

        let peak_active = (PEAK_HOURS.0..PEAK_HOURS.1).contains(&hour_of_day);
        let peak_hours_ok = !(silo.peak_hours_shutdown && peak_active);

        let air_time_ok = if silo.schedule.use_sun_schedule {
            match sun_hours {
                // Sunrise and sunset in the same hour leaves no daylight window
                Some(sun) => {
                    sun.sunrise_hour != sun.sunset_hour
                        && in_window(hour_of_day, sun.sunrise_hour, sun.sunset_hour)
                        && hour.cloud_cover <= SOLAR_CLOUD_COVER
                }
                None => false,
            }
        } else {
            let (start, end) = (silo.schedule.air_start_hour, silo.schedule.air_end_hour);
            (start == 0 && end == 23) || in_window(hour_of_day, start, end)
        };

        Self {
            no_rain: !rainy,
            fog,
            heavy_clouds,
            peak_hours_ok,
            air_time_ok,
            sun_schedule: silo.schedule.use_sun_schedule,
        }
    }

    pub fn no_fog(&self) -> bool {
        !self.fog && !self.heavy_clouds
    }

    /// Failing weather and schedule gates in reporting order.
    pub fn failures(&self) -> Vec<OffReason> {
        let mut reasons = Vec::new();
        if !self.no_rain {
            reasons.push(OffReason::Rain);
        }
        if self.fog {
            reasons.push(OffReason::Fog);
        }
        if self.heavy_clouds {
            reasons.push(OffReason::HeavyClouds);
        }
        if !self.peak_hours_ok {
            reasons.push(OffReason::PeakHours);
        }
        if !self.air_time_ok {
            reasons.push(if self.sun_schedule {
                OffReason::OutsideSolarSchedule
            } else {
                OffReason::OutsideSchedule
            });
        }
        reasons
    }
}

/// Whether `hour` lies in [start, end), wrapping past midnight when start >= end.
pub fn in_window(hour: u32, start: u32, end: u32) -> bool {
    if start < end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn weather(h: u32) -> WeatherHour {
        WeatherHour {
            time: NaiveDate::from_ymd_opt(2025, 3, 10)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap(),
            temperature: 18.0,
            humidity: 55.0,
            precipitation_amount: 0.0,
            cloud_cover: 20.0,
            fog: false,
            wind_speed: 2.0,
            symbol_code: "clearsky_day".into(),
        }
    }

    fn silo_with_window(start: u32, end: u32) -> SiloConfig {
        let mut silo = SiloConfig::new(1, 1, 1);
        silo.schedule.air_start_hour = start;
        silo.schedule.air_end_hour = end;
        silo
    }

    #[test]
    fn wrapping_window_covers_night() {
        let silo = silo_with_window(22, 6);
        let eligible: Vec<u32> = (0..24)
            .filter(|h| SafetyGates::evaluate(&silo, &weather(*h), false, None).air_time_ok)
            .collect();
        assert_eq!(eligible, vec![0, 1, 2, 3, 4, 5, 22, 23]);
    }

    #[test]
    fn full_day_window_always_open() {
        let silo = silo_with_window(0, 23);
        assert!((0..24).all(|h| SafetyGates::evaluate(&silo, &weather(h), false, None).air_time_ok));
    }

    #[test]
    fn daytime_window_is_half_open() {
        let silo = silo_with_window(8, 17);
        assert!(!SafetyGates::evaluate(&silo, &weather(7), false, None).air_time_ok);
        assert!(SafetyGates::evaluate(&silo, &weather(8), false, None).air_time_ok);
        assert!(SafetyGates::evaluate(&silo, &weather(16), false, None).air_time_ok);
        assert!(!SafetyGates::evaluate(&silo, &weather(17), false, None).air_time_ok);
    }

    #[test]
    fn sun_schedule_fails_closed_without_sun_hours() {
        let mut silo = silo_with_window(0, 23);
        silo.schedule.use_sun_schedule = true;
        let gates = SafetyGates::evaluate(&silo, &weather(12), false, None);
        assert!(!gates.air_time_ok);
        assert_eq!(gates.failures(), vec![OffReason::OutsideSolarSchedule]);
    }

    #[test]
    fn sun_schedule_respects_daylight_and_clouds() {
        let mut silo = silo_with_window(0, 23);
        silo.schedule.use_sun_schedule = true;
        let sun = Some(SunHours {
            sunrise_hour: 7,
            sunset_hour: 19,
        });

        assert!(SafetyGates::evaluate(&silo, &weather(12), false, sun).air_time_ok);
        assert!(!SafetyGates::evaluate(&silo, &weather(19), false, sun).air_time_ok);
        assert!(!SafetyGates::evaluate(&silo, &weather(3), false, sun).air_time_ok);

        let mut cloudy = weather(12);
        cloudy.cloud_cover = 75.0;
        assert!(!SafetyGates::evaluate(&silo, &cloudy, false, sun).air_time_ok);
    }

    #[test]
    fn sun_schedule_closed_when_sunrise_equals_sunset() {
        let mut silo = silo_with_window(0, 23);
        silo.schedule.use_sun_schedule = true;
        let sun = Some(SunHours {
            sunrise_hour: 12,
            sunset_hour: 12,
        });

        for h in 0..24 {
            let gates = SafetyGates::evaluate(&silo, &weather(h), false, sun);
            assert!(!gates.air_time_ok, "hour {h} should be closed");
            assert_eq!(gates.failures(), vec![OffReason::OutsideSolarSchedule]);
        }
    }

    #[test]
    fn fog_from_flag_or_cold_saturated_air() {
        let silo = silo_with_window(0, 23);

        let mut hour = weather(4);
        hour.fog = true;
        assert!(!SafetyGates::evaluate(&silo, &hour, false, None).no_fog());

        let mut hour = weather(4);
        hour.humidity = 97.0;
        hour.temperature = 10.0;
        assert!(!SafetyGates::evaluate(&silo, &hour, false, None).no_fog());

        hour.temperature = 16.0;
        assert!(SafetyGates::evaluate(&silo, &hour, false, None).no_fog());
    }

    #[test]
    fn heavy_clouds_close_fog_gate() {
        let silo = silo_with_window(0, 23);
        let mut hour = weather(12);
        hour.cloud_cover = 90.0;
        assert!(SafetyGates::evaluate(&silo, &hour, false, None).no_fog());
        hour.cloud_cover = 91.0;
        let gates = SafetyGates::evaluate(&silo, &hour, false, None);
        assert!(!gates.no_fog());
        assert_eq!(gates.failures(), vec![OffReason::HeavyClouds]);
    }

    #[test]
    fn peak_hours_only_with_shutdown_enabled() {
        let mut silo = silo_with_window(0, 23);
        assert!(SafetyGates::evaluate(&silo, &weather(18), false, None).peak_hours_ok);

        silo.peak_hours_shutdown = true;
        assert!(SafetyGates::evaluate(&silo, &weather(16), false, None).peak_hours_ok);
        assert!(!SafetyGates::evaluate(&silo, &weather(17), false, None).peak_hours_ok);
        assert!(!SafetyGates::evaluate(&silo, &weather(22), false, None).peak_hours_ok);
        assert!(SafetyGates::evaluate(&silo, &weather(23), false, None).peak_hours_ok);
    }
}
