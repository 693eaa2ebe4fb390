use super::gates::SafetyGates;
use super::intelligent;
use crate::models::{
    Decision, OffReason, OperatingMode, RainWindow, SensorWindow, SiloConfig, SunHours,
    WeatherHour,
};
use tracing::trace;

/// Inputs shared by every silo for one forecast hour, plus the silo's own
/// sensor history.
#[derive(Debug, Clone, Copy)]
pub struct HourContext<'a> {
    /// Position of this hour in the forecast series
    pub index: usize,
    pub weather: &'a WeatherHour,
    pub rain_window: &'a RainWindow,
    pub sun_hours: Option<SunHours>,
    pub sensors: &'a SensorWindow,
}

/// Decides whether a silo's fan runs during one forecast hour.
///
/// Decisions are pure functions of the silo configuration and the hour
/// context; the engine holds no state between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate_hour(&self, silo: &SiloConfig, ctx: &HourContext<'_>) -> Decision {
        let rainy = ctx.rain_window.contains(ctx.index);

        match silo.mode {
            OperatingMode::Off => Decision::off(OffReason::ManualOff),
            OperatingMode::On => {
                if rainy {
                    Decision::off(OffReason::Rain)
                } else {
                    Decision::on()
                }
            }
            OperatingMode::Intelligent => {
                if rainy {
                    return Decision::off(OffReason::Rain);
                }
                intelligent::evaluate(silo, ctx.weather, ctx.sensors)
            }
            OperatingMode::Auto => {
                let gates = SafetyGates::evaluate(silo, ctx.weather, rainy, ctx.sun_hours);
                trace!(
                    silo_id = silo.id,
                    hour = ctx.index,
                    no_rain = gates.no_rain,
                    no_fog = gates.no_fog(),
                    peak_hours_ok = gates.peak_hours_ok,
                    air_time_ok = gates.air_time_ok,
                    "Safety gates"
                );
                let mut reasons = gates.failures();
                reasons.extend(threshold_failures(silo, ctx.weather));

                if reasons.is_empty() {
                    Decision::on()
                } else {
                    Decision::off_with(reasons)
                }
            }
        }
    }
}

/// Forecast temperature and humidity against the silo's inclusive bounds.
fn threshold_failures(silo: &SiloConfig, hour: &WeatherHour) -> Vec<OffReason> {
    let mut reasons = Vec::new();
    if hour.temperature < silo.min_temperature {
        reasons.push(OffReason::TemperatureLow);
    }
    if hour.temperature > silo.max_temperature {
        reasons.push(OffReason::TemperatureHigh);
    }
    if hour.humidity < silo.min_humidity {
        reasons.push(OffReason::HumidityLow);
    }
    if hour.humidity > silo.max_humidity {
        reasons.push(OffReason::HumidityHigh);
    }
    reasons
}
