use super::equilibrium;
use crate::models::{
    Decision, IntelligentConfig, OffReason, OperationType, SensorWindow, SiloConfig, WeatherHour,
};
use tracing::debug;

/// Margin (°C) kept between outside dew point and the coldest grain reading.
pub const CONDENSATION_MARGIN: f64 = 2.0;

/// Dead band (RH points) around the equilibrium humidity.
pub const HUMIDITY_HYSTERESIS: f64 = 2.0;

/// Autonomous mode. Rules are checked in priority order and the first
/// match decides; the caller has already applied the rain gate.
pub fn evaluate(silo: &SiloConfig, hour: &WeatherHour, sensors: &SensorWindow) -> Decision {
    let Some(config) = silo.active_intelligent() else {
        return Decision::off(OffReason::NoActiveConfiguration);
    };

    let Some(stats) = sensors.stats() else {
        return Decision::off(OffReason::NoRecentSensorReadings);
    };

    if config.anti_condensation {
        let dew_point = equilibrium::dew_point(hour.temperature, hour.humidity);
        if dew_point >= stats.min - CONDENSATION_MARGIN {
            debug!(
                silo_id = silo.id,
                dew_point,
                min_internal = stats.min,
                "Condensation risk, holding fan off"
            );
            return Decision::off(OffReason::CondensationRisk);
        }
    }

    if temperature_control(config, hour, stats.max) {
        debug!(silo_id = silo.id, max_internal = stats.max, "Cooling with outside air");
        return Decision::on();
    }

    if humidity_control(config, hour, stats.avg) {
        debug!(silo_id = silo.id, avg_internal = stats.avg, "Humidity control active");
        return Decision::on();
    }

    Decision::off(OffReason::IntelligentConditionsNotMet)
}

/// Grain is warmer than target (beyond hysteresis) and the outside air is
/// cool enough to carry heat away.
fn temperature_control(config: &IntelligentConfig, hour: &WeatherHour, max_internal: f64) -> bool {
    if !config.achieve_temperature {
        return false;
    }
    let Some(target) = config.target_temp else {
        return false;
    };

    let needs_cooling = max_internal > target + config.delta_temp_hyst;
    let air_useful = hour.temperature < max_internal - config.delta_temp_min;
    needs_cooling && air_useful
}

fn humidity_control(config: &IntelligentConfig, hour: &WeatherHour, avg_internal: f64) -> bool {
    if !config.achieve_humidity {
        return false;
    }

    let Some(erh) = equilibrium::equilibrium_humidity(
        config.grain_type,
        config.target_grain_moisture,
        avg_internal,
    ) else {
        debug!(
            grain = %config.grain_type,
            target = config.target_grain_moisture,
            avg_internal,
            "Equilibrium humidity outside table range"
        );
        return false;
    };

    match config.operation_type {
        OperationType::Humidify => hour.humidity > erh + HUMIDITY_HYSTERESIS,
        OperationType::Dry => hour.humidity < erh - HUMIDITY_HYSTERESIS,
    }
}
