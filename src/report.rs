//! Operator-facing rendering of schedules. Reason tags are localized here
//! and nowhere else.

use crate::error::Result;
use crate::models::{DashboardView, Decision, DevicePoll, OffReason, Schedule};
use serde::Serialize;
use std::fmt::Write;

pub fn label(reason: OffReason) -> &'static str {
    match reason {
        OffReason::ForecastUnavailable => "Sin pronóstico",
        OffReason::ManualOff => "Modo manual OFF",
        OffReason::Rain => "Lluvia",
        OffReason::Fog => "Niebla",
        OffReason::HeavyClouds => "Nubes densas",
        OffReason::PeakHours => "Horas pico",
        OffReason::OutsideSchedule => "Fuera de horario",
        OffReason::OutsideSolarSchedule => "Fuera de horario solar",
        OffReason::TemperatureLow => "Temperatura baja",
        OffReason::TemperatureHigh => "Temperatura alta",
        OffReason::HumidityLow => "Humedad baja",
        OffReason::HumidityHigh => "Humedad alta",
        OffReason::NoActiveConfiguration => "Configuración inteligente no activa",
        OffReason::NoRecentSensorReadings => "Sin lecturas de sensores recientes",
        OffReason::CondensationRisk => "Riesgo de condensación",
        OffReason::IntelligentConditionsNotMet => "Condiciones inteligentes no alcanzadas",
        OffReason::MaxCurrentExceeded => "Corriente máxima excedida",
        OffReason::GlobalAeratorControlDisabled => "Aireadores desactivados globalmente",
    }
}

/// Comma-joined labels, empty when the fan runs.
pub fn reason_text(decision: &Decision) -> String {
    decision
        .forced_off_reason
        .iter()
        .map(|r| label(*r))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Serialize)]
struct DeviceSiloState {
    silo_id: i64,
    position: u32,
    is_on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    forced_off_reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeviceHour {
    hour: String,
    states: Vec<DeviceSiloState>,
}

#[derive(Debug, Serialize)]
struct DevicePayload {
    modified: bool,
    current_time: String,
    states: Vec<DeviceHour>,
}

/// JSON body sent to edge controllers.
pub fn device_json(poll: &DevicePoll) -> Result<String> {
    let payload = DevicePayload {
        modified: poll.modified,
        current_time: poll.schedule.current_time.clone(),
        states: poll
            .schedule
            .states
            .iter()
            .map(|row| DeviceHour {
                hour: row.hour.clone(),
                states: row
                    .states
                    .iter()
                    .map(|s| {
                        let text = reason_text(&s.decision);
                        DeviceSiloState {
                            silo_id: s.silo_id,
                            position: s.position,
                            is_on: s.decision.is_on,
                            forced_off_reason: (!text.is_empty()).then_some(text),
                        }
                    })
                    .collect(),
            })
            .collect(),
    };
    Ok(serde_json::to_string(&payload)?)
}

/// Plain-text table: one line per hour, one column per aerator position.
pub fn schedule_table(schedule: &Schedule) -> String {
    let mut out = String::new();
    let Some(first) = schedule.states.first() else {
        let _ = writeln!(out, "No silos configured");
        return out;
    };

    let _ = write!(out, "{:<17}", "Hour");
    for state in &first.states {
        let _ = write!(out, " {:>4}", format!("A{}", state.position));
    }
    let _ = writeln!(out);

    for row in &schedule.states {
        let _ = write!(out, "{:<17}", row.hour);
        for state in &row.states {
            let mark = if state.decision.is_on { "ON" } else { "--" };
            let _ = write!(out, " {:>4}", mark);
        }
        let _ = writeln!(out);
    }

    if let Some(current) = schedule.current() {
        let _ = writeln!(out);
        if current
            .states
            .iter()
            .any(|s| s.decision.has_reason(OffReason::ForecastUnavailable))
        {
            let _ = writeln!(out, "Forecast unavailable - all fans held off");
        }
        let _ = writeln!(out, "Now ({}):", schedule.current_time);
        for state in &current.states {
            if state.decision.is_on {
                let _ = writeln!(out, "  A{}: ON", state.position);
            } else {
                let _ = writeln!(
                    out,
                    "  A{}: OFF ({})",
                    state.position,
                    reason_text(&state.decision)
                );
            }
        }
    }
    out
}

pub fn forecast_table(view: &DashboardView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({:.4}, {:.4})",
        view.establishment.name, view.establishment.latitude, view.establishment.longitude
    );
    if view.forecast.is_empty() {
        let _ = writeln!(out, "Forecast unavailable - all fans held off");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<17} {:>6} {:>5} {:>6} {:>6} {:>5}  {}",
        "Hour", "Temp", "RH", "Rain", "Cloud", "Fog", "Sky"
    );
    for hour in &view.forecast {
        let _ = writeln!(
            out,
            "{:<17} {:>5.1}° {:>4.0}% {:>5.1}mm {:>5.0}% {:>5}  {}",
            hour.label(),
            hour.temperature,
            hour.humidity,
            hour.precipitation_amount,
            hour.cloud_cover,
            if hour.fog { "yes" } else { "no" },
            hour.symbol_code
        );
    }
    out
}
