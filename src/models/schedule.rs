use super::decision::Decision;
use super::weather::WeatherHour;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Establishment {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Aerator current (A) above which the current hour is forced off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_operating_current: Option<f64>,
}

/// One silo's decision within an hourly row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiloState {
    pub silo_id: i64,
    pub position: u32,
    #[serde(flatten)]
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyState {
    pub hour: String,
    pub states: Vec<SiloState>,
}

/// 24-row schedule for one establishment. Row 0 is the current hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub establishment_id: i64,
    pub current_time: String,
    pub states: Vec<HourlyState>,
}

impl Schedule {
    pub fn current(&self) -> Option<&HourlyState> {
        self.states.first()
    }

    /// Decision for a silo at a row, if both exist.
    #[cfg(test)]
    pub fn decision_for(&self, row: usize, silo_id: i64) -> Option<&Decision> {
        self.states
            .get(row)?
            .states
            .iter()
            .find(|s| s.silo_id == silo_id)
            .map(|s| &s.decision)
    }
}

/// What an edge device receives on each poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePoll {
    pub modified: bool,
    pub schedule: Schedule,
}

/// What the operator dashboard shows: the schedule and the raw forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub establishment: Establishment,
    pub schedule: Schedule,
    pub forecast: Vec<WeatherHour>,
}
