use serde::{Deserialize, Serialize};

/// Why a fan is held off for an hour. Variants are declared in the order
/// they are reported when several gates fail at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffReason {
    ForecastUnavailable,
    ManualOff,
    Rain,
    Fog,
    HeavyClouds,
    PeakHours,
    OutsideSchedule,
    OutsideSolarSchedule,
    TemperatureLow,
    TemperatureHigh,
    HumidityLow,
    HumidityHigh,
    NoActiveConfiguration,
    NoRecentSensorReadings,
    CondensationRisk,
    IntelligentConditionsNotMet,
    MaxCurrentExceeded,
    GlobalAeratorControlDisabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub is_on: bool,
    /// Every failing gate, in reporting order. Empty when the fan runs.
    pub forced_off_reason: Vec<OffReason>,
}

impl Decision {
    pub fn on() -> Self {
        Self {
            is_on: true,
            forced_off_reason: Vec::new(),
        }
    }

    pub fn off(reason: OffReason) -> Self {
        Self {
            is_on: false,
            forced_off_reason: vec![reason],
        }
    }

    pub fn off_with(reasons: Vec<OffReason>) -> Self {
        Self {
            is_on: false,
            forced_off_reason: reasons,
        }
    }

    pub fn has_reason(&self, reason: OffReason) -> bool {
        self.forced_off_reason.contains(&reason)
    }

    /// Stops a running fan for `reason`. A fan that is already off keeps its
    /// own reasons. Returns whether the decision changed.
    pub fn force_off(&mut self, reason: OffReason) -> bool {
        if !self.is_on {
            return false;
        }
        *self = Self::off(reason);
        true
    }
}
