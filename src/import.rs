//! Bulk loading of establishments and silos from a YAML document.
//!
//! ```yaml
//! establishments:
//!   - name: La Esperanza
//!     latitude: -34.6037
//!     longitude: -58.3816
//!     max_operating_current: 45
//!     silos:
//!       - name: Silo Norte
//!         aerator_position: 1
//!         min_temperature: 5
//!         max_temperature: 25
//!         min_humidity: 40
//!         max_humidity: 75
//!         air_start_hour: 22
//!         air_end_hour: 6
//!         mode: auto
//! ```

use crate::config::LimitsConfig;
use crate::db::Database;
use crate::error::{AerOpsError, Result};
use crate::models::{IntelligentConfig, SiloConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ImportDocument {
    pub establishments: Vec<EstablishmentEntry>,
}

#[derive(Debug, Deserialize)]
pub struct EstablishmentEntry {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Aerator current limit in amperes
    #[serde(default)]
    pub max_operating_current: Option<f64>,
    #[serde(default)]
    pub silos: Vec<SiloConfig>,
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    /// (id, name) of each created establishment
    pub establishments: Vec<(i64, String)>,
    pub silos: usize,
}

/// Parses and validates the whole document before writing anything.
pub fn import_yaml(db: &Database, limits: &LimitsConfig, content: &str) -> Result<ImportSummary> {
    let mut document: ImportDocument = serde_yaml::from_str(content)?;

    for establishment in &mut document.establishments {
        if let Some(limit) = establishment.max_operating_current {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(AerOpsError::InvalidData(format!(
                    "establishment '{}': max_operating_current must be positive",
                    establishment.name
                )));
            }
        }
        for silo in &mut establishment.silos {
            if silo.name.trim().is_empty() {
                silo.name = format!("Silo {}", silo.aerator_position);
            }
            silo.validate(limits)?;
        }
    }

    let mut summary = ImportSummary::default();
    for entry in document.establishments {
        let id = db.insert_establishment(&entry.name, entry.latitude, entry.longitude)?;
        if entry.max_operating_current.is_some() {
            db.set_max_operating_current(id, entry.max_operating_current)?;
        }
        for mut silo in entry.silos {
            silo.establishment_id = id;
            db.insert_silo(&silo, limits)?;
            summary.silos += 1;
        }
        tracing::info!(establishment_id = id, name = %entry.name, "Imported establishment");
        summary.establishments.push((id, entry.name));
    }

    Ok(summary)
}

/// Replaces one silo's intelligent profile from a YAML document. Omitted
/// fields take their defaults.
pub fn import_profile(db: &Database, silo_id: i64, content: &str) -> Result<IntelligentConfig> {
    let profile: IntelligentConfig = serde_yaml::from_str(content)?;
    if !(0.0..100.0).contains(&profile.target_grain_moisture) {
        return Err(AerOpsError::InvalidData(format!(
            "silo {}: target_grain_moisture {} outside 0-100",
            silo_id, profile.target_grain_moisture
        )));
    }

    db.upsert_intelligent_config(silo_id, &profile)?;
    tracing::info!(
        silo_id,
        grain_type = %profile.grain_type,
        active = profile.active,
        "Stored intelligent profile"
    );
    Ok(profile)
}
