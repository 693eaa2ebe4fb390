use crate::config::LimitsConfig;
use crate::db::Database;
use crate::error::{AerOpsError, Result};
use crate::models::{
    Establishment, GrainType, IntelligentConfig, OperatingMode, OperationType, ScheduleWindow,
    SensorWindow, SiloConfig,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use tracing::warn;

// Establishment Queries

impl Database {
    pub fn insert_establishment(&self, name: &str, latitude: f64, longitude: f64) -> Result<i64> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(AerOpsError::InvalidData(format!(
                "establishment '{}': coordinates ({}, {}) out of range",
                name, latitude, longitude
            )));
        }

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO establishments (name, latitude, longitude) VALUES (?1, ?2, ?3)",
                params![name, latitude, longitude],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_establishment(&self, id: i64) -> Result<Option<Establishment>> {
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT id, name, latitude, longitude, max_operating_current
                FROM establishments WHERE id = ?1
                "#,
                [id],
                |row| {
                    Ok(Establishment {
                        id: row.get("id")?,
                        name: row.get("name")?,
                        latitude: row.get("latitude")?,
                        longitude: row.get("longitude")?,
                        max_operating_current: row.get("max_operating_current")?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Sets or removes the aerator current limit of an establishment.
    pub fn set_max_operating_current(&self, establishment_id: i64, limit: Option<f64>) -> Result<()> {
        if let Some(amps) = limit {
            if !amps.is_finite() || amps <= 0.0 {
                return Err(AerOpsError::InvalidData(format!(
                    "establishment {}: max operating current must be positive, got {}",
                    establishment_id, amps
                )));
            }
        }

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE establishments SET max_operating_current = ?2 WHERE id = ?1",
                params![establishment_id, limit],
            )?;
            if updated == 0 {
                return Err(AerOpsError::NotFound(format!(
                    "establishment {}",
                    establishment_id
                )));
            }
            Ok(())
        })
    }
}

// Silo Queries

const SILO_COLUMNS: &str = r#"
    s.id, s.name, s.establishment_id, s.aerator_position,
    s.min_temperature, s.max_temperature, s.min_humidity, s.max_humidity,
    s.air_start_hour, s.air_end_hour, s.use_sun_schedule, s.peak_hours_shutdown,
    s.mode, s.modified,
    i.silo_id AS ic_silo_id, i.grain_type, i.target_grain_moisture, i.target_temp,
    i.achieve_temperature, i.achieve_humidity, i.operation_type, i.anti_condensation,
    i.delta_temp_min, i.delta_temp_hyst, i.delta_emc_min, i.active
"#;

impl Database {
    /// Validates and stores a new silo, plus its intelligent profile if any.
    /// New silos start with the modified flag set so devices pick them up.
    pub fn insert_silo(&self, silo: &SiloConfig, limits: &LimitsConfig) -> Result<i64> {
        silo.validate(limits)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                r#"
                INSERT INTO silos
                    (establishment_id, name, aerator_position,
                     min_temperature, max_temperature, min_humidity, max_humidity,
                     air_start_hour, air_end_hour, use_sun_schedule, peak_hours_shutdown,
                     mode, modified)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1)
                "#,
                params![
                    silo.establishment_id,
                    silo.name,
                    silo.aerator_position,
                    silo.min_temperature,
                    silo.max_temperature,
                    silo.min_humidity,
                    silo.max_humidity,
                    silo.schedule.air_start_hour,
                    silo.schedule.air_end_hour,
                    silo.schedule.use_sun_schedule,
                    silo.peak_hours_shutdown,
                    silo.mode.as_str(),
                ],
            )?;
            let id = tx.last_insert_rowid();

            if let Some(ref config) = silo.intelligent {
                write_intelligent_config(&tx, id, config)?;
            }

            tx.commit()?;
            Ok(id)
        })
    }

    /// Silos of an establishment ordered by aerator position.
    pub fn list_silos(&self, establishment_id: i64) -> Result<Vec<SiloConfig>> {
        self.with_conn(|conn| {
            let sql = format!(
                r#"
                SELECT {}
                FROM silos s
                LEFT JOIN intelligent_aeration_configs i ON i.silo_id = s.id
                WHERE s.establishment_id = ?1
                ORDER BY s.aerator_position
                "#,
                SILO_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let silos = stmt
                .query_map([establishment_id], row_to_silo)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(silos)
        })
    }

    pub fn get_silo(&self, silo_id: i64) -> Result<Option<SiloConfig>> {
        self.with_conn(|conn| {
            let sql = format!(
                r#"
                SELECT {}
                FROM silos s
                LEFT JOIN intelligent_aeration_configs i ON i.silo_id = s.id
                WHERE s.id = ?1
                "#,
                SILO_COLUMNS
            );
            conn.query_row(&sql, [silo_id], row_to_silo)
                .optional()
                .map_err(Into::into)
        })
    }

    /// Creates or replaces a silo's intelligent profile and flags the silo
    /// as modified.
    pub fn upsert_intelligent_config(&self, silo_id: i64, config: &IntelligentConfig) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE silos SET modified = 1, updated_at = datetime('now') WHERE id = ?1",
                [silo_id],
            )?;
            if updated == 0 {
                return Err(AerOpsError::NotFound(format!("silo {}", silo_id)));
            }
            write_intelligent_config(&tx, silo_id, config)?;
            tx.commit()?;
            Ok(())
        })
    }
}

fn write_intelligent_config(conn: &Connection, silo_id: i64, config: &IntelligentConfig) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO intelligent_aeration_configs
            (silo_id, grain_type, target_grain_moisture, target_temp,
             achieve_temperature, achieve_humidity, operation_type, anti_condensation,
             delta_temp_min, delta_temp_hyst, delta_emc_min, active, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, datetime('now'))
        ON CONFLICT(silo_id) DO UPDATE SET
            grain_type = excluded.grain_type,
            target_grain_moisture = excluded.target_grain_moisture,
            target_temp = excluded.target_temp,
            achieve_temperature = excluded.achieve_temperature,
            achieve_humidity = excluded.achieve_humidity,
            operation_type = excluded.operation_type,
            anti_condensation = excluded.anti_condensation,
            delta_temp_min = excluded.delta_temp_min,
            delta_temp_hyst = excluded.delta_temp_hyst,
            delta_emc_min = excluded.delta_emc_min,
            active = excluded.active,
            updated_at = excluded.updated_at
        "#,
        params![
            silo_id,
            config.grain_type.as_str(),
            config.target_grain_moisture,
            config.target_temp,
            config.achieve_temperature,
            config.achieve_humidity,
            config.operation_type.as_str(),
            config.anti_condensation,
            config.delta_temp_min,
            config.delta_temp_hyst,
            config.delta_emc_min,
            config.active,
        ],
    )?;
    Ok(())
}

fn row_to_silo(row: &Row) -> rusqlite::Result<SiloConfig> {
    let id: i64 = row.get("id")?;
    let mode_str: String = row.get("mode")?;

    let mode = OperatingMode::from_str(&mode_str).unwrap_or_else(|| {
        // Off is the only mode that cannot run a fan by mistake
        warn!(silo_id = id, mode = %mode_str, "Unknown mode in database, defaulting to off");
        OperatingMode::Off
    });

    let ic_silo_id: Option<i64> = row.get("ic_silo_id")?;
    let intelligent = match ic_silo_id {
        Some(_) => Some(row_to_intelligent_config(id, row)?),
        None => None,
    };

    Ok(SiloConfig {
        id,
        name: row.get("name")?,
        establishment_id: row.get("establishment_id")?,
        aerator_position: row.get("aerator_position")?,
        min_temperature: row.get("min_temperature")?,
        max_temperature: row.get("max_temperature")?,
        min_humidity: row.get("min_humidity")?,
        max_humidity: row.get("max_humidity")?,
        schedule: ScheduleWindow {
            air_start_hour: row.get("air_start_hour")?,
            air_end_hour: row.get("air_end_hour")?,
            use_sun_schedule: row.get("use_sun_schedule")?,
        },
        peak_hours_shutdown: row.get("peak_hours_shutdown")?,
        mode,
        modified: row.get("modified")?,
        intelligent,
    })
}

fn row_to_intelligent_config(silo_id: i64, row: &Row) -> rusqlite::Result<IntelligentConfig> {
    let grain_str: String = row.get("grain_type")?;
    let operation_str: String = row.get("operation_type")?;

    let grain_type = GrainType::from_str(&grain_str).unwrap_or_else(|| {
        warn!(silo_id, grain_type = %grain_str, "Unknown grain_type in database, defaulting to maiz");
        GrainType::Corn
    });
    let operation_type = OperationType::from_str(&operation_str).unwrap_or_else(|| {
        warn!(silo_id, operation_type = %operation_str, "Unknown operation_type in database, defaulting to dry");
        OperationType::Dry
    });

    Ok(IntelligentConfig {
        grain_type,
        target_grain_moisture: row.get("target_grain_moisture")?,
        target_temp: row.get("target_temp")?,
        achieve_temperature: row.get("achieve_temperature")?,
        achieve_humidity: row.get("achieve_humidity")?,
        operation_type,
        anti_condensation: row.get("anti_condensation")?,
        delta_temp_min: row.get("delta_temp_min")?,
        delta_temp_hyst: row.get("delta_temp_hyst")?,
        delta_emc_min: row.get("delta_emc_min")?,
        active: row.get("active")?,
    })
}

// Modified Flag Queries

impl Database {
    pub fn check_modified(&self, establishment_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let modified: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM silos WHERE establishment_id = ?1 AND modified = 1)",
                [establishment_id],
                |row| row.get(0),
            )?;
            Ok(modified)
        })
    }

    /// Flags every silo of the establishment. Returns the number of silos.
    pub fn mark_modified(&self, establishment_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let count = conn.execute(
                "UPDATE silos SET modified = 1, updated_at = datetime('now') WHERE establishment_id = ?1",
                [establishment_id],
            )?;
            Ok(count)
        })
    }

    pub fn clear_modified(&self, establishment_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let count = conn.execute(
                "UPDATE silos SET modified = 0 WHERE establishment_id = ?1 AND modified = 1",
                [establishment_id],
            )?;
            Ok(count)
        })
    }
}

// Sensor Reading Queries

impl Database {
    pub fn record_temperature(
        &self,
        silo_id: i64,
        temperature: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM silos WHERE id = ?1)",
                [silo_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(AerOpsError::NotFound(format!("silo {}", silo_id)));
            }

            conn.execute(
                "INSERT INTO temperature_readings (silo_id, temperature, recorded_at) VALUES (?1, ?2, ?3)",
                params![silo_id, temperature, timestamp(recorded_at)],
            )?;
            Ok(())
        })
    }

    /// Internal temperature samples recorded at or after `since`.
    pub fn sensor_window(&self, silo_id: i64, since: DateTime<Utc>) -> Result<SensorWindow> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT temperature FROM temperature_readings
                WHERE silo_id = ?1 AND recorded_at >= ?2
                ORDER BY recorded_at
                "#,
            )?;
            let samples = stmt
                .query_map(params![silo_id, timestamp(since)], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<f64>>>()?;
            Ok(SensorWindow::new(samples))
        })
    }
}

// Aerator Protection Queries

const GLOBAL_AERATORS_KEY: &str = "global_aerator_enabled";

impl Database {
    pub fn record_current(
        &self,
        establishment_id: i64,
        current: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        if !current.is_finite() || current < 0.0 {
            return Err(AerOpsError::InvalidData(format!(
                "establishment {}: invalid current reading {}",
                establishment_id, current
            )));
        }

        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM establishments WHERE id = ?1)",
                [establishment_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(AerOpsError::NotFound(format!(
                    "establishment {}",
                    establishment_id
                )));
            }

            conn.execute(
                "INSERT INTO current_readings (establishment_id, current, recorded_at) VALUES (?1, ?2, ?3)",
                params![establishment_id, current, timestamp(recorded_at)],
            )?;
            Ok(())
        })
    }

    /// Most recent aerator current recorded at or after `since`.
    pub fn latest_current(&self, establishment_id: i64, since: DateTime<Utc>) -> Result<Option<f64>> {
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT current FROM current_readings
                WHERE establishment_id = ?1 AND recorded_at >= ?2
                ORDER BY recorded_at DESC, id DESC
                LIMIT 1
                "#,
                params![establishment_id, timestamp(since)],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Whether aerators may run at all. Enabled until switched off.
    pub fn global_aerator_enabled(&self) -> Result<bool> {
        let value: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [GLOBAL_AERATORS_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
        })?;

        Ok(match value.as_deref() {
            None | Some("true") => true,
            Some("false") => false,
            Some(other) => {
                warn!(value = %other, "Unknown global aerator setting, treating as disabled");
                false
            }
        })
    }

    pub fn set_global_aerator_enabled(&self, enabled: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO settings (key, value) VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
                params![GLOBAL_AERATORS_KEY, if enabled { "true" } else { "false" }],
            )?;
            Ok(())
        })
    }
}

/// Fixed-width UTC timestamps so text comparison matches time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
