use crate::db::Database;
use crate::error::Result;

const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS establishments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS silos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        establishment_id INTEGER NOT NULL REFERENCES establishments(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        aerator_position INTEGER NOT NULL,
        min_temperature REAL NOT NULL,
        max_temperature REAL NOT NULL,
        min_humidity REAL NOT NULL,
        max_humidity REAL NOT NULL,
        air_start_hour INTEGER NOT NULL DEFAULT 22,
        air_end_hour INTEGER NOT NULL DEFAULT 6,
        use_sun_schedule INTEGER NOT NULL DEFAULT 0,
        peak_hours_shutdown INTEGER NOT NULL DEFAULT 0,
        mode TEXT NOT NULL DEFAULT 'auto',
        modified INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(establishment_id, aerator_position)
    );

    CREATE TABLE IF NOT EXISTS intelligent_aeration_configs (
        silo_id INTEGER PRIMARY KEY REFERENCES silos(id) ON DELETE CASCADE,
        grain_type TEXT NOT NULL DEFAULT 'maiz',
        target_grain_moisture REAL NOT NULL DEFAULT 14.0,
        target_temp REAL,
        achieve_temperature INTEGER NOT NULL DEFAULT 0,
        achieve_humidity INTEGER NOT NULL DEFAULT 0,
        operation_type TEXT NOT NULL DEFAULT 'dry',
        anti_condensation INTEGER NOT NULL DEFAULT 1,
        delta_temp_min REAL NOT NULL DEFAULT 5.0,
        delta_temp_hyst REAL NOT NULL DEFAULT 2.0,
        delta_emc_min REAL NOT NULL DEFAULT 1.0,
        active INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS temperature_readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        silo_id INTEGER NOT NULL REFERENCES silos(id) ON DELETE CASCADE,
        temperature REAL NOT NULL,
        recorded_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    // Migration 2: Add indexes
    r#"
    CREATE INDEX IF NOT EXISTS idx_silos_establishment_id
        ON silos(establishment_id);
    CREATE INDEX IF NOT EXISTS idx_temperature_readings_silo_time
        ON temperature_readings(silo_id, recorded_at);
    "#,
    // Migration 3: Aerator protection
    r#"
    ALTER TABLE establishments ADD COLUMN max_operating_current REAL;

    CREATE TABLE IF NOT EXISTS current_readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        establishment_id INTEGER NOT NULL REFERENCES establishments(id) ON DELETE CASCADE,
        current REAL NOT NULL,
        recorded_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_current_readings_establishment_time
        ON current_readings(establishment_id, recorded_at);

    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    "#,
];

pub fn run(db: &Database) -> Result<()> {
    db.with_conn_mut(|conn| {
        // Ensure schema_migrations table exists
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT MAX(version) FROM schema_migrations",
                [],
                |row| row.get::<_, Option<i32>>(0),
            )?
            .unwrap_or(0);

        // Apply pending migrations
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                tracing::info!(version, "Applying migration");
                let tx = conn.transaction()?;
                tx.execute_batch(migration)?;
                tx.execute(
                    "INSERT INTO schema_migrations (version) VALUES (?1)",
                    [version],
                )?;
                tx.commit()?;
            }
        }

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        run(&db).unwrap();

        let applied: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }
}
