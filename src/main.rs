mod cache;
mod cli;
mod config;
mod datasources;
mod db;
mod error;
mod import;
mod logic;
mod models;
mod report;

use anyhow::{Context, Result};
use cache::{Clock, SystemClock};
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands, SwitchAction};
use config::Config;
use datasources::{MetNorwayClient, SunriseSunsetClient};
use db::Database;
use logic::{ScheduleAggregator, WeatherProvider};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        config.database.path = Some(dir.join("aerops.db"));
    }

    let db_path = config.db_path().context("Failed to resolve database path")?;
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    tracing::debug!(path = %db.path().display(), "Database ready");

    match cli.command {
        Commands::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let summary = import::import_yaml(&db, &config.limits, &content)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            for (id, name) in &summary.establishments {
                println!("Establishment {}: {}", id, name);
            }
            println!("Imported {} silo(s)", summary.silos);
        }
        Commands::Reading {
            silo_id,
            temperature,
        } => {
            let silo = db
                .get_silo(silo_id)?
                .with_context(|| format!("Silo {} not found", silo_id))?;
            db.record_temperature(silo_id, temperature, Utc::now())?;
            println!("Recorded {:.1}°C for {}", temperature, silo.name);
        }
        Commands::Profile { silo_id, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let profile = import::import_profile(&db, silo_id, &content)
                .with_context(|| format!("Failed to store profile for silo {}", silo_id))?;
            println!(
                "Stored {} profile for silo {} (active: {})",
                profile.grain_type, silo_id, profile.active
            );
        }
        Commands::Aerators { action } => {
            match action {
                SwitchAction::Enable => db.set_global_aerator_enabled(true)?,
                SwitchAction::Disable => db.set_global_aerator_enabled(false)?,
                SwitchAction::Status => {}
            }
            let enabled = db.global_aerator_enabled()?;
            println!(
                "Aerators globally {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        Commands::Current {
            establishment_id,
            amps,
        } => {
            db.record_current(establishment_id, amps, Utc::now())
                .with_context(|| format!("Failed to record current for {}", establishment_id))?;
            println!("Recorded {:.1} A for establishment {}", amps, establishment_id);
        }
        Commands::CurrentLimit {
            establishment_id,
            amps,
        } => {
            db.set_max_operating_current(establishment_id, amps)
                .with_context(|| format!("Failed to set current limit for {}", establishment_id))?;
            match amps {
                Some(limit) => println!("Current limit for {} set to {:.1} A", establishment_id, limit),
                None => println!("Current limit for {} removed", establishment_id),
            }
        }
        Commands::Schedule {
            establishment_id,
            json,
        } => {
            let aggregator = build_aggregator(&config, db)?;
            let view = aggregator
                .dashboard(establishment_id)
                .await
                .with_context(|| format!("Failed to build schedule for {}", establishment_id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", report::forecast_table(&view));
                println!();
                print!("{}", report::schedule_table(&view.schedule));
            }
        }
        Commands::Poll { establishment_id } => {
            let aggregator = build_aggregator(&config, db)?;
            let poll = aggregator
                .poll(establishment_id)
                .await
                .with_context(|| format!("Failed to poll establishment {}", establishment_id))?;
            println!("{}", report::device_json(&poll)?);
        }
        Commands::MarkModified { establishment_id } => {
            let aggregator = build_aggregator(&config, db)?;
            let count = aggregator.mark_modified(establishment_id).await?;
            println!("Marked {} silo(s) as modified", count);
        }
        Commands::Check { establishment_id } => {
            let aggregator = build_aggregator(&config, db)?;
            let modified = aggregator.check_modified(establishment_id)?;
            println!("modified: {}", modified);
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so JSON on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_aggregator(config: &Config, db: Database) -> Result<ScheduleAggregator> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let forecast = Arc::new(
        MetNorwayClient::new(&config.weather).context("Failed to build forecast client")?,
    );
    let sun = Arc::new(
        SunriseSunsetClient::new(&config.weather).context("Failed to build sun times client")?,
    );
    let weather = WeatherProvider::new(&config.weather, forecast, sun, clock.clone())?;

    Ok(ScheduleAggregator::new(
        db,
        Arc::new(weather),
        clock,
        &config.sensors,
    ))
}
