mod config;
mod database;
mod models;
mod tracker;
mod ui;


use anyhow::Result;
use clap::{Arg, Command};
use dotenvy::dotenv;
use std::fs::OpenOptions;
use std::sync::Arc;

use crate::config::settings::Settings;
use crate::database::connection::Database;
use crate::ui::app::App;
use crate::ui::commands;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Sleep Tracker")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Track your sleep and rate how well you slept")
        .arg(
            Arg::new("database-url")
                .long("database-url")
                .value_name("URL")
                .help("SQLite database to use instead of DATABASE_URL"),
        )
        .arg(
            Arg::new("export")
                .long("export")
                .help("Print all nights as JSON and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    dotenv().ok();
    let settings = Settings::new()?.with_database_url(matches.get_one::<String>("database-url"));

    if settings.debug_logs_enabled {
        // The terminal belongs to the UI, so logs go to a file
        let log_file = OpenOptions::new().create(true).append(true).open("app.log")?;

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("sleep_tracker=debug"))
            .target(env_logger::Target::Pipe(Box::new(log_file)))
            .init();

        log::info!("=== DEBUG LOGGING ENABLED ===");
        log::info!("Writing logs to app.log");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();
    }

    log::info!("Starting Sleep Tracker");
    log::info!("Database URL: {}", settings.database_url);
    let database = match Database::new(&settings.database_url).await {
        Ok(db) => {
            log::info!("Database ready");
            db
        }
        Err(e) => {
            log::error!("Database connection failed: {:?}", e);
            eprintln!("❌ Failed to open the sleep database. Please check:");
            eprintln!("  - DATABASE_URL in .env (or --database-url) is a valid sqlite:// URL");
            eprintln!("  - The directory for the database file exists and is writable");
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    if matches.get_flag("export") {
        println!("{}", commands::export_json(&database).await?);
        return Ok(());
    }

    let mut app = App::new(Arc::new(database));
    app.run().await?;

    Ok(())
}
