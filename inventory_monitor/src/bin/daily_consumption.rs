//! Daily consumption job
//!
//! Sums the decreases in the day's inventory snapshots per loadcell and
//! upserts one row keyed by date. Meant to run once a day (cron / timer).

use chrono::NaiveDate;
use clap::Parser;
use inventory_monitor::config::StationArgs;
use inventory_monitor::{aggregate_day, AggregateOutcome};

/// Computes a day's consumption from inventory snapshots and uploads it
#[derive(Parser, Debug)]
#[command(name = "daily_consumption")]
#[command(version, about, long_about = None)]
struct Args {
    /// Day to aggregate as YYYY-MM-DD (default: today in the station time zone)
    #[arg(long)]
    date: Option<NaiveDate>,

    #[command(flatten)]
    station: StationArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> inventory_monitor::Result<()> {
    let sensors = args.station.sensor_table()?;
    let tables = args.station.tables()?;
    let store = args.station.open_store(&tables, &sensors)?;
    let day = args.date.unwrap_or_else(|| args.station.clock().today());

    match aggregate_day(store.as_ref(), &tables, &sensors, day).await? {
        AggregateOutcome::Uploaded(row) => {
            log::info!(
                "Consumption for {} uploaded to '{}': {:?}",
                row.date,
                tables.consumption,
                row.consumption
            );
        }
        AggregateOutcome::NotEnoughData { rows } => {
            log::info!(
                "Not enough snapshots for {} ({} found), nothing uploaded",
                day,
                rows
            );
        }
    }

    Ok(())
}
