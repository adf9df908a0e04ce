//! Inventory Monitor - realtime loadcell snapshots
//!
//! Reads weight reports from the station's loadcell controller and inserts a
//! snapshot row whenever a level changes. Runs until Ctrl+C or until the
//! serial connection is lost.

use clap::Parser;
use inventory_monitor::config::StationArgs;
use inventory_monitor::monitor::{echo_lines, interrupt, until_interrupted};
use inventory_monitor::{LineSource, Monitor, SerialTransport, SnapshotPublisher};
use std::time::Duration;

/// Loadcell inventory monitor - streams serial weight reports into snapshot rows
#[derive(Parser, Debug)]
#[command(name = "inventory_monitor")]
#[command(version, about, long_about = None)]
struct Args {
    /// Serial port of the loadcell controller
    #[arg(short, long, env = "SERIAL_PORT", default_value = "/dev/ttyUSB0")]
    port: String,

    /// Serial baud rate
    #[arg(short, long, env = "BAUD_RATE", default_value_t = 115_200)]
    baud: u32,

    /// Read timeout for one serial read, in milliseconds
    #[arg(long, default_value_t = 1000)]
    read_timeout_ms: u64,

    /// Wait after opening the port while the controller resets, in milliseconds
    #[arg(long, default_value_t = 2000)]
    settle_ms: u64,

    /// Sleep between polls when no data is waiting, in milliseconds
    #[arg(long, default_value_t = 10)]
    poll_ms: u64,

    /// Zero all loadcells on the controller after connecting
    #[arg(long, default_value_t = false)]
    tare: bool,

    /// Only print received lines (no parsing, no uploads)
    #[arg(long, default_value_t = false)]
    echo: bool,

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
        println!("Stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> inventory_monitor::Result<()> {
    log::info!("Starting inventory_monitor...");

    let poll_interval = Duration::from_millis(args.poll_ms);

    // Store settings are checked before touching the serial port
    let mut monitor = if args.echo {
        None
    } else {
        let sensors = args.station.sensor_table()?;
        let tables = args.station.tables()?;
        let store = args.station.open_store(&tables, &sensors)?;
        let clock = args.station.clock();
        log::info!(
            "Writing snapshots to '{}' ({})",
            tables.snapshots,
            store.describe()
        );
        log::info!("Station clock: {}", clock.describe());

        let publisher = SnapshotPublisher::new(store, &tables.snapshots, sensors.clone());
        Some(Monitor::new(sensors, publisher, clock))
    };

    let port = args.port.as_str();
    let settle = Duration::from_millis(args.settle_ms);
    let read_timeout = Duration::from_millis(args.read_timeout_ms);
    let tare = args.tare;

    // The session owns the port, so it is closed on every exit path,
    // including Ctrl+C during the settle delay
    let session = async {
        let transport = match SerialTransport::open(port, args.baud, read_timeout) {
            Ok(transport) => transport,
            Err(e) => return e,
        };
        let mut source = LineSource::new(transport);

        // Opening the port resets the controller
        tokio::time::sleep(settle).await;

        if tare {
            if let Err(e) = source.send_command(b"t") {
                return e;
            }
            log::info!("Sent tare command");
        }

        println!("Monitoring {} (Ctrl+C to stop)", port);

        match monitor.as_mut() {
            None => echo_lines(&mut source, poll_interval).await,
            Some(monitor) => monitor.run(&mut source, poll_interval).await,
        }
    };

    let result = until_interrupted(session, interrupt(tokio::signal::ctrl_c())).await;

    if let Some(monitor) = &monitor {
        let stats = monitor.stats();
        log::info!(
            "Processed {} lines, {} readings, {} snapshots ({} failed uploads)",
            stats.lines,
            stats.readings,
            stats.snapshots,
            stats.publish_failures
        );
    }

    if result.is_ok() {
        println!("\nInterrupted, shutting down.");
    }

    result.map_err(Into::into)
}
