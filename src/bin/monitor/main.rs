//! Live dashboard for the gas sensor and the sound tracker.
//!
//! Example, with the sensor client connecting to port 8080:
//!
//! ```text
//! cargo run --bin monitor -- --port 8080
//! ```
//!
//! Or without any hardware:
//!
//! ```text
//! cargo run --bin monitor -- --source synthetic --interval-ms 250
//! ```

use clap::Parser;
use log::{info, warn};
use sensorboard::{
    args::MonitorArgs,
    dashboard::Dashboard,
    gui::{run_live_view, MonitorError},
    ingest::{spawn_ingest, ChannelSink},
    transport::open_transport,
};
use std::{error::Error, sync::mpsc, time::Duration};

fn main() -> Result<(), Box<dyn Error>> {
    // Anything chattier than warnings would scribble over the dashboard.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = MonitorArgs::parse();
    let config = args.resolve()?;
    info!("Using {:?}", config);

    let source = open_transport(&config)?;
    let source_name = source.to_string();

    let (tx, rx) = mpsc::channel();
    let ingest = spawn_ingest(source, ChannelSink::new(tx));

    let dashboard = run_live_view(
        Dashboard::new(&config.display),
        rx,
        &source_name,
        Duration::from_millis(config.display.tick_ms),
    )?;

    println!(
        "Received {} readings and {} track batches, {} frames dropped.",
        dashboard.readings(),
        dashboard.track_batches(),
        dashboard.dropped()
    );
    if let Some(reason) = dashboard.shutdown() {
        println!("Stream stopped: {}.", reason);
    }

    // A still-running ingest thread is blocked on the transport; it goes
    // away with the process.
    if ingest.is_finished() {
        let stats = ingest.join().map_err(|_| MonitorError::Join)?;
        info!("{:?}", stats);
    } else {
        warn!("leaving the ingest thread behind");
    }

    Ok(())
}
