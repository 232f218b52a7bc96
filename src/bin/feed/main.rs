//! Plays the part of the sensor board: connects to a monitor and sends
//! synthetic readings and tracks, framed with `\r\n` like the real client.
//!
//! ```text
//! cargo run --bin feed -- --port 8080 --interval-ms 500
//! ```

use clap::Parser;
use log::{debug, info};
use sensorboard::{args::FeedArgs, synthetic::SyntheticSensor};
use std::{error::Error, io::Write, net::TcpStream, time::Duration};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = FeedArgs::parse();

    let mut stream = TcpStream::connect((args.host.as_str(), args.port))?;
    info!("Connected to {}:{}.", args.host, args.port);

    let mut sensor = SyntheticSensor::new(args.sources);
    let interval = Duration::from_millis(args.interval_ms);

    while args.count.map_or(true, |count| sensor.tick() < count) {
        for msg in sensor.next_messages() {
            debug!("Sending {:?}", msg);
            stream.write_all(&msg.to_wire()?)?;
        }
        stream.flush()?;
        spin_sleep::sleep(interval);
    }

    info!("Sent {} readings.", sensor.tick());
    Ok(())
}
