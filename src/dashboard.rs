//! Presentation-side state: four gas charts and the sound direction plot.
//!
//! The [`Dashboard`] is owned by whichever thread draws it. The ingest thread
//! only ever talks to it through [`Event`]s, drained from a channel with
//! [`Dashboard::drain`].

use crate::config::DisplayConfig;
use crate::direction_reducer::{DirectionReducer, PolarPoint};
use crate::ingest::{Event, ShutdownReason};
use crate::message_router::{ConcentrationReading, TrackSet};
use crate::series_window::SeriesWindow;

use log::{debug, warn};
use std::sync::mpsc::{Receiver, TryRecvError};

/// The four values reported by the gas sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Metric {
    Ethanol,
    H2,
    Tvoc,
    Co2,
}

impl Metric {
    /// In display order.
    pub const ALL: [Metric; 4] = [Metric::Ethanol, Metric::H2, Metric::Tvoc, Metric::Co2];

    /// Label used on the chart.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Ethanol => "Ethanol",
            Metric::H2 => "H2",
            Metric::Tvoc => "tVOC",
            Metric::Co2 => "CO2eq",
        }
    }

    /// Unit the sensor reports the metric in.
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Ethanol | Metric::H2 => "raw",
            Metric::Tvoc => "ppb",
            Metric::Co2 => "ppm",
        }
    }

    /// Picks this metric out of a reading.
    pub fn value(&self, reading: &ConcentrationReading) -> f64 {
        match self {
            Metric::Ethanol => reading.ethanol,
            Metric::H2 => reading.h2,
            Metric::Tvoc => reading.tvoc,
            Metric::Co2 => reading.co2,
        }
    }

    fn index(&self) -> usize {
        match self {
            Metric::Ethanol => 0,
            Metric::H2 => 1,
            Metric::Tvoc => 2,
            Metric::Co2 => 3,
        }
    }
}

/// Everything the live view draws.
#[derive(Debug, Clone)]
pub struct Dashboard {
    series: [SeriesWindow; 4],
    directions: DirectionReducer,
    readings: u64,
    track_batches: u64,
    dropped: u64,
    shutdown: Option<ShutdownReason>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(&DisplayConfig::default())
    }
}

impl Dashboard {
    /// Instantiates an empty dashboard sized by `display`.
    pub fn new(display: &DisplayConfig) -> Self {
        let window =
            || SeriesWindow::new(display.width, display.retention).with_margin(display.margin);
        Self {
            series: [window(), window(), window(), window()],
            directions: DirectionReducer::new(display.radius),
            readings: 0,
            track_batches: 0,
            dropped: 0,
            shutdown: None,
        }
    }

    /// Appends one point to each metric, all at the reading's timestamp.
    pub fn apply_reading(&mut self, reading: &ConcentrationReading) {
        self.readings += 1;
        for metric in Metric::ALL {
            let series = &mut self.series[metric.index()];
            if let Err(e) = series.append(reading.time_stamp, metric.value(reading)) {
                warn!("{} : dropping point: {}", metric.name(), e);
            }
        }
    }

    /// Replaces the sound directions with those of `tracks`.
    pub fn apply_tracks(&mut self, tracks: &TrackSet) {
        self.track_batches += 1;
        let shown = self.directions.reduce(tracks).len();
        debug!("{} of {} sources are dynamic", shown, tracks.src.len());
    }

    /// Applies one event from the ingest side.
    pub fn apply(&mut self, event: Event) {
        match event {
            Event::Reading(reading) => self.apply_reading(&reading),
            Event::Tracks(tracks) => self.apply_tracks(&tracks),
            Event::Dropped(total) => self.dropped = total,
            Event::Shutdown(reason) => self.shutdown = Some(reason),
        }
    }

    /// Applies every event waiting on `rx` without blocking. Returns how many
    /// were applied. If the sender vanished without a shutdown event, that
    /// is recorded as a shutdown too.
    pub fn drain(&mut self, rx: &Receiver<Event>) -> usize {
        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    self.apply(event);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.shutdown.is_none() {
                        self.shutdown = Some(ShutdownReason::TransportFailed(
                            "ingest thread exited".to_owned(),
                        ));
                    }
                    break;
                }
            }
        }
        applied
    }

    /// The chart data for `metric`.
    pub fn series(&self, metric: Metric) -> &SeriesWindow {
        &self.series[metric.index()]
    }

    /// Where the dynamic sound sources of the last batch are.
    pub fn directions(&self) -> &[PolarPoint] {
        self.directions.points()
    }

    /// Readings received so far, rejected points included.
    pub fn readings(&self) -> u64 {
        self.readings
    }

    /// Track batches received so far.
    pub fn track_batches(&self) -> u64 {
        self.track_batches
    }

    /// Frames the transport discarded in favour of newer ones.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Set once the ingest side has stopped.
    pub fn shutdown(&self) -> Option<&ShutdownReason> {
        self.shutdown.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_decoder::FramePolicy;
    use crate::ingest::{run_ingest, ChannelSink};
    use crate::message_router::TrackPoint;
    use crate::transport::ScriptedReader;
    use std::sync::mpsc::channel;
    use std::thread;

    fn reading(t: f64, ethanol: f64, h2: f64, tvoc: f64, co2: f64) -> ConcentrationReading {
        ConcentrationReading {
            time_stamp: t,
            ethanol,
            h2,
            tvoc,
            co2,
        }
    }

    #[test]
    fn reading_updates_all_four_series_at_one_timestamp() {
        let mut dash = Dashboard::default();
        dash.apply_reading(&reading(7.0, 17800.0, 13200.0, 12.0, 415.0));

        for metric in Metric::ALL {
            let latest = dash.series(metric).latest().unwrap();
            assert_eq!(latest.x, 7.0, "{}", metric.name());
        }
        assert_eq!(dash.series(Metric::Ethanol).latest().unwrap().y, 17800.0);
        assert_eq!(dash.series(Metric::H2).latest().unwrap().y, 13200.0);
        assert_eq!(dash.series(Metric::Tvoc).latest().unwrap().y, 12.0);
        assert_eq!(dash.series(Metric::Co2).latest().unwrap().y, 415.0);
    }

    #[test]
    fn repeated_timestamp_is_dropped() {
        let mut dash = Dashboard::default();
        dash.apply_reading(&reading(1.0, 1.0, 1.0, 1.0, 1.0));
        dash.apply_reading(&reading(1.0, 9.0, 9.0, 9.0, 9.0));
        assert_eq!(dash.series(Metric::Co2).len(), 1);
        assert_eq!(dash.readings(), 2);
    }

    #[test]
    fn tracks_replace_directions() {
        let mut dash = Dashboard::default();
        dash.apply(Event::Tracks(TrackSet {
            src: vec![
                TrackPoint::new("dynamic", 1.0, 0.0),
                TrackPoint::new("static", 0.0, 1.0),
            ],
        }));
        assert_eq!(dash.directions().len(), 1);

        dash.apply(Event::Tracks(TrackSet::default()));
        assert!(dash.directions().is_empty());
        assert_eq!(dash.track_batches(), 2);
    }

    #[test]
    fn drain_applies_in_order_and_notices_disconnect() {
        let (tx, rx) = channel();
        tx.send(Event::Reading(reading(1.0, 1.0, 2.0, 3.0, 4.0))).unwrap();
        tx.send(Event::Reading(reading(2.0, 5.0, 6.0, 7.0, 8.0))).unwrap();

        let mut dash = Dashboard::default();
        assert_eq!(dash.drain(&rx), 2);
        assert_eq!(dash.series(Metric::Ethanol).bounds(), Some((1.0, 5.0)));
        assert!(dash.shutdown().is_none());

        drop(tx);
        assert_eq!(dash.drain(&rx), 0);
        assert!(dash.shutdown().is_some());
    }

    #[test]
    fn end_to_end_through_a_thread() {
        let wire = b"{\"type\": \"concentration\", \"timeStamp\": 0, \"Ethanol\": 10, \"H2\": 20, \"tVOC\": 3, \"CO2\": 400}\r\n\
                     garbage\r\n\
                     {\"type\": \"tracks\", \"src\": [{\"tag\": \"dynamic\", \"x\": 0, \"y\": 1}]}\r\n";
        let mut source = ScriptedReader::lines(wire);

        let (tx, rx) = channel();
        let ingest = thread::spawn(move || run_ingest(&mut source, &mut ChannelSink::new(tx)));
        let stats = ingest.join().unwrap();
        assert_eq!(stats.rejected, 1);

        let mut dash = Dashboard::default();
        dash.drain(&rx);
        assert_eq!(dash.readings(), 1);
        assert_eq!(dash.directions().len(), 1);
        assert_eq!(dash.shutdown(), Some(&ShutdownReason::EndOfStream));
    }

    #[test]
    fn dropped_total_reaches_the_dashboard() {
        let frame: &[u8] = b"{\"type\": \"tracks\", \"src\": []}\r\n";
        let burst = [frame, frame, frame].concat();
        let mut source = ScriptedReader::new(FramePolicy::Latest, &[frame, &burst[..]]);

        let (tx, rx) = channel();
        run_ingest(&mut source, &mut ChannelSink::new(tx));

        let mut dash = Dashboard::default();
        dash.drain(&rx);
        assert_eq!(dash.dropped(), 2);
        assert_eq!(dash.track_batches(), 2);
    }
}
