//! The ingestion side of the monitor.
//!
//! [`run_ingest`] pulls frames from a [`TransportReader`], decodes them with
//! a [`MessageRouter`] and hands the results to a [`Sink`]. It runs on its own
//! thread ([`spawn_ingest`]) and never touches presentation state; the
//! default sink, [`ChannelSink`], just forwards [`Event`]s over a channel for
//! the presentation side to apply on its own schedule.

use crate::message_router::{ConcentrationReading, Message, MessageRouter, TrackSet};
use crate::transport::TransportReader;

use log::{debug, info, warn};
use std::{
    fmt,
    sync::mpsc::Sender,
    thread::{self, JoinHandle},
};
use thiserror::Error;

/// Why the ingest loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The peer closed the stream.
    EndOfStream,
    /// The transport failed. Carries the error message.
    TransportFailed(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfStream => write!(f, "connection closed"),
            Self::TransportFailed(msg) => write!(f, "transport failed: {}", msg),
        }
    }
}

/// What crosses from the ingest thread to the presentation side.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A gas sensor sample
    Reading(ConcentrationReading),
    /// A batch of sound source vectors
    Tracks(TrackSet),
    /// Running total of frames the transport dropped
    Dropped(u64),
    /// The loop has stopped; nothing follows
    Shutdown(ShutdownReason),
}

/// Returned by a [`Sink`] once nobody is listening any more.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("the presentation side has gone away")]
pub struct SinkClosed;

/// What the ingest loop needs from whoever consumes its output.
#[allow(missing_docs)]
pub trait Sink {
    fn on_reading(&mut self, reading: ConcentrationReading) -> Result<(), SinkClosed>;
    fn on_tracks(&mut self, tracks: TrackSet) -> Result<(), SinkClosed>;
    fn on_shutdown(&mut self, reason: ShutdownReason) -> Result<(), SinkClosed>;

    /// Called whenever the transport's drop count goes up, with the new
    /// total. Ignored unless a sink cares.
    fn on_dropped(&mut self, _total: u64) -> Result<(), SinkClosed> {
        Ok(())
    }
}

/// Forwards everything over an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Event>,
}

impl ChannelSink {
    /// Sends to `tx`.
    pub fn new(tx: Sender<Event>) -> Self {
        Self { tx }
    }

    fn send(&self, event: Event) -> Result<(), SinkClosed> {
        self.tx.send(event).map_err(|_| SinkClosed)
    }
}

impl Sink for ChannelSink {
    fn on_reading(&mut self, reading: ConcentrationReading) -> Result<(), SinkClosed> {
        self.send(Event::Reading(reading))
    }

    fn on_tracks(&mut self, tracks: TrackSet) -> Result<(), SinkClosed> {
        self.send(Event::Tracks(tracks))
    }

    fn on_shutdown(&mut self, reason: ShutdownReason) -> Result<(), SinkClosed> {
        self.send(Event::Shutdown(reason))
    }

    fn on_dropped(&mut self, total: u64) -> Result<(), SinkClosed> {
        self.send(Event::Dropped(total))
    }
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Frames pulled from the transport
    pub frames: u64,
    /// Frames that decoded into a message
    pub routed: u64,
    /// Frames skipped as undecodable
    pub rejected: u64,
    /// Frames the transport discarded before they reached the loop
    pub dropped: u64,
}

/// Drives `source` until it ends, fails, or the sink closes. The sink is
/// told why the loop stopped unless it has already gone away.
pub fn run_ingest<T, S>(source: &mut T, sink: &mut S) -> IngestStats
where
    T: TransportReader + ?Sized,
    S: Sink + ?Sized,
{
    let mut router = MessageRouter::new();
    let mut frames = 0;
    let mut dropped = 0;
    let mut reason = ShutdownReason::EndOfStream;

    while let Some(item) = source.next() {
        let frame = match item {
            Ok(frame) => frame,
            Err(error) => {
                warn!("transport error: {}", error);
                reason = ShutdownReason::TransportFailed(error.to_string());
                break;
            }
        };
        frames += 1;

        let delivered = report_dropped(source.dropped(), &mut dropped, sink)
            .and_then(|()| forward(&frame, &mut router, sink));
        if delivered.is_err() {
            info!("sink closed, stopping ingest");
            return stats(frames, dropped, &router);
        }
    }

    info!("ingest finished: {}", reason);
    if sink.on_shutdown(reason).is_err() {
        debug!("sink closed before shutdown was delivered");
    }
    stats(frames, source.dropped(), &router)
}

fn report_dropped<S: Sink + ?Sized>(
    total: u64,
    reported: &mut u64,
    sink: &mut S,
) -> Result<(), SinkClosed> {
    if total <= *reported {
        return Ok(());
    }
    debug!("{} frame(s) dropped so far", total);
    *reported = total;
    sink.on_dropped(total)
}

fn forward<S: Sink + ?Sized>(
    frame: &[u8],
    router: &mut MessageRouter,
    sink: &mut S,
) -> Result<(), SinkClosed> {
    match router.route(frame) {
        Ok(Message::Concentration(reading)) => sink.on_reading(reading),
        Ok(Message::Tracks(tracks)) => sink.on_tracks(tracks),
        Err(error) => {
            warn!("skipping frame: {}", error);
            debug!("skipped frame was {:?}", String::from_utf8_lossy(frame));
            Ok(())
        }
    }
}

fn stats(frames: u64, dropped: u64, router: &MessageRouter) -> IngestStats {
    IngestStats {
        frames,
        routed: router.routed(),
        rejected: router.rejected(),
        dropped,
    }
}

/// Runs [`run_ingest`] on its own thread.
pub fn spawn_ingest<S>(mut source: Box<dyn TransportReader>, mut sink: S) -> JoinHandle<IngestStats>
where
    S: Sink + Send + 'static,
{
    thread::spawn(move || {
        info!("{} : ingest started.", source);
        let stats = run_ingest(source.as_mut(), &mut sink);
        info!(
            "ingest : terminated after {} frames ({} skipped, {} dropped).",
            stats.frames, stats.rejected, stats.dropped
        );
        stats
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_decoder::FramePolicy;
    use crate::transport::{ScriptedReader, TransportError};
    use std::sync::mpsc::channel;

    const TRACKS: &[u8] = b"{\"type\": \"tracks\", \"src\": []}\r\n";

    /// Records every call, for checking what the loop delivers.
    #[derive(Default)]
    struct RecordingSink {
        events: Vec<Event>,
        closed_after: Option<usize>,
    }

    impl RecordingSink {
        fn push(&mut self, event: Event) -> Result<(), SinkClosed> {
            if matches!(self.closed_after, Some(n) if self.events.len() >= n) {
                return Err(SinkClosed);
            }
            self.events.push(event);
            Ok(())
        }
    }

    impl Sink for RecordingSink {
        fn on_reading(&mut self, reading: ConcentrationReading) -> Result<(), SinkClosed> {
            self.push(Event::Reading(reading))
        }
        fn on_tracks(&mut self, tracks: TrackSet) -> Result<(), SinkClosed> {
            self.push(Event::Tracks(tracks))
        }
        fn on_shutdown(&mut self, reason: ShutdownReason) -> Result<(), SinkClosed> {
            self.push(Event::Shutdown(reason))
        }
        fn on_dropped(&mut self, total: u64) -> Result<(), SinkClosed> {
            self.push(Event::Dropped(total))
        }
    }

    #[test]
    fn malformed_frame_does_not_disrupt_the_next() {
        let stream = b"{\"type\": \"tracks\", \"src\": [\r\n{\"type\": \"tracks\", \"src\": []}\r\n";
        let mut sink = RecordingSink::default();

        let stats = run_ingest(&mut ScriptedReader::lines(stream), &mut sink);

        assert_eq!(
            sink.events,
            vec![
                Event::Tracks(TrackSet::default()),
                Event::Shutdown(ShutdownReason::EndOfStream),
            ]
        );
        assert_eq!(
            stats,
            IngestStats {
                frames: 2,
                routed: 1,
                rejected: 1,
                dropped: 0,
            }
        );
    }

    #[test]
    fn unknown_type_is_skipped() {
        let stream = b"{\"type\": \"humidity\"}\r\n{\"type\": \"concentration\", \"timeStamp\": 0, \"Ethanol\": 1, \"H2\": 2, \"tVOC\": 3, \"CO2\": 4}\r\n";
        let mut sink = RecordingSink::default();

        run_ingest(&mut ScriptedReader::lines(stream), &mut sink);

        assert_eq!(sink.events.len(), 2);
        assert!(matches!(sink.events[0], Event::Reading(_)));
    }

    #[test]
    fn transport_error_is_reported_to_the_sink() {
        let mut source = ScriptedReader::lines(TRACKS).failing_with(TransportError::Read(
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        ));
        let mut sink = RecordingSink::default();

        run_ingest(&mut source, &mut sink);

        assert_eq!(sink.events[0], Event::Tracks(TrackSet::default()));
        assert!(matches!(
            sink.events.last(),
            Some(Event::Shutdown(ShutdownReason::TransportFailed(msg))) if msg.contains("reset")
        ));
    }

    #[test]
    fn closed_sink_stops_the_loop() {
        let chunks = vec![TRACKS; 10];
        let mut source = ScriptedReader::new(FramePolicy::Latest, &chunks);
        let mut sink = RecordingSink {
            closed_after: Some(3),
            ..RecordingSink::default()
        };

        let stats = run_ingest(&mut source, &mut sink);

        assert_eq!(sink.events.len(), 3);
        assert_eq!(stats.frames, 4);
    }

    #[test]
    fn dropped_frames_are_reported_before_the_survivor() {
        let both = [TRACKS, TRACKS].concat();
        let mut source =
            ScriptedReader::new(FramePolicy::Latest, &[TRACKS, &both[..], TRACKS]);
        let mut sink = RecordingSink::default();

        let stats = run_ingest(&mut source, &mut sink);

        assert_eq!(
            sink.events,
            vec![
                Event::Tracks(TrackSet::default()),
                Event::Dropped(1),
                Event::Tracks(TrackSet::default()),
                Event::Tracks(TrackSet::default()),
                Event::Shutdown(ShutdownReason::EndOfStream),
            ]
        );
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn every_policy_drops_nothing() {
        let all = [TRACKS, TRACKS, TRACKS].concat();
        let mut source = ScriptedReader::new(FramePolicy::Every, &[&all[..]]);
        let mut sink = RecordingSink::default();

        let stats = run_ingest(&mut source, &mut sink);

        assert_eq!(stats.frames, 3);
        assert_eq!(stats.dropped, 0);
        assert!(!sink.events.iter().any(|e| matches!(e, Event::Dropped(_))));
    }

    #[test]
    fn channel_sink_carries_shutdown() {
        let (tx, rx) = channel();

        run_ingest(&mut ScriptedReader::lines(TRACKS), &mut ChannelSink::new(tx));

        assert_eq!(rx.recv(), Ok(Event::Tracks(TrackSet::default())));
        assert_eq!(rx.recv(), Ok(Event::Shutdown(ShutdownReason::EndOfStream)));
        assert!(rx.recv().is_err());
    }
}
