//! Turns frames into typed [`Message`]s.
//!
//! Every frame is a JSON object carrying a `"type"` discriminant. Anything
//! that does not parse, or parses but does not fit one of the known shapes,
//! comes back as a [`DecodeError`]. Both kinds are recoverable: the caller
//! logs them and moves on to the next frame.

use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use thiserror::Error;

/// One sample from the gas sensor. All four metrics share `time_stamp` as
/// their x coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ConcentrationReading {
    /// Seconds since the client started
    #[serde(rename = "timeStamp", alias = "timestamp")]
    pub time_stamp: f64,
    /// Raw ethanol signal
    #[serde(rename = "Ethanol", alias = "ethanol")]
    pub ethanol: f64,
    /// Raw H2 signal
    #[serde(rename = "H2", alias = "h2")]
    pub h2: f64,
    /// Total volatile organic compounds, in ppb
    #[serde(rename = "tVOC", alias = "tvoc")]
    pub tvoc: f64,
    /// CO2 equivalent, in ppm
    #[serde(rename = "CO2", alias = "co2")]
    pub co2: f64,
}

/// A direction vector reported by the sound tracker.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrackPoint {
    /// `"dynamic"` for a moving source, anything else for a fixed one
    pub tag: String,
    /// Right of the listener
    pub x: f64,
    /// In front of the listener
    pub y: f64,
}

impl TrackPoint {
    /// Shorthand used by the synthetic source and tests.
    pub fn new(tag: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            tag: tag.into(),
            x,
            y,
        }
    }
}

/// A batch of [`TrackPoint`]s, in the order the tracker sent them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TrackSet {
    #[allow(missing_docs)]
    pub src: Vec<TrackPoint>,
}

/// Everything the sensor side can send us.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// `"type": "concentration"`
    Concentration(ConcentrationReading),
    /// `"type": "tracks"`
    Tracks(TrackSet),
}

impl Message {
    /// Encodes the message the way the sensor client puts it on the wire,
    /// carriage return and line feed included.
    pub fn to_wire(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut out = serde_json::to_vec(self)?;
        out.extend_from_slice(b"\r\n");
        Ok(out)
    }
}

/// Why a frame was skipped.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not valid JSON.
    #[error("bad format: {0}")]
    Format(serde_json::Error),

    /// The frame is JSON, but the `"type"` is unknown or a field is missing
    /// or has the wrong type.
    #[error("unexpected message shape: {0}")]
    Schema(serde_json::Error),
}

impl From<serde_json::Error> for DecodeError {
    fn from(error: serde_json::Error) -> Self {
        match error.classify() {
            Category::Data => Self::Schema(error),
            Category::Syntax | Category::Eof | Category::Io => Self::Format(error),
        }
    }
}

/// Parses frames and keeps count of what it has seen.
#[derive(Debug, Default)]
pub struct MessageRouter {
    routed: u64,
    rejected: u64,
}

impl MessageRouter {
    /// Instantiates a router with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one frame. Never touches framing state, so a bad frame can
    /// always be skipped.
    pub fn route(&mut self, frame: &[u8]) -> Result<Message, DecodeError> {
        match serde_json::from_slice::<Message>(frame) {
            Ok(msg) => {
                self.routed += 1;
                Ok(msg)
            }
            Err(error) => {
                self.rejected += 1;
                Err(error.into())
            }
        }
    }

    /// Frames that decoded into a [`Message`].
    pub fn routed(&self) -> u64 {
        self.routed
    }

    /// Frames that were skipped.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
