//! Splits the raw byte stream coming off the transport into frames.
//!
//! The sensor client terminates every JSON document with a carriage return,
//! usually followed by a line feed (`...}\r\n`). Frames are found by
//! splitting the accumulated buffer on `\r`; whatever trails the last
//! delimiter is either a terminator (nothing, or the lone `\n`) or the start
//! of the next document, which is kept for the next pass. The `\n` half of
//! a `\r\n` terminator can end up at the front of the next frame when a read
//! splits the pair; it is stripped before the frame is handed out.
//!
//! The delimiter is not escaped by the protocol, so a `\r` inside a payload
//! corrupts framing. JSON encoders never emit a raw carriage return inside a
//! string, which is what the protocol relies on.

use log::debug;
use nom::{
    bytes::complete::{tag, take_till},
    multi::separated_list0,
    IResult,
};
use serde::Deserialize;

/// The byte that terminates a frame on the wire.
pub const DELIMITER: u8 = b'\r';

/// One complete, delimiter-bounded message payload.
pub type Frame = Vec<u8>;

/// What to do when a single pass over the buffer finds more than one
/// complete frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FramePolicy {
    /// Only the newest complete frame of a pass is emitted, older ones are
    /// dropped. This is how the dashboard has always consumed the stream: it
    /// only ever cares about the freshest reading.
    #[default]
    Latest,
    /// Every complete frame of a pass is emitted, in wire order.
    Every,
}

/// Incremental frame splitter. Feed it chunks with [`FrameDecoder::push`].
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    policy: FramePolicy,
    dropped: u64,
}

fn segment(s: &[u8]) -> IResult<&[u8], &[u8]> {
    take_till(|b| b == DELIMITER)(s)
}

/// Splits `s` at every delimiter. Like a plain `split`, this yields one more
/// segment than there are delimiters, so the result is never empty.
fn segments(s: &[u8]) -> Vec<&[u8]> {
    match separated_list0(tag(&[DELIMITER][..]), segment)(s) {
        Ok((_, segs)) if !segs.is_empty() => segs,
        _ => vec![s],
    }
}

fn payload(seg: &[u8]) -> &[u8] {
    seg.strip_prefix(b"\n").unwrap_or(seg)
}

/// A trailing segment that closes the stream cleanly rather than starting
/// a new frame.
fn is_terminator(seg: &[u8]) -> bool {
    seg.is_empty() || seg == b"\n"
}

impl FrameDecoder {
    /// Instantiates a decoder with the default [`FramePolicy::Latest`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates a decoder with an explicit policy.
    pub fn with_policy(policy: FramePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Appends `chunk` to the internal buffer and returns the frames that
    /// became complete. An empty result means more input is needed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        if !self.buffer.contains(&DELIMITER) {
            return Vec::new();
        }

        let segs = segments(&self.buffer);
        let (last, complete) = match segs.split_last() {
            Some(split) => split,
            None => return Vec::new(),
        };

        let frames: Vec<Frame> = match self.policy {
            FramePolicy::Latest => {
                let skipped = complete.len().saturating_sub(1) as u64;
                if skipped > 0 {
                    debug!("dropping {} older frame(s) in this pass", skipped);
                    self.dropped += skipped;
                }
                complete
                    .last()
                    .map(|seg| payload(seg).to_vec())
                    .into_iter()
                    .collect()
            }
            FramePolicy::Every => complete
                .iter()
                .filter(|seg| !is_terminator(seg))
                .map(|seg| payload(seg).to_vec())
                .collect(),
        };

        let remainder = if is_terminator(last) {
            Vec::new()
        } else {
            last.to_vec()
        };
        self.buffer = remainder;

        frames
    }

    /// Number of buffered bytes that do not yet form a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Number of complete frames discarded by [`FramePolicy::Latest`].
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
