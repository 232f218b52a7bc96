//! Frame sources.
//!
//! A [`TransportReader`] is an iterator of frames. It blocks until the next
//! frame is ready, yields `Some(Err(_))` once if the transport fails, and
//! `None` when the stream has ended. Which reader is used is decided by
//! configuration, see [`open_transport`].

use crate::config::{MonitorConfig, SourceConfig};
use crate::frame_decoder::{Frame, FrameDecoder, FramePolicy};
use crate::synthetic::SyntheticSensor;

use log::{debug, info, warn};
use std::{
    collections::VecDeque,
    fmt,
    io::{self, BufRead, BufReader, Read},
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    process::{Child, ChildStdout, Command, Stdio},
    time::Duration,
};
use thiserror::Error;

/// Anything that ends a transport session early.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listening socket could not be opened
    #[error("could not listen: {0}")]
    Bind(#[source] io::Error),

    /// Waiting for the sensor client failed
    #[error("could not accept a connection: {0}")]
    Accept(#[source] io::Error),

    /// The connection or pipe broke mid-stream
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// The child process for a pipe source could not be started
    #[allow(missing_docs)]
    #[error("could not start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A synthetic message could not be serialized
    #[error("could not encode a synthetic message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A blocking source of frames. `Display` names the source in log lines.
pub trait TransportReader: Iterator<Item = Result<Frame, TransportError>> + fmt::Display + Send {
    /// Complete frames this source threw away because a newer one arrived
    /// in the same read. Sources that never drop frames keep the default.
    fn dropped(&self) -> u64 {
        0
    }
}

/// Builds the reader selected by `config`.
pub fn open_transport(config: &MonitorConfig) -> Result<Box<dyn TransportReader>, TransportError> {
    match &config.source {
        SourceConfig::Tcp {
            bind,
            port,
            chunk_size,
        } => Ok(Box::new(SocketReader::bind(
            (bind.as_str(), *port),
            config.frame_policy,
            *chunk_size,
        )?)),
        SourceConfig::Pipe { command, args } => Ok(Box::new(PipeReader::spawn(command, args)?)),
        SourceConfig::Synthetic {
            interval_ms,
            sources,
            count,
        } => Ok(Box::new(SyntheticReader::new(
            SyntheticSensor::new(*sources),
            Duration::from_millis(*interval_ms),
            *count,
        ))),
    }
}

/// Accepts a single TCP connection and splits what it sends on the
/// carriage-return delimiter. The listener is dropped as soon as a peer is
/// accepted; there is no second session.
pub struct SocketReader {
    listener: Option<TcpListener>,
    local: Option<SocketAddr>,
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
    decoder: FrameDecoder,
    ready: VecDeque<Frame>,
    chunk: Vec<u8>,
    done: bool,
}

impl SocketReader {
    /// Listens on `addr`. Nothing is accepted until the first call to
    /// `next()`.
    pub fn bind(
        addr: impl ToSocketAddrs,
        policy: FramePolicy,
        chunk_size: usize,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).map_err(TransportError::Bind)?;
        Ok(Self::from_listener(listener, policy, chunk_size))
    }

    /// Wraps an already bound listener.
    pub fn from_listener(listener: TcpListener, policy: FramePolicy, chunk_size: usize) -> Self {
        let local = listener.local_addr().ok();
        Self {
            listener: Some(listener),
            local,
            stream: None,
            peer: None,
            decoder: FrameDecoder::with_policy(policy),
            ready: VecDeque::new(),
            chunk: vec![0; chunk_size.max(1)],
            done: false,
        }
    }

    /// The address being listened on, useful after binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }

    fn fail(&mut self, error: TransportError) -> Option<Result<Frame, TransportError>> {
        self.done = true;
        self.stream = None;
        Some(Err(error))
    }
}

impl Iterator for SocketReader {
    type Item = Result<Frame, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Some(Ok(frame));
            }
            if self.done {
                return None;
            }

            if self.stream.is_none() {
                let listener = self.listener.take()?;
                match listener.accept() {
                    Ok((stream, peer)) => {
                        info!("Connected by {}.", peer);
                        self.stream = Some(stream);
                        self.peer = Some(peer);
                    }
                    Err(e) => return self.fail(TransportError::Accept(e)),
                }
            }

            let read = match self.stream.as_mut() {
                Some(stream) => stream.read(&mut self.chunk),
                None => return None,
            };
            match read {
                Ok(0) => {
                    if let Some(peer) = self.peer {
                        info!("Connection closed from {}.", peer);
                    }
                    if self.decoder.pending() > 0 {
                        warn!(
                            "discarding {} bytes of an unterminated frame",
                            self.decoder.pending()
                        );
                    }
                    self.done = true;
                    self.stream = None;
                    return None;
                }
                Ok(n) => {
                    let frames = self.decoder.push(&self.chunk[..n]);
                    self.ready.extend(frames);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return self.fail(TransportError::Read(e)),
            }
        }
    }
}

impl fmt::Display for SocketReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.peer, self.local) {
            (Some(peer), _) => write!(f, "tcp({})", peer),
            (None, Some(local)) => write!(f, "tcp(listening on {})", local),
            (None, None) => write!(f, "tcp"),
        }
    }
}

impl TransportReader for SocketReader {
    fn dropped(&self) -> u64 {
        self.decoder.dropped()
    }
}

/// Runs a child process and treats every non-blank line of its stdout as a
/// frame. Lines are handed on as raw bytes; whether they hold valid text is
/// the router's concern.
pub struct PipeReader {
    command: String,
    child: Child,
    stdout: BufReader<ChildStdout>,
    line: Vec<u8>,
    done: bool,
}

impl PipeReader {
    /// Starts `command` with `args`, stdout captured.
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, TransportError> {
        let spawn_error = |source: io::Error| TransportError::Spawn {
            command: command.to_owned(),
            source,
        };
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;
        let stdout = child.stdout.take().ok_or_else(|| {
            spawn_error(io::Error::new(io::ErrorKind::Other, "stdout not captured"))
        })?;
        info!("Started `{}` (pid {}).", command, child.id());

        Ok(Self {
            command: command.to_owned(),
            child,
            stdout: BufReader::new(stdout),
            line: Vec::new(),
            done: false,
        })
    }
}

impl Iterator for PipeReader {
    type Item = Result<Frame, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.line.clear();
            match self.stdout.read_until(b'\n', &mut self.line) {
                Ok(0) => {
                    info!("Connection closed.");
                    self.done = true;
                    match self.child.wait() {
                        Ok(status) => debug!("`{}` exited with {}", self.command, status),
                        Err(e) => warn!("could not reap `{}`: {}", self.command, e),
                    }
                }
                Ok(_) => {
                    let line = trim_line_end(&self.line);
                    if !line.iter().all(u8::is_ascii_whitespace) {
                        return Some(Ok(line.to_vec()));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(TransportError::Read(e)));
                }
            }
        }
        None
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b'\r' && b != b'\n')
        .map_or(0, |i| i + 1);
    &line[..end]
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

impl fmt::Display for PipeReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipe({})", self.command)
    }
}

impl TransportReader for PipeReader {}

/// Serves frames from a [`SyntheticSensor`], sleeping `interval` between
/// ticks. Stops after `count` ticks, or never when `count` is `None`.
pub struct SyntheticReader {
    sensor: SyntheticSensor,
    interval: Duration,
    count: Option<u64>,
    ready: VecDeque<Frame>,
}

impl SyntheticReader {
    /// Wraps `sensor`.
    pub fn new(sensor: SyntheticSensor, interval: Duration, count: Option<u64>) -> Self {
        Self {
            sensor,
            interval,
            count,
            ready: VecDeque::new(),
        }
    }
}

impl Iterator for SyntheticReader {
    type Item = Result<Frame, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(frame) = self.ready.pop_front() {
            return Some(Ok(frame));
        }
        if matches!(self.count, Some(count) if self.sensor.tick() >= count) {
            return None;
        }
        if self.sensor.tick() > 0 && !self.interval.is_zero() {
            spin_sleep::sleep(self.interval);
        }
        for msg in self.sensor.next_messages() {
            match serde_json::to_vec(&msg) {
                Ok(frame) => self.ready.push_back(frame),
                Err(e) => return Some(Err(e.into())),
            }
        }
        self.ready.pop_front().map(Ok)
    }
}

impl fmt::Display for SyntheticReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "synthetic(tick {})", self.sensor.tick())
    }
}

impl TransportReader for SyntheticReader {}

/// Replays fixed chunks through a [`FrameDecoder`], the way a socket would
/// deliver them, then optionally fails.
#[cfg(test)]
pub(crate) struct ScriptedReader {
    chunks: VecDeque<Vec<u8>>,
    decoder: FrameDecoder,
    ready: VecDeque<Frame>,
    error: Option<TransportError>,
}

#[cfg(test)]
impl ScriptedReader {
    pub(crate) fn new(policy: FramePolicy, chunks: &[&[u8]]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            decoder: FrameDecoder::with_policy(policy),
            ready: VecDeque::new(),
            error: None,
        }
    }

    /// One chunk per line of `stream`.
    pub(crate) fn lines(stream: &[u8]) -> Self {
        let chunks: Vec<&[u8]> = stream.split_inclusive(|&b| b == b'\n').collect();
        Self::new(FramePolicy::Latest, &chunks)
    }

    pub(crate) fn failing_with(mut self, error: TransportError) -> Self {
        self.error = Some(error);
        self
    }
}

#[cfg(test)]
impl Iterator for ScriptedReader {
    type Item = Result<Frame, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Some(Ok(frame));
            }
            match self.chunks.pop_front() {
                Some(chunk) => self.ready.extend(self.decoder.push(&chunk)),
                None => return self.error.take().map(Err),
            }
        }
    }
}

#[cfg(test)]
impl fmt::Display for ScriptedReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scripted")
    }
}

#[cfg(test)]
impl TransportReader for ScriptedReader {
    fn dropped(&self) -> u64 {
        self.decoder.dropped()
    }
}
