//! Monitor configuration.
//!
//! Configuration lives in a [RON](https://github.com/ron-rs/ron) file. Every
//! field has a default, so an empty file (`()`) is a valid configuration:
//!
//! ```text
//! (
//!     source: Tcp(bind: "0.0.0.0", port: 8080, chunk_size: 1024),
//!     frame_policy: latest,
//!     display: (width: 32, retention: 4096, margin: 2.0, radius: 0.75, tick_ms: 100),
//! )
//! ```
//!
//! Command line flags are applied on top, see [`crate::args`].

use crate::direction_reducer::DEFAULT_RADIUS;
use crate::frame_decoder::FramePolicy;
use crate::series_window::{DEFAULT_CAPACITY, DEFAULT_MARGIN, DEFAULT_WIDTH};

use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error;

/// Listen on every interface.
pub const DEFAULT_BIND: &str = "0.0.0.0";
/// The port the sensor client connects to.
pub const DEFAULT_PORT: u16 = 8080;
/// Bytes requested per socket read.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
/// One synthetic reading a second, like the real board.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;
/// Moving sources in synthetic track batches.
pub const DEFAULT_SOURCES: usize = 3;

/// Anything wrong with a configuration file or the flags applied to it.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Ron(#[from] ron::de::SpannedError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The complete monitor configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Where frames come from
    pub source: SourceConfig,
    /// What to do with several frames in one read
    pub frame_policy: FramePolicy,
    /// Chart sizing and redraw rate
    pub display: DisplayConfig,
}

/// Where frames come from. Exactly one source is active per run.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum SourceConfig {
    /// Listen for the sensor client on a TCP port.
    Tcp {
        #[serde(default = "default_bind")]
        bind: String,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default = "default_chunk_size")]
        chunk_size: usize,
    },
    /// Run the sensor client as a child process and read its stdout.
    Pipe {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Generate readings in-process.
    Synthetic {
        #[serde(default = "default_interval_ms")]
        interval_ms: u64,
        #[serde(default = "default_sources")]
        sources: usize,
        #[serde(default)]
        count: Option<u64>,
    },
}

/// How the dashboard is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Number of x positions visible on each chart
    pub width: usize,
    /// Points kept per series
    pub retention: usize,
    /// Padding around the y bounds
    pub margin: f64,
    /// Radius every sound source is drawn at
    pub radius: f64,
    /// How often the dashboard redraws, in milliseconds
    pub tick_ms: u64,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_owned()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_sources() -> usize {
    DEFAULT_SOURCES
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::tcp()
    }
}

impl SourceConfig {
    /// The TCP source with every default filled in.
    pub fn tcp() -> Self {
        Self::Tcp {
            bind: default_bind(),
            port: DEFAULT_PORT,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// The synthetic source with every default filled in, running forever.
    pub fn synthetic() -> Self {
        Self::Synthetic {
            interval_ms: DEFAULT_INTERVAL_MS,
            sources: DEFAULT_SOURCES,
            count: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            retention: DEFAULT_CAPACITY,
            margin: DEFAULT_MARGIN,
            radius: DEFAULT_RADIUS,
            tick_ms: 100,
        }
    }
}

impl MonitorConfig {
    /// Reads and validates a RON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Parses and validates RON text.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values serde cannot: positive sizes, retention at least
    /// the display width, a non-empty pipe command.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display.width == 0 {
            return Err(ConfigError::Invalid("display width must be positive".into()));
        }
        if self.display.retention < self.display.width {
            return Err(ConfigError::Invalid(format!(
                "retention ({}) must be at least the display width ({})",
                self.display.retention, self.display.width
            )));
        }
        match &self.source {
            SourceConfig::Tcp { chunk_size: 0, .. } => {
                Err(ConfigError::Invalid("chunk_size must be positive".into()))
            }
            SourceConfig::Pipe { command, .. } if command.trim().is_empty() => {
                Err(ConfigError::Invalid("pipe command is empty".into()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_is_all_defaults() {
        let config = MonitorConfig::from_ron("()").unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.source, SourceConfig::tcp());
        assert_eq!(config.frame_policy, FramePolicy::Latest);
        assert_eq!(config.display.width, 32);
    }

    #[test]
    fn partial_source_fills_in_defaults() {
        let config = MonitorConfig::from_ron("(source: Tcp(port: 9000), frame_policy: every)").unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Tcp {
                bind: "0.0.0.0".to_owned(),
                port: 9000,
                chunk_size: 1024,
            }
        );
        assert_eq!(config.frame_policy, FramePolicy::Every);
    }

    #[test]
    fn pipe_source() {
        let config =
            MonitorConfig::from_ron(r#"(source: Pipe(command: "./client", args: ["-v"]))"#).unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Pipe {
                command: "./client".to_owned(),
                args: vec!["-v".to_owned()],
            }
        );
    }

    #[test]
    fn retention_below_width_is_rejected() {
        let res = MonitorConfig::from_ron("(display: (width: 64, retention: 10))");
        assert!(matches!(res, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn syntax_error_is_reported() {
        let res = MonitorConfig::from_ron("(source: Tcp(port: ))");
        assert!(matches!(res, Err(ConfigError::Ron(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "(source: Synthetic(interval_ms: 10, count: Some(4)), display: (tick_ms: 50))"
        )
        .unwrap();

        let config = MonitorConfig::load(file.path()).unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Synthetic {
                interval_ms: 10,
                sources: 3,
                count: Some(4),
            }
        );
        assert_eq!(config.display.tick_ms, 50);
        assert_eq!(config.display.retention, 4096);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = MonitorConfig::load(dir.path().join("nope.ron"));
        assert!(matches!(res, Err(ConfigError::Io(_))));
    }
}
