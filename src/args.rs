//! Commandline argument parsers using clap for the monitor and the feed

use crate::config::{ConfigError, MonitorConfig, SourceConfig, DEFAULT_PORT};
use crate::frame_decoder::FramePolicy;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which kind of frame source to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Wait for the sensor client on a TCP port
    Tcp,
    /// Run the sensor client and read its stdout
    Pipe,
    /// Generate readings locally
    Synthetic,
}

/// Live dashboard for gas concentration and sound direction telemetry
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct MonitorArgs {
    /// RON configuration file. Flags given here override its values
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Where telemetry comes from
    #[arg(short = 's', long = "source", value_enum)]
    pub source: Option<SourceKind>,

    /// Address to listen on, for the tcp source
    #[arg(short = 'b', long = "bind")]
    pub bind: Option<String>,

    /// Port to listen on, for the tcp source
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Program and arguments to run, for the pipe source
    #[arg(long = "command", num_args = 1.., allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Milliseconds between readings, for the synthetic source
    #[arg(long = "interval-ms")]
    pub interval_ms: Option<u64>,

    /// Whether to keep every frame of a read or only the newest
    #[arg(long = "frame-policy", value_enum)]
    pub frame_policy: Option<FramePolicy>,

    /// Number of points kept per chart
    #[arg(short = 'r', long = "retention")]
    pub retention: Option<usize>,
}

impl MonitorArgs {
    /// Loads the config file, if any, and applies the flags on top.
    pub fn resolve(&self) -> Result<MonitorConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => MonitorConfig::load(path)?,
            None => MonitorConfig::default(),
        };
        let config = self.apply(base)?;
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, mut config: MonitorConfig) -> Result<MonitorConfig, ConfigError> {
        match self.source {
            Some(SourceKind::Tcp) if !matches!(config.source, SourceConfig::Tcp { .. }) => {
                config.source = SourceConfig::tcp();
            }
            Some(SourceKind::Synthetic)
                if !matches!(config.source, SourceConfig::Synthetic { .. }) =>
            {
                config.source = SourceConfig::synthetic();
            }
            Some(SourceKind::Pipe) if !matches!(config.source, SourceConfig::Pipe { .. }) => {
                let (command, args) = self.command.split_first().ok_or_else(|| {
                    ConfigError::Invalid("the pipe source needs --command".into())
                })?;
                config.source = SourceConfig::Pipe {
                    command: command.clone(),
                    args: args.to_vec(),
                };
            }
            _ => {}
        }

        match &mut config.source {
            SourceConfig::Tcp { bind, port, .. } => {
                if let Some(b) = &self.bind {
                    *bind = b.clone();
                }
                if let Some(p) = self.port {
                    *port = p;
                }
            }
            SourceConfig::Pipe { command, args } => {
                if let Some((c, a)) = self.command.split_first() {
                    *command = c.clone();
                    *args = a.to_vec();
                }
            }
            SourceConfig::Synthetic { interval_ms, .. } => {
                if let Some(i) = self.interval_ms {
                    *interval_ms = i;
                }
            }
        }

        if let Some(policy) = self.frame_policy {
            config.frame_policy = policy;
        }
        if let Some(retention) = self.retention {
            config.display.retention = retention;
        }
        Ok(config)
    }
}

/// Sends synthetic sensor readings to a running monitor, framed exactly like
/// the sensor client frames them
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct FeedArgs {
    /// Host the monitor listens on
    #[arg(long = "host", default_value = "127.0.0.1")]
    pub host: String,

    /// Port the monitor listens on
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Milliseconds between readings
    #[arg(short = 'i', long = "interval-ms", default_value_t = 1000)]
    pub interval_ms: u64,

    /// Stop after this many readings
    #[arg(short = 'n', long = "count")]
    pub count: Option<u64>,

    /// Number of moving sound sources
    #[arg(long = "sources", default_value_t = 3)]
    pub sources: usize,
}
