use std::io;
use thiserror::Error;

/// Errors that end the live view.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The terminal could not be set up, drawn to or restored
    #[error("terminal error: {0}")]
    Io(#[from] io::Error),

    /// The ingest thread panicked
    #[error("ingest thread panicked")]
    Join,
}
