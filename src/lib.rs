//! SensorBoard is a live dashboard for a small sensor board that reports two
//! kinds of telemetry over one byte stream: gas concentrations from an SGP30
//! style sensor (ethanol, H2, tVOC and CO2eq) and the positions of sound
//! sources tracked around a listener.
//!
//! The board's client sends JSON messages, one per `\r`-terminated frame.
//! On the host side the pipeline is:
//!
//! - a [transport](transport) hands out raw frames, cut by the
//!   [frame decoder](frame_decoder);
//! - the [message router](message_router) turns each frame into a typed
//!   message, or a recoverable error;
//! - the [ingest loop](ingest) forwards messages to the presentation side;
//! - the [dashboard](dashboard) keeps a [scrolling window](series_window)
//!   per gas and the [reduced directions](direction_reducer) of the sound
//!   sources, and the [gui] draws them.
//!
//! The `monitor` binary runs all of that. The `feed` binary stands in for
//! the board, sending [synthetic](synthetic) data over TCP.

#![warn(missing_docs)]
pub mod args;
pub mod config;
pub mod dashboard;
pub mod direction_reducer;
pub mod frame_decoder;
pub mod gui;
pub mod ingest;
pub mod message_router;
pub mod series_window;
pub mod synthetic;
pub mod transport;
