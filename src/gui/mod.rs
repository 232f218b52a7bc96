//! Terminal front end for the [`Dashboard`](crate::dashboard::Dashboard).

mod error;
mod live_view;

pub use error::MonitorError;
pub use live_view::{draw_dashboard, run_live_view};
