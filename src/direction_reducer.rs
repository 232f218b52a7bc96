//! Turns tracker vectors into directions on a polar plot.
//!
//! Only the bearing matters: each dynamic source becomes a clockwise angle
//! from the positive x axis, drawn at a fixed radius.

use crate::message_router::{TrackPoint, TrackSet};
use std::f64::consts::TAU;

/// Only points carrying this tag are moving sound sources worth drawing.
pub const DYNAMIC_TAG: &str = "dynamic";
/// Every source is drawn at the same distance from the centre.
pub const DEFAULT_RADIUS: f64 = 0.75;

/// An angle in radians.
pub type Radian = f64;

/// A sound source as drawn on the polar plot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarPoint {
    /// Clockwise angle from the positive x axis, in `[0, 2π)`
    pub angle: Radian,
    /// Distance from the centre of the plot
    pub radius: f64,
}

impl PolarPoint {
    /// The angle as a fraction of a full turn, in `[0, 1)`.
    pub fn turns(&self) -> f64 {
        self.angle / TAU
    }

    /// Back to plot coordinates, keeping the clockwise convention: a source
    /// at angle π/2 is drawn straight down.
    pub fn to_cartesian(&self) -> (f64, f64) {
        (
            self.radius * self.angle.cos(),
            -self.radius * self.angle.sin(),
        )
    }
}

/// Maps a tracker vector to a clockwise angle in `[0, 2π)`.
pub fn clockwise_angle(x: f64, y: f64) -> Radian {
    let mut angle = -y.atan2(x);
    if angle < 0.0 {
        angle += TAU;
    }
    // -ε + 2π rounds to 2π
    if angle >= TAU {
        angle = 0.0;
    }
    angle
}

/// Reduces each [`TrackSet`] to the polar points of its dynamic sources.
/// Nothing carries over between batches.
#[derive(Debug, Clone)]
pub struct DirectionReducer {
    radius: f64,
    points: Vec<PolarPoint>,
}

impl Default for DirectionReducer {
    fn default() -> Self {
        Self::new(DEFAULT_RADIUS)
    }
}

impl DirectionReducer {
    /// Instantiates a reducer that places every source at `radius`.
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            points: Vec::new(),
        }
    }

    /// Replaces the current output with the dynamic points of `tracks`.
    pub fn reduce(&mut self, tracks: &TrackSet) -> &[PolarPoint] {
        let radius = self.radius;
        self.points.clear();
        self.points.extend(
            tracks
                .src
                .iter()
                .filter(|p| p.tag == DYNAMIC_TAG)
                .map(|&TrackPoint { x, y, .. }| PolarPoint {
                    angle: clockwise_angle(x, y),
                    radius,
                }),
        );
        &self.points
    }

    /// Output of the last [`DirectionReducer::reduce`].
    pub fn points(&self) -> &[PolarPoint] {
        &self.points
    }
}
