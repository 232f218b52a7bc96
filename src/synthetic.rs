//! A stand-in for the sensor board, so the dashboard can be exercised
//! without hardware attached.
//!
//! Gas readings drift around plausible SGP30 baselines and the sound
//! sources walk slowly around the listener, with one static source parked
//! in front of it.

use crate::direction_reducer::{Radian, DYNAMIC_TAG};
use crate::message_router::{ConcentrationReading, Message, TrackPoint, TrackSet};
use rand::prelude::*;
use std::f64::consts::TAU;

const ETHANOL_BASE: f64 = 17_800.0;
const H2_BASE: f64 = 13_200.0;
const TVOC_BASE: f64 = 12.0;
const CO2_BASE: f64 = 420.0;

/// How far the sources turn per tick.
const STEP: Radian = TAU / 90.0;

/// Produces one [`Message::Concentration`] and one [`Message::Tracks`] per
/// tick, in that order.
#[derive(Debug)]
pub struct SyntheticSensor {
    tick: u64,
    sources: usize,
    noise: f64,
    rng: StdRng,
}

impl SyntheticSensor {
    /// A sensor tracking `sources` moving sound sources, seeded from the OS.
    pub fn new(sources: usize) -> Self {
        Self {
            tick: 0,
            sources,
            noise: 1.0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic variant for tests.
    pub fn seeded(sources: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(sources)
        }
    }

    /// Scales the random jitter on every value. Zero makes the output fully
    /// deterministic.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Ticks produced so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advances one tick and returns what the board would have sent.
    pub fn next_messages(&mut self) -> [Message; 2] {
        let reading = self.reading();
        let tracks = self.tracks();
        self.tick += 1;
        [Message::Concentration(reading), Message::Tracks(tracks)]
    }

    fn jitter(&mut self, scale: f64) -> f64 {
        if self.noise <= 0.0 {
            return 0.0;
        }
        let span = scale * self.noise;
        self.rng.gen_range(-span..span)
    }

    fn reading(&mut self) -> ConcentrationReading {
        let t = self.tick as f64;
        let wave = (t / 20.0).sin();
        ConcentrationReading {
            time_stamp: t,
            ethanol: ETHANOL_BASE + 150.0 * wave + self.jitter(20.0),
            h2: H2_BASE - 80.0 * wave + self.jitter(10.0),
            tvoc: (TVOC_BASE + 10.0 * wave + self.jitter(2.0)).max(0.0),
            co2: (CO2_BASE + 30.0 * wave + self.jitter(5.0)).max(400.0),
        }
    }

    fn tracks(&mut self) -> TrackSet {
        let offset = self.tick as f64 * STEP;
        let mut src: Vec<TrackPoint> = generate_circular_points(self.sources, offset)
            .into_iter()
            .map(|(x, y)| (x + self.jitter(0.01), y + self.jitter(0.01)))
            .map(|(x, y)| TrackPoint::new(DYNAMIC_TAG, x, y))
            .collect();
        src.push(TrackPoint::new("static", 1.0, 0.0));
        TrackSet { src }
    }
}

/// Unit vectors spread evenly around the circle, rotated by `offset`.
fn generate_circular_points(num_points: usize, offset: Radian) -> Vec<(f64, f64)> {
    (0..num_points)
        .map(|v| -> Radian { offset + (v as f64 / num_points as f64) * TAU })
        .map(|angle| (angle.cos(), angle.sin()))
        .collect()
}
