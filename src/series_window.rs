//! A per-metric time series that knows how to scale its own chart axes.
//!
//! The x axis shows the most recent [`DEFAULT_WIDTH`] positions and slides
//! right by one for every point past that. The y axis covers every value
//! still retained, padded by a fixed margin, so an old spike keeps the axis
//! wide even after it has scrolled out of view.
//!
//! History is bounded: once `capacity` points are stored the oldest one is
//! evicted. The running minimum and maximum are kept in monotonic deques so
//! that eviction does not need a rescan.

use std::collections::VecDeque;
use thiserror::Error;

/// Number of x positions visible at once.
pub const DEFAULT_WIDTH: usize = 32;
/// Padding added above and below the value bounds.
pub const DEFAULT_MARGIN: f64 = 2.0;
/// Number of points kept before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 4096;

/// One sample: `x` is the timestamp, `y` the value.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub x: f64,
    pub y: f64,
}

/// Why a point was refused. The series is left unchanged.
#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("x = {x} does not come after the previous x = {last}")]
    NotIncreasing { x: f64, last: f64 },

    #[error("point ({x}, {y}) is not finite")]
    NotFinite { x: f64, y: f64 },
}

/// A scrolling, auto-scaling series. See the module docs.
#[derive(Debug, Clone)]
pub struct SeriesWindow {
    points: VecDeque<SeriesPoint>,
    // Indices are absolute append counts, so they stay valid across
    // evictions. Front of `mins` is the smallest retained value, front of
    // `maxs` the largest.
    mins: VecDeque<(u64, f64)>,
    maxs: VecDeque<(u64, f64)>,
    appended: u64,
    width: usize,
    capacity: usize,
    margin: f64,
    cursor: f64,
}

impl Default for SeriesWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_CAPACITY)
    }
}

impl SeriesWindow {
    /// Instantiates an empty series. `capacity` is raised to `width` if it is
    /// smaller, a window can never show points that were already evicted.
    pub fn new(width: usize, capacity: usize) -> Self {
        let capacity = capacity.max(width).max(1);
        Self {
            points: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            mins: VecDeque::new(),
            maxs: VecDeque::new(),
            appended: 0,
            width,
            capacity,
            margin: DEFAULT_MARGIN,
            cursor: width as f64,
        }
    }

    /// Replaces the y axis padding.
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Adds a point to the right end of the series.
    pub fn append(&mut self, x: f64, y: f64) -> Result<(), SeriesError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(SeriesError::NotFinite { x, y });
        }
        if let Some(last) = self.points.back() {
            if x <= last.x {
                return Err(SeriesError::NotIncreasing { x, last: last.x });
            }
        }

        let idx = self.appended;
        self.appended += 1;

        if self.points.len() == self.capacity {
            self.points.pop_front();
            let oldest_kept = self.appended - self.capacity as u64;
            while matches!(self.mins.front(), Some(&(i, _)) if i < oldest_kept) {
                self.mins.pop_front();
            }
            while matches!(self.maxs.front(), Some(&(i, _)) if i < oldest_kept) {
                self.maxs.pop_front();
            }
        }
        self.points.push_back(SeriesPoint { x, y });

        while matches!(self.mins.back(), Some(&(_, v)) if v >= y) {
            self.mins.pop_back();
        }
        self.mins.push_back((idx, y));
        while matches!(self.maxs.back(), Some(&(_, v)) if v <= y) {
            self.maxs.pop_back();
        }
        self.maxs.push_back((idx, y));

        if self.appended > self.width as u64 {
            self.cursor += 1.0;
        }

        Ok(())
    }

    /// Smallest and largest retained value, if there are any points.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let &(_, min) = self.mins.front()?;
        let &(_, max) = self.maxs.front()?;
        Some((min, max))
    }

    /// The y axis range: retained bounds padded by the margin.
    pub fn visible_y_range(&self) -> (f64, f64) {
        let (min, max) = self.bounds().unwrap_or((0.0, 0.0));
        (min - self.margin, max + self.margin)
    }

    /// The x axis range, always `width` wide.
    pub fn visible_x_range(&self) -> (f64, f64) {
        (self.cursor - self.width as f64, self.cursor)
    }

    /// Retained points whose x falls inside [`Self::visible_x_range`].
    pub fn visible_points(&self) -> impl Iterator<Item = &SeriesPoint> + '_ {
        let (lo, hi) = self.visible_x_range();
        self.points.iter().filter(move |p| p.x >= lo && p.x <= hi)
    }

    /// Every retained point, oldest first.
    pub fn points(&self) -> impl Iterator<Item = &SeriesPoint> + '_ {
        self.points.iter()
    }

    /// The most recently appended point.
    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.back()
    }

    /// Number of retained points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points ever appended, evicted ones included.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Number of x positions visible at once.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Points kept before the oldest is evicted.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(ys: &[f64]) -> SeriesWindow {
        let mut series = SeriesWindow::default();
        for (i, &y) in ys.iter().enumerate() {
            series.append(i as f64, y).unwrap();
        }
        series
    }

    #[test]
    fn bounds_cover_every_value() {
        let series = filled(&[3.0, -1.0, 5.0, 2.0]);
        assert_eq!(series.bounds(), Some((-1.0, 5.0)));
        assert_eq!(series.visible_y_range(), (-3.0, 7.0));
    }

    #[test]
    fn first_value_seeds_the_bounds() {
        let series = filled(&[17000.0]);
        assert_eq!(series.bounds(), Some((17000.0, 17000.0)));

        let series = filled(&[-4.0, -6.0]);
        assert_eq!(series.bounds(), Some((-6.0, -4.0)));
    }

    #[test]
    fn empty_series_has_margin_only_range() {
        let series = SeriesWindow::default();
        assert_eq!(series.bounds(), None);
        assert_eq!(series.visible_y_range(), (-2.0, 2.0));
        assert_eq!(series.visible_x_range(), (0.0, 32.0));
    }

    #[test]
    fn window_slides_after_warm_up() {
        let mut series = SeriesWindow::default();
        for x in 1..=32 {
            series.append(x as f64, 0.0).unwrap();
        }
        assert_eq!(series.visible_x_range(), (0.0, 32.0));

        for x in 33..=40 {
            series.append(x as f64, 0.0).unwrap();
        }
        let (lo, hi) = series.visible_x_range();
        assert_eq!(hi - lo, 32.0);
        assert_eq!(hi, 40.0);
        assert_eq!(hi, series.latest().unwrap().x);
        assert!(series.visible_points().all(|p| p.x >= lo));
        assert_eq!(series.visible_points().count(), 33);
    }

    #[test]
    fn rejects_non_increasing_x() {
        let mut series = filled(&[1.0, 2.0]);
        assert_eq!(
            series.append(1.0, 9.0),
            Err(SeriesError::NotIncreasing { x: 1.0, last: 1.0 })
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.bounds(), Some((1.0, 2.0)));
    }

    #[test]
    fn rejects_nan() {
        let mut series = SeriesWindow::default();
        assert!(series.append(0.0, f64::NAN).is_err());
        assert!(series.is_empty());
    }

    #[test]
    fn eviction_forgets_old_extremes() {
        let mut series = SeriesWindow::new(2, 3);
        for (x, y) in [(0.0, 100.0), (1.0, -50.0), (2.0, 1.0), (3.0, 2.0)] {
            series.append(x, y).unwrap();
        }
        assert_eq!(series.len(), 3);
        assert_eq!(series.bounds(), Some((-50.0, 2.0)));

        series.append(4.0, 0.0).unwrap();
        assert_eq!(series.bounds(), Some((0.0, 2.0)));
        assert_eq!(series.appended(), 5);
    }

    #[test]
    fn bounded_matches_rescan() {
        let ys: Vec<f64> = (0..500).map(|i| ((i * 37) % 101) as f64 - 50.0).collect();
        let mut series = SeriesWindow::new(32, 64);
        for (i, &y) in ys.iter().enumerate() {
            series.append(i as f64, y).unwrap();
            let kept = &ys[i.saturating_sub(63)..=i];
            let min = kept.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = kept.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            assert_eq!(series.bounds(), Some((min, max)), "after {} points", i + 1);
        }
    }

    #[test]
    fn capacity_never_below_width() {
        let series = SeriesWindow::new(32, 4);
        assert_eq!(series.capacity(), 32);
    }
}
