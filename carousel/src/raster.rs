//! Raster sequences for the raster axis.
//!
//! A raster is a list of absolute raster-axis positions visited one after
//! another. Each position is only issued once the previous move has
//! completed.

/// Evenly spaced positions from `start` to `end` inclusive.
///
/// Intermediate points are rounded to the nearest step (halves round up).
/// A count of 1 yields just `start`; a count of 0 yields nothing.
pub fn interpolate(start: i64, end: i64, count: u32) -> Vec<i64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let span = i128::from(end) - i128::from(start);
            let intervals = i128::from(count - 1);
            (0..count)
                .map(|i| {
                    let numerator = span * i128::from(i);
                    let offset = (2 * numerator + intervals).div_euclid(2 * intervals);
                    (i128::from(start) + offset) as i64
                })
                .collect()
        }
    }
}

/// Progress through a raster sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPlan {
    positions: Vec<i64>,
    issued: usize,
    speed: f64,
}

impl RasterPlan {
    /// Plan `count` evenly spaced moves from `start` to `end` at `speed` steps/s.
    pub fn new(start: i64, end: i64, count: u32, speed: f64) -> Self {
        Self {
            positions: interpolate(start, end, count),
            issued: 0,
            speed,
        }
    }

    /// Plan a single move.
    pub fn single(position: i64, speed: f64) -> Self {
        Self {
            positions: vec![position],
            issued: 0,
            speed,
        }
    }

    /// All planned positions in order.
    pub fn positions(&self) -> &[i64] {
        &self.positions
    }

    /// Step rate for every move in the plan.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Number of moves already issued.
    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Take the next position to move to, or `None` when the plan is done.
    pub fn next_target(&mut self) -> Option<i64> {
        let target = self.positions.get(self.issued).copied()?;
        self.issued += 1;
        Some(target)
    }
}
