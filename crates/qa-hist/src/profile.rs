//! 2D profile: running mean of a value per `(x, y)` cell.
//!
//! Cells are updated incrementally, `mean' = mean + (w - mean) / n'`, so long
//! runs never hold large raw sums.

use qa_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::Accumulator;
use crate::axis::{Axis, AxisSnapshot, FlowTally};
use crate::histogram::check_same;

/// Running mean and sample count of one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileCell {
    /// Mean of the values filled so far (0 for an empty cell).
    pub mean: f64,
    /// Number of values.
    pub n: u64,
}

impl ProfileCell {
    fn push(&mut self, w: f64) {
        self.n += 1;
        self.mean += (w - self.mean) / self.n as f64;
    }

    /// Weighted-mean combination of two cells.
    pub fn combine(self, other: ProfileCell) -> ProfileCell {
        let n = self.n + other.n;
        if n == 0 {
            return ProfileCell::default();
        }
        let mean = (self.n as f64 * self.mean + other.n as f64 * other.mean) / n as f64;
        ProfileCell { mean, n }
    }
}

/// A 2D profile accumulator.
#[derive(Debug, Clone)]
pub struct Profile2D {
    name: String,
    x: Axis,
    y: Axis,
    value_label: String,
    cells: Vec<ProfileCell>,
    x_flow: FlowTally,
    y_flow: FlowTally,
    rejected: u64,
    entries: u64,
    closed: bool,
}

/// Finalized 2D profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile2DSnapshot {
    /// Profile name.
    pub name: String,
    /// x axis.
    pub x: AxisSnapshot,
    /// y axis.
    pub y: AxisSnapshot,
    /// Label of the averaged quantity.
    pub value_label: String,
    /// Cells, index `ix * y.n_bins + iy`.
    pub cells: Vec<ProfileCell>,
    /// Fills clamped on x.
    pub x_flow: FlowTally,
    /// Fills clamped on y.
    pub y_flow: FlowTally,
    /// Fills dropped because a coordinate or the value was NaN.
    pub rejected: u64,
    /// Total binned fills.
    pub entries: u64,
}

impl Profile2D {
    /// Create an empty profile.
    pub fn new(name: impl Into<String>, x: Axis, y: Axis, value_label: impl Into<String>) -> Self {
        let cells = vec![ProfileCell::default(); x.n_bins * y.n_bins];
        Self {
            name: name.into(),
            x,
            y,
            value_label: value_label.into(),
            cells,
            x_flow: FlowTally::default(),
            y_flow: FlowTally::default(),
            rejected: 0,
            entries: 0,
            closed: false,
        }
    }

    /// Add `w` to the running mean of the cell containing `(x, y)`.
    ///
    /// Non-finite values are not averaged; they count as rejected.
    pub fn fill(&mut self, x: f64, y: f64, w: f64) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedAccumulator(self.name.clone()));
        }
        let (Some(lx), Some(ly)) = (self.x.locate(x), self.y.locate(y)) else {
            self.rejected += 1;
            return Ok(());
        };
        if !w.is_finite() {
            self.rejected += 1;
            return Ok(());
        }
        self.x_flow.record(lx.flow);
        self.y_flow.record(ly.flow);
        self.cells[lx.index * self.y.n_bins + ly.index].push(w);
        self.entries += 1;
        Ok(())
    }

    /// Cell `(ix, iy)`; an empty cell for indices outside the grid.
    pub fn cell(&self, ix: usize, iy: usize) -> ProfileCell {
        if ix >= self.x.n_bins || iy >= self.y.n_bins {
            return ProfileCell::default();
        }
        self.cells[ix * self.y.n_bins + iy]
    }

    /// The x axis.
    pub fn x_axis(&self) -> &Axis {
        &self.x
    }

    /// The y axis.
    pub fn y_axis(&self) -> &Axis {
        &self.y
    }

    /// Fills dropped because a coordinate or the value was NaN.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl Accumulator for Profile2D {
    type Snapshot = Profile2DSnapshot;

    fn name(&self) -> &str {
        &self.name
    }

    fn entries(&self) -> u64 {
        self.entries
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn finalize(&mut self) -> Profile2DSnapshot {
        self.closed = true;
        Profile2DSnapshot {
            name: self.name.clone(),
            x: self.x.snapshot(),
            y: self.y.snapshot(),
            value_label: self.value_label.clone(),
            cells: self.cells.clone(),
            x_flow: self.x_flow,
            y_flow: self.y_flow,
            rejected: self.rejected,
            entries: self.entries,
        }
    }

    fn merged(&self, other: &Self) -> Result<Self> {
        check_same(&self.name, &other.name, &[(&self.x, &other.x), (&self.y, &other.y)])?;
        Ok(Self {
            name: self.name.clone(),
            x: self.x.clone(),
            y: self.y.clone(),
            value_label: self.value_label.clone(),
            cells: self.cells.iter().zip(&other.cells).map(|(a, b)| a.combine(*b)).collect(),
            x_flow: self.x_flow.merged(other.x_flow),
            y_flow: self.y_flow.merged(other.y_flow),
            rejected: self.rejected + other.rejected,
            entries: self.entries + other.entries,
            closed: false,
        })
    }
}
