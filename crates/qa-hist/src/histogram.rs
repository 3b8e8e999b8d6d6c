//! Frequency tables: 1D and 2D histograms with saturating edge bins.

use qa_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::Accumulator;
use crate::axis::{Axis, AxisSnapshot, FlowTally};

/// A 1D frequency table.
#[derive(Debug, Clone)]
pub struct Hist1D {
    name: String,
    x: Axis,
    counts: Vec<u64>,
    flow: FlowTally,
    rejected: u64,
    entries: u64,
    closed: bool,
}

/// Finalized 1D histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist1DSnapshot {
    /// Histogram name.
    pub name: String,
    /// x axis.
    pub x: AxisSnapshot,
    /// Bin counts (length = `x.n_bins`), edge bins include saturated fills.
    pub counts: Vec<u64>,
    /// Fills clamped on x.
    pub x_flow: FlowTally,
    /// Fills dropped because the coordinate was NaN.
    pub rejected: u64,
    /// Total binned fills.
    pub entries: u64,
}

impl Hist1D {
    /// Create an empty histogram.
    pub fn new(name: impl Into<String>, x: Axis) -> Self {
        let counts = vec![0; x.n_bins];
        Self {
            name: name.into(),
            x,
            counts,
            flow: FlowTally::default(),
            rejected: 0,
            entries: 0,
            closed: false,
        }
    }

    /// Increment the bin containing `x`.
    pub fn fill(&mut self, x: f64) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedAccumulator(self.name.clone()));
        }
        let Some(loc) = self.x.locate(x) else {
            self.rejected += 1;
            return Ok(());
        };
        self.flow.record(loc.flow);
        self.counts[loc.index] += 1;
        self.entries += 1;
        Ok(())
    }

    /// The x axis.
    pub fn x_axis(&self) -> &Axis {
        &self.x
    }

    /// Bin counts.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Fills dropped because the coordinate was NaN.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Under/overflow tally.
    pub fn flow(&self) -> FlowTally {
        self.flow
    }
}

impl Accumulator for Hist1D {
    type Snapshot = Hist1DSnapshot;

    fn name(&self) -> &str {
        &self.name
    }

    fn entries(&self) -> u64 {
        self.entries
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn finalize(&mut self) -> Hist1DSnapshot {
        self.closed = true;
        Hist1DSnapshot {
            name: self.name.clone(),
            x: self.x.snapshot(),
            counts: self.counts.clone(),
            x_flow: self.flow,
            rejected: self.rejected,
            entries: self.entries,
        }
    }

    fn merged(&self, other: &Self) -> Result<Self> {
        check_same(&self.name, &other.name, &[(&self.x, &other.x)])?;
        Ok(Self {
            name: self.name.clone(),
            x: self.x.clone(),
            counts: self.counts.iter().zip(&other.counts).map(|(a, b)| a + b).collect(),
            flow: self.flow.merged(other.flow),
            rejected: self.rejected + other.rejected,
            entries: self.entries + other.entries,
            closed: false,
        })
    }
}

/// A 2D frequency table. Cells are stored row-major in x.
#[derive(Debug, Clone)]
pub struct Hist2D {
    name: String,
    x: Axis,
    y: Axis,
    counts: Vec<u64>,
    x_flow: FlowTally,
    y_flow: FlowTally,
    rejected: u64,
    entries: u64,
    closed: bool,
}

/// Finalized 2D histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist2DSnapshot {
    /// Histogram name.
    pub name: String,
    /// x axis.
    pub x: AxisSnapshot,
    /// y axis.
    pub y: AxisSnapshot,
    /// Cell counts, index `ix * y.n_bins + iy`.
    pub counts: Vec<u64>,
    /// Fills clamped on x.
    pub x_flow: FlowTally,
    /// Fills clamped on y.
    pub y_flow: FlowTally,
    /// Fills dropped because a coordinate was NaN.
    pub rejected: u64,
    /// Total binned fills.
    pub entries: u64,
}

impl Hist2D {
    /// Create an empty histogram.
    pub fn new(name: impl Into<String>, x: Axis, y: Axis) -> Self {
        let counts = vec![0; x.n_bins * y.n_bins];
        Self {
            name: name.into(),
            x,
            y,
            counts,
            x_flow: FlowTally::default(),
            y_flow: FlowTally::default(),
            rejected: 0,
            entries: 0,
            closed: false,
        }
    }

    /// Increment the cell containing `(x, y)`.
    pub fn fill(&mut self, x: f64, y: f64) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedAccumulator(self.name.clone()));
        }
        let (Some(lx), Some(ly)) = (self.x.locate(x), self.y.locate(y)) else {
            self.rejected += 1;
            return Ok(());
        };
        self.x_flow.record(lx.flow);
        self.y_flow.record(ly.flow);
        self.counts[lx.index * self.y.n_bins + ly.index] += 1;
        self.entries += 1;
        Ok(())
    }

    /// Count in cell `(ix, iy)`; zero for indices outside the grid.
    pub fn count(&self, ix: usize, iy: usize) -> u64 {
        if ix >= self.x.n_bins || iy >= self.y.n_bins {
            return 0;
        }
        self.counts[ix * self.y.n_bins + iy]
    }

    /// Sum over all cells.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// The x axis.
    pub fn x_axis(&self) -> &Axis {
        &self.x
    }

    /// The y axis.
    pub fn y_axis(&self) -> &Axis {
        &self.y
    }

    /// Fills dropped because a coordinate was NaN.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl Accumulator for Hist2D {
    type Snapshot = Hist2DSnapshot;

    fn name(&self) -> &str {
        &self.name
    }

    fn entries(&self) -> u64 {
        self.entries
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn finalize(&mut self) -> Hist2DSnapshot {
        self.closed = true;
        Hist2DSnapshot {
            name: self.name.clone(),
            x: self.x.snapshot(),
            y: self.y.snapshot(),
            counts: self.counts.clone(),
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
            counts: self.counts.iter().zip(&other.counts).map(|(a, b)| a + b).collect(),
            x_flow: self.x_flow.merged(other.x_flow),
            y_flow: self.y_flow.merged(other.y_flow),
            rejected: self.rejected + other.rejected,
            entries: self.entries + other.entries,
            closed: false,
        })
    }
}

/// Reject merges of accumulators that do not share name and binning.
pub(crate) fn check_same(a: &str, b: &str, axes: &[(&Axis, &Axis)]) -> Result<()> {
    if a != b {
        return Err(Error::ConfigurationMismatch(format!(
            "cannot merge '{a}' with '{b}': names differ"
        )));
    }
    for (l, r) in axes {
        if l != r {
            return Err(Error::ConfigurationMismatch(format!(
                "cannot merge '{a}': axis {}[{}; {}, {}) vs {}[{}; {}, {})",
                l.name, l.n_bins, l.min, l.max, r.name, r.n_bins, r.min, r.max
            )));
        }
    }
    Ok(())
}
