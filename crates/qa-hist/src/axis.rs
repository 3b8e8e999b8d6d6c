//! Uniform binning of one coordinate.

use qa_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Uniform binning specification: `n_bins` equal-width bins on `[min, max)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Short machine name (used to build accumulator names).
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Number of bins.
    pub n_bins: usize,
    /// Lower edge of the first bin.
    pub min: f64,
    /// Upper edge of the last bin.
    pub max: f64,
}

/// Where a coordinate fell relative to the axis range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Inside `[min, max]`.
    InRange,
    /// Below `min`, saturated into the first bin.
    Underflow,
    /// Above `max`, saturated into the last bin.
    Overflow,
}

/// Bin index of a coordinate plus its flow classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    /// Bin index in `0..n_bins`.
    pub index: usize,
    /// Whether the coordinate was clamped.
    pub flow: Flow,
}

/// Counts of clamped fills on one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowTally {
    /// Fills below `min`.
    pub underflow: u64,
    /// Fills above `max`.
    pub overflow: u64,
}

impl FlowTally {
    pub(crate) fn record(&mut self, flow: Flow) {
        match flow {
            Flow::InRange => {}
            Flow::Underflow => self.underflow += 1,
            Flow::Overflow => self.overflow += 1,
        }
    }

    pub(crate) fn merged(self, other: FlowTally) -> FlowTally {
        FlowTally {
            underflow: self.underflow + other.underflow,
            overflow: self.overflow + other.overflow,
        }
    }
}

impl Axis {
    /// Create a validated axis.
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        n_bins: usize,
        min: f64,
        max: f64,
    ) -> Result<Self> {
        let name = name.into();
        if n_bins == 0 {
            return Err(Error::Validation(format!("axis '{name}' has zero bins")));
        }
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(Error::Validation(format!(
                "axis '{name}' needs finite bounds with min < max, got [{min}, {max})"
            )));
        }
        Ok(Self { name, label: label.into(), n_bins, min, max })
    }

    /// Bin width.
    pub fn width(&self) -> f64 {
        (self.max - self.min) / self.n_bins as f64
    }

    /// Bin edges (length = `n_bins + 1`).
    pub fn bin_edges(&self) -> Vec<f64> {
        let w = self.width();
        let mut edges: Vec<f64> = (0..self.n_bins).map(|i| self.min + i as f64 * w).collect();
        edges.push(self.max);
        edges
    }

    /// Locate `v` on the axis.
    ///
    /// Index is `clamp(floor((v - min) / (max - min) * n_bins), 0, n_bins - 1)`.
    /// `v == max` lands in the last bin and counts as in range. Returns `None`
    /// for NaN, which has no position.
    pub fn locate(&self, v: f64) -> Option<Located> {
        if v.is_nan() {
            return None;
        }
        let last = self.n_bins - 1;
        if v < self.min {
            return Some(Located { index: 0, flow: Flow::Underflow });
        }
        if v > self.max {
            return Some(Located { index: last, flow: Flow::Overflow });
        }
        let raw = ((v - self.min) / (self.max - self.min) * self.n_bins as f64).floor();
        let index = (raw as usize).min(last);
        Some(Located { index, flow: Flow::InRange })
    }

    /// Serializable description including bin edges.
    pub fn snapshot(&self) -> AxisSnapshot {
        AxisSnapshot {
            name: self.name.clone(),
            label: self.label.clone(),
            n_bins: self.n_bins,
            min: self.min,
            max: self.max,
            bin_edges: self.bin_edges(),
        }
    }
}

/// Axis metadata as written to the output bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSnapshot {
    /// Axis name.
    pub name: String,
    /// Axis label.
    pub label: String,
    /// Number of bins.
    pub n_bins: usize,
    /// Lower edge of the first bin.
    pub min: f64,
    /// Upper edge of the last bin.
    pub max: f64,
    /// Bin edges (length = n_bins + 1).
    pub bin_edges: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> Axis {
        Axis::new("x", "x", 4, 0.0, 2.0).unwrap()
    }

    #[test]
    fn locate_edge_cases() {
        let a = axis();
        assert_eq!(a.locate(0.0), Some(Located { index: 0, flow: Flow::InRange }));
        assert_eq!(a.locate(0.5), Some(Located { index: 1, flow: Flow::InRange }));
        assert_eq!(a.locate(1.99), Some(Located { index: 3, flow: Flow::InRange }));
        assert_eq!(a.locate(2.0), Some(Located { index: 3, flow: Flow::InRange }));
        assert_eq!(a.locate(-0.1), Some(Located { index: 0, flow: Flow::Underflow }));
        assert_eq!(a.locate(7.0), Some(Located { index: 3, flow: Flow::Overflow }));
        assert_eq!(a.locate(f64::INFINITY).map(|l| l.index), Some(3));
        assert_eq!(a.locate(f64::NEG_INFINITY).map(|l| l.index), Some(0));
        assert_eq!(a.locate(f64::NAN), None);
    }

    #[test]
    fn edges() {
        assert_eq!(axis().bin_edges(), vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn rejects_bad_bounds() {
        assert!(Axis::new("x", "x", 0, 0.0, 1.0).is_err());
        assert!(Axis::new("x", "x", 10, 1.0, 1.0).is_err());
        assert!(Axis::new("x", "x", 10, 0.0, f64::INFINITY).is_err());
        let err = Axis::new("vtx_z", "", 10, 2.0, -1.0).unwrap_err();
        assert!(err.to_string().contains("vtx_z"));
    }
}
