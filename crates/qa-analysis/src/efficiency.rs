//! Optional reconstruction-efficiency table used to weight protons.

use std::path::Path;

use qa_core::{Error, Result};
use qa_hist::Axis;
use serde::{Deserialize, Serialize};

/// Efficiency map over `(x, y)`, typically `(y_cm, p_T)`. Coordinates outside
/// the table saturate to the edge cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyTable {
    x: Axis,
    y: Axis,
    /// Row-major in x: `values[ix * y.n_bins + iy]`.
    values: Vec<f64>,
}

impl EfficiencyTable {
    /// Build a table; `values.len()` must be `x.n_bins * y.n_bins`.
    pub fn new(x: Axis, y: Axis, values: Vec<f64>) -> Result<Self> {
        let table = Self { x, y, values };
        table.validate()?;
        Ok(table)
    }

    /// Load a table from JSON (`{"x": axis, "y": axis, "values": [...]}`).
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let table: EfficiencyTable = serde_json::from_str(&text)?;
        table.validate()?;
        log::info!(
            "loaded efficiency table {} ({}x{} cells)",
            path.as_ref().display(),
            table.x.n_bins,
            table.y.n_bins
        );
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        Axis::new(self.x.name.clone(), "", self.x.n_bins, self.x.min, self.x.max)?;
        Axis::new(self.y.name.clone(), "", self.y.n_bins, self.y.min, self.y.max)?;
        let expected = self.x.n_bins * self.y.n_bins;
        if self.values.len() != expected {
            return Err(Error::Validation(format!(
                "efficiency table has {} values, expected {expected}",
                self.values.len()
            )));
        }
        Ok(())
    }

    /// Efficiency at `(x, y)`; `None` for NaN coordinates.
    pub fn efficiency(&self, x: f64, y: f64) -> Option<f64> {
        let ix = self.x.locate(x)?.index;
        let iy = self.y.locate(y)?.index;
        Some(self.values[ix * self.y.n_bins + iy])
    }

    /// Correction weight `1 / efficiency`, or `None` where the efficiency is
    /// not positive.
    pub fn weight(&self, x: f64, y: f64) -> Option<f64> {
        match self.efficiency(x, y) {
            Some(eff) if eff > 0.0 => Some(1.0 / eff),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> EfficiencyTable {
        let x = Axis::new("ycm", "y_{cm}", 2, -1.0, 1.0).unwrap();
        let y = Axis::new("pt", "p_{T}", 2, 0.0, 2.0).unwrap();
        EfficiencyTable::new(x, y, vec![0.5, 0.25, 0.0, 0.8]).unwrap()
    }

    #[test]
    fn lookup_and_weight() {
        let t = table();
        assert_eq!(t.efficiency(-0.5, 0.5), Some(0.5));
        assert_eq!(t.efficiency(-0.5, 1.5), Some(0.25));
        assert_eq!(t.weight(-0.5, 1.5), Some(4.0));
        assert_eq!(t.weight(0.5, 0.5), None);
        assert_eq!(t.efficiency(5.0, 5.0), Some(0.8));
        assert_eq!(t.efficiency(f64::NAN, 0.5), None);
    }

    #[test]
    fn size_mismatch() {
        let x = Axis::new("ycm", "", 2, -1.0, 1.0).unwrap();
        let y = Axis::new("pt", "", 3, 0.0, 2.0).unwrap();
        assert!(EfficiencyTable::new(x, y, vec![1.0; 4]).is_err());
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eff.json");
        std::fs::write(&path, serde_json::to_string(&table()).unwrap()).unwrap();
        assert_eq!(EfficiencyTable::from_json_path(&path).unwrap(), table());
    }
}
