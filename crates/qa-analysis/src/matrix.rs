//! Pairwise accumulator matrices over feature domains.
//!
//! A triangular matrix holds one [`Hist2D`] per unordered pair `(i, j)`,
//! `i` before `j` in domain order; a cross matrix holds one per element of
//! the product of two disjoint domains. Both are built once from the axis
//! registry and never grow.

use std::collections::{HashMap, HashSet};

use qa_core::{Error, Result};
use qa_hist::{Accumulator, Hist2D, Hist2DSnapshot};

use crate::features::{FeatureId, FeatureMap};
use crate::registry::AxisRegistry;

/// How pairs are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairLayout {
    /// Unordered pairs within one domain, no self-pairs.
    Triangular,
    /// Every (row, column) combination of two domains.
    Cross,
}

/// One 2D histogram per feature pair.
#[derive(Debug, Clone)]
pub struct PairMatrix {
    name: String,
    layout: PairLayout,
    pairs: Vec<(FeatureId, FeatureId)>,
    cells: Vec<Hist2D>,
    index: HashMap<(FeatureId, FeatureId), usize>,
}

impl PairMatrix {
    /// Unordered pairs of `domain`.
    pub fn triangular(name: impl Into<String>, registry: &AxisRegistry, domain: &[FeatureId]) -> Result<Self> {
        check_distinct(domain)?;
        let pairs = domain
            .iter()
            .enumerate()
            .flat_map(|(i, &a)| domain[i + 1..].iter().map(move |&b| (a, b)))
            .collect();
        Self::build(name.into(), PairLayout::Triangular, registry, pairs)
    }

    /// Every `(row, column)` pair of two disjoint domains.
    pub fn cross(
        name: impl Into<String>,
        registry: &AxisRegistry,
        rows: &[FeatureId],
        columns: &[FeatureId],
    ) -> Result<Self> {
        let both: Vec<FeatureId> = rows.iter().chain(columns).copied().collect();
        check_distinct(&both)?;
        let pairs = rows.iter().flat_map(|&a| columns.iter().map(move |&b| (a, b))).collect();
        Self::build(name.into(), PairLayout::Cross, registry, pairs)
    }

    fn build(
        name: String,
        layout: PairLayout,
        registry: &AxisRegistry,
        pairs: Vec<(FeatureId, FeatureId)>,
    ) -> Result<Self> {
        let cells = pairs
            .iter()
            .map(|&(a, b)| {
                let x = registry.axis_for(a)?.clone();
                let y = registry.axis_for(b)?.clone();
                Ok(Hist2D::new(format!("{a}_{b}"), x, y))
            })
            .collect::<Result<Vec<_>>>()?;
        let index = pairs.iter().enumerate().map(|(i, &p)| (p, i)).collect();
        Ok(Self { name, layout, pairs, cells, index })
    }

    /// Matrix name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pair layout.
    pub fn layout(&self) -> PairLayout {
        self.layout
    }

    /// Number of accumulators.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the matrix holds no accumulator.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Pairs in fill order.
    pub fn pairs(&self) -> &[(FeatureId, FeatureId)] {
        &self.pairs
    }

    fn slot(&self, a: FeatureId, b: FeatureId) -> Result<usize> {
        self.index.get(&(a, b)).copied().ok_or_else(|| Error::UnknownPair {
            first: a.name().to_string(),
            second: b.name().to_string(),
        })
    }

    /// Accumulator of `(a, b)`. Order matters: `a` is the x axis.
    pub fn get(&self, a: FeatureId, b: FeatureId) -> Result<&Hist2D> {
        Ok(&self.cells[self.slot(a, b)?])
    }

    /// Fill every pair whose two features are both defined in `features`.
    /// Returns the number of accumulators filled.
    pub fn fill(&mut self, features: &FeatureMap) -> Result<usize> {
        let mut filled = 0;
        for (cell, &(a, b)) in self.cells.iter_mut().zip(&self.pairs) {
            let (Some(x), Some(y)) = (features.get(a), features.get(b)) else {
                continue;
            };
            cell.fill(x, y)?;
            filled += 1;
        }
        Ok(filled)
    }

    /// Close every accumulator and return their snapshots in pair order.
    pub fn finalize(&mut self) -> Vec<Hist2DSnapshot> {
        self.cells.iter_mut().map(Accumulator::finalize).collect()
    }

    /// Cell-wise merge of two matrices with the same pairs.
    pub fn merged(&self, other: &Self) -> Result<Self> {
        if self.name != other.name || self.layout != other.layout || self.pairs != other.pairs {
            return Err(Error::ConfigurationMismatch(format!(
                "cannot merge matrix '{}' ({} pairs) with '{}' ({} pairs)",
                self.name,
                self.pairs.len(),
                other.name,
                other.pairs.len()
            )));
        }
        let cells = self
            .cells
            .iter()
            .zip(&other.cells)
            .map(|(a, b)| a.merged(b))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: self.name.clone(),
            layout: self.layout,
            pairs: self.pairs.clone(),
            cells,
            index: self.index.clone(),
        })
    }
}

fn check_distinct(features: &[FeatureId]) -> Result<()> {
    let mut seen = HashSet::with_capacity(features.len());
    for f in features {
        if !seen.insert(*f) {
            return Err(Error::Validation(format!("feature '{f}' appears twice in a matrix domain")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{CountFeature, KinematicFeature};

    fn counts() -> Vec<FeatureId> {
        [CountFeature::HitsTof, CountFeature::HitsRpc, CountFeature::TracksMdc, CountFeature::FwAllSignal]
            .into_iter()
            .map(FeatureId::from)
            .collect()
    }

    fn kinematics() -> Vec<FeatureId> {
        [KinematicFeature::Erat, KinematicFeature::MeanPt].into_iter().map(FeatureId::from).collect()
    }

    #[test]
    fn triangular_has_no_self_or_mirror_pairs() {
        let reg = AxisRegistry::standard().unwrap();
        let m = PairMatrix::triangular("counts", &reg, &counts()).unwrap();
        assert_eq!(m.len(), 6);
        let tof: FeatureId = CountFeature::HitsTof.into();
        let rpc: FeatureId = CountFeature::HitsRpc.into();
        assert!(m.get(tof, rpc).is_ok());
        assert!(matches!(m.get(rpc, tof), Err(Error::UnknownPair { .. })));
        assert!(matches!(m.get(tof, tof), Err(Error::UnknownPair { .. })));
        assert_eq!(m.get(tof, rpc).unwrap().name(), "hits_tof_hits_rpc");
    }

    #[test]
    fn cross_covers_product() {
        let reg = AxisRegistry::standard().unwrap();
        let m = PairMatrix::cross("counts_kinematics", &reg, &counts(), &kinematics()).unwrap();
        assert_eq!(m.len(), 8);
        for &a in &counts() {
            for &b in &kinematics() {
                let h = m.get(a, b).unwrap();
                assert_eq!(h.x_axis().name, a.name());
                assert_eq!(h.y_axis().name, b.name());
            }
        }
    }

    #[test]
    fn duplicate_domain_rejected() {
        let reg = AxisRegistry::standard().unwrap();
        let mut d = counts();
        d.push(d[0]);
        assert!(PairMatrix::triangular("c", &reg, &d).is_err());
        assert!(PairMatrix::cross("c", &reg, &counts(), &counts()).is_err());
    }

    #[test]
    fn unregistered_feature_fails_build() {
        let reg = AxisRegistry::from_entries(Vec::new()).unwrap();
        let err = PairMatrix::triangular("c", &reg, &counts()).unwrap_err();
        assert!(matches!(err, Error::UnknownFeature(_)));
    }

    #[test]
    fn fill_skips_undefined_features() {
        let reg = AxisRegistry::standard().unwrap();
        let mut m = PairMatrix::cross("ck", &reg, &counts(), &kinematics()).unwrap();
        let mut f = FeatureMap::new();
        for (i, c) in counts().into_iter().enumerate() {
            f.insert(c, i as f64);
        }
        assert_eq!(m.fill(&f).unwrap(), 0);
        f.insert(KinematicFeature::MeanPt, 0.4);
        assert_eq!(m.fill(&f).unwrap(), 4);
        let h = m.get(CountFeature::HitsRpc.into(), KinematicFeature::MeanPt.into()).unwrap();
        assert_eq!(h.count(1, 40), 1);
    }

    #[test]
    fn merge_checks_layout() {
        let reg = AxisRegistry::standard().unwrap();
        let a = PairMatrix::triangular("m", &reg, &counts()).unwrap();
        let b = PairMatrix::triangular("m", &reg, &counts()[..3]).unwrap();
        assert!(matches!(a.merged(&b), Err(Error::ConfigurationMismatch(_))));
        assert_eq!(a.merged(&a).unwrap().len(), 6);
    }
}
