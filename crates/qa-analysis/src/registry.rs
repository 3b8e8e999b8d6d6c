//! Axis registry: the single source of binning for every feature.

use std::collections::HashMap;

use qa_core::{Error, Result};
use qa_hist::Axis;

use crate::features::{CountFeature, FeatureId, KinematicFeature};

/// Immutable map from feature to its axis.
#[derive(Debug, Clone)]
pub struct AxisRegistry {
    axes: HashMap<FeatureId, Axis>,
}

impl AxisRegistry {
    /// Build a registry from `(feature, axis)` entries.
    ///
    /// Each feature may be registered once, and the axis name must equal the
    /// feature name. Axes are re-validated, so deserialized or hand-built
    /// axes get the same checks as [`Axis::new`].
    pub fn from_entries(entries: impl IntoIterator<Item = (FeatureId, Axis)>) -> Result<Self> {
        let mut axes = HashMap::new();
        for (id, axis) in entries {
            let axis = Axis::new(axis.name, axis.label, axis.n_bins, axis.min, axis.max)?;
            if axis.name != id.name() {
                return Err(Error::Validation(format!(
                    "axis '{}' registered for feature '{id}'",
                    axis.name
                )));
            }
            if axes.insert(id, axis).is_some() {
                return Err(Error::Validation(format!("feature '{id}' registered twice")));
            }
        }
        Ok(Self { axes })
    }

    /// Registry covering the full feature taxonomy.
    pub fn standard() -> Result<Self> {
        let entries = FeatureId::all()
            .map(|id| standard_axis(id).map(|axis| (id, axis)))
            .collect::<Result<Vec<_>>>()?;
        Self::from_entries(entries)
    }

    /// Axis of `id`.
    pub fn axis_for(&self, id: FeatureId) -> Result<&Axis> {
        self.axes.get(&id).ok_or_else(|| Error::UnknownFeature(id.name().to_string()))
    }

    /// Number of registered features.
    pub fn len(&self) -> usize {
        self.axes.len()
    }

    /// Whether no feature is registered.
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }
}

fn standard_axis(id: FeatureId) -> Result<Axis> {
    let (label, n_bins, min, max) = match id {
        FeatureId::Count(c) => match c {
            CountFeature::HitsTof => ("N hits TOF", 100, 0.0, 100.0),
            CountFeature::HitsRpc => ("N hits RPC", 200, 0.0, 200.0),
            CountFeature::TracksMdc => ("N tracks MDC", 200, 0.0, 200.0),
            CountFeature::FwAllSignal => ("FW-all signal", 200, 0.0, 10000.0),
            CountFeature::Fw1Signal => ("FW 1 signal", 200, 0.0, 10000.0),
            CountFeature::Fw2Signal => ("FW 2 signal", 200, 0.0, 10000.0),
            CountFeature::Fw3Signal => ("FW 3 signal", 200, 0.0, 10000.0),
            CountFeature::Pions => ("N #pi^{#pm}", 100, 0.0, 100.0),
            CountFeature::Helium => ("N He", 20, 0.0, 20.0),
        },
        FeatureId::Kinematic(k) => match k {
            KinematicFeature::Erat => ("ERAT", 200, 0.0, 2.0),
            KinematicFeature::Prat => ("PRAT", 200, 0.0, 2.0),
            KinematicFeature::MeanPt => ("<p_{T}> [GeV/c]", 200, 0.0, 2.0),
            KinematicFeature::MeanPz => ("<p_{z}> [GeV/c]", 200, 0.0, 2.0),
            KinematicFeature::MeanY => ("<y>", 200, 0.0, 2.0),
            KinematicFeature::MeanTheta => ("<#theta> [rad]", 200, 0.0, 2.0),
            KinematicFeature::MeanYcm | KinematicFeature::MeanYcmNoEff => {
                ("<y_{cm}>", 200, -1.0, 1.0)
            }
            KinematicFeature::BwVsFw | KinematicFeature::BwVsFwNoEff => ("BW-FW", 60, -30.0, 30.0),
        },
    };
    Axis::new(id.name(), label, n_bins, min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_covers_taxonomy() {
        let reg = AxisRegistry::standard().unwrap();
        assert_eq!(reg.len(), FeatureId::all().count());
        for id in FeatureId::all() {
            assert_eq!(reg.axis_for(id).unwrap().name, id.name());
        }
        let fw = reg.axis_for(CountFeature::Fw2Signal.into()).unwrap();
        assert_eq!((fw.n_bins, fw.min, fw.max), (200, 0.0, 10000.0));
    }

    #[test]
    fn unknown_feature() {
        let reg = AxisRegistry::from_entries(Vec::new()).unwrap();
        let err = reg.axis_for(KinematicFeature::Erat.into()).unwrap_err();
        assert!(matches!(err, Error::UnknownFeature(ref n) if n == "erat"));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let id: FeatureId = CountFeature::HitsTof.into();
        let axis = Axis::new("hits_tof", "", 10, 0.0, 10.0).unwrap();
        let err = AxisRegistry::from_entries([(id, axis.clone()), (id, axis)]).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn unchecked_axis_rejected() {
        let id: FeatureId = CountFeature::HitsTof.into();
        let zero_bins =
            Axis { name: "hits_tof".into(), label: String::new(), n_bins: 0, min: 0.0, max: 10.0 };
        let err = AxisRegistry::from_entries([(id, zero_bins)]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let inverted =
            Axis { name: "hits_tof".into(), label: String::new(), n_bins: 10, min: 5.0, max: 1.0 };
        assert!(matches!(AxisRegistry::from_entries([(id, inverted)]), Err(Error::Validation(_))));
    }
}
