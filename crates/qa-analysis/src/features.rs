//! Feature taxonomy: the closed set of per-event scalars and their domains.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;

/// Count-like features: detector multiplicities and signal sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountFeature {
    /// Selected hits in the TOF wall.
    HitsTof,
    /// Selected hits in the RPC wall.
    HitsRpc,
    /// Selected MDC tracks.
    TracksMdc,
    /// Forward-wall signal summed over all hits.
    FwAllSignal,
    /// Forward-wall signal in rings 0-5.
    Fw1Signal,
    /// Forward-wall signal in rings 6-7.
    Fw2Signal,
    /// Forward-wall signal in rings 8-10.
    Fw3Signal,
    /// Charged pion tracks.
    Pions,
    /// Helium-isotope tracks.
    Helium,
}

impl CountFeature {
    /// Every count feature, in domain order.
    pub const ALL: [CountFeature; 9] = [
        CountFeature::HitsTof,
        CountFeature::HitsRpc,
        CountFeature::TracksMdc,
        CountFeature::FwAllSignal,
        CountFeature::Fw1Signal,
        CountFeature::Fw2Signal,
        CountFeature::Fw3Signal,
        CountFeature::Pions,
        CountFeature::Helium,
    ];

    /// Machine name, also the axis name.
    pub fn name(self) -> &'static str {
        match self {
            CountFeature::HitsTof => "hits_tof",
            CountFeature::HitsRpc => "hits_rpc",
            CountFeature::TracksMdc => "tracks_mdc",
            CountFeature::FwAllSignal => "fw_all_signal",
            CountFeature::Fw1Signal => "fw1_signal",
            CountFeature::Fw2Signal => "fw2_signal",
            CountFeature::Fw3Signal => "fw3_signal",
            CountFeature::Pions => "pions",
            CountFeature::Helium => "helium",
        }
    }

    /// Whether the feature belongs to the optional particle-abundance group.
    pub fn is_abundance(self) -> bool {
        matches!(self, CountFeature::Pions | CountFeature::Helium)
    }
}

/// Kinematic aggregates computed over the tracks of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KinematicFeature {
    /// Energy anisotropy `Σ E sinθ / Σ E cosθ`.
    Erat,
    /// Momentum anisotropy `Σ p^k sinθ / Σ p^k cosθ`.
    Prat,
    /// Mean transverse momentum.
    MeanPt,
    /// Mean longitudinal momentum.
    MeanPz,
    /// Mean lab rapidity (or its second moment).
    MeanY,
    /// Mean polar angle.
    MeanTheta,
    /// Efficiency-weighted mean proton rapidity in the centre-of-mass frame.
    MeanYcm,
    /// Unweighted mean proton rapidity in the centre-of-mass frame.
    MeanYcmNoEff,
    /// Efficiency-weighted backward minus forward proton count.
    BwVsFw,
    /// Unweighted backward minus forward proton count.
    BwVsFwNoEff,
}

impl KinematicFeature {
    /// Every kinematic feature, in domain order.
    pub const ALL: [KinematicFeature; 10] = [
        KinematicFeature::Erat,
        KinematicFeature::Prat,
        KinematicFeature::MeanPt,
        KinematicFeature::MeanPz,
        KinematicFeature::MeanY,
        KinematicFeature::MeanTheta,
        KinematicFeature::MeanYcm,
        KinematicFeature::MeanYcmNoEff,
        KinematicFeature::BwVsFw,
        KinematicFeature::BwVsFwNoEff,
    ];

    /// Machine name, also the axis name.
    pub fn name(self) -> &'static str {
        match self {
            KinematicFeature::Erat => "erat",
            KinematicFeature::Prat => "prat",
            KinematicFeature::MeanPt => "mean_pt",
            KinematicFeature::MeanPz => "mean_pz",
            KinematicFeature::MeanY => "mean_y",
            KinematicFeature::MeanTheta => "mean_theta",
            KinematicFeature::MeanYcm => "mean_protons_ycm",
            KinematicFeature::MeanYcmNoEff => "no_eff_mean_protons_ycm",
            KinematicFeature::BwVsFw => "bw_vs_fw_protons",
            KinematicFeature::BwVsFwNoEff => "no_eff_bw_vs_fw_protons",
        }
    }

    /// Whether the feature belongs to the optional centre-of-mass rapidity group.
    pub fn is_cm_rapidity(self) -> bool {
        matches!(
            self,
            KinematicFeature::MeanYcm
                | KinematicFeature::MeanYcmNoEff
                | KinematicFeature::BwVsFw
                | KinematicFeature::BwVsFwNoEff
        )
    }
}

/// Identifier of any feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureId {
    /// A count-like feature.
    Count(CountFeature),
    /// A kinematic aggregate.
    Kinematic(KinematicFeature),
}

impl FeatureId {
    /// Machine name.
    pub fn name(self) -> &'static str {
        match self {
            FeatureId::Count(c) => c.name(),
            FeatureId::Kinematic(k) => k.name(),
        }
    }

    /// Every feature in the taxonomy: counts first, then kinematics.
    pub fn all() -> impl Iterator<Item = FeatureId> {
        CountFeature::ALL
            .into_iter()
            .map(FeatureId::Count)
            .chain(KinematicFeature::ALL.into_iter().map(FeatureId::Kinematic))
    }
}

impl From<CountFeature> for FeatureId {
    fn from(c: CountFeature) -> Self {
        FeatureId::Count(c)
    }
}

impl From<KinematicFeature> for FeatureId {
    fn from(k: KinematicFeature) -> Self {
        FeatureId::Kinematic(k)
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The two feature domains enabled for a run, each in fixed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDomains {
    /// Count-like features.
    pub counts: Vec<FeatureId>,
    /// Kinematic aggregates.
    pub kinematics: Vec<FeatureId>,
}

impl FeatureDomains {
    /// Domains selected by the optional feature-group flags of `config`.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let counts = CountFeature::ALL
            .into_iter()
            .filter(|c| config.particle_abundance || !c.is_abundance())
            .map(FeatureId::Count)
            .collect();
        let kinematics = KinematicFeature::ALL
            .into_iter()
            .filter(|k| config.cm_rapidity || !k.is_cm_rapidity())
            .map(FeatureId::Kinematic)
            .collect();
        Self { counts, kinematics }
    }
}

/// Feature values of one event.
///
/// A feature is absent when it is undefined for the event (e.g. track means
/// of an event without tracks). An empty map means the event was rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMap {
    values: BTreeMap<FeatureId, f64>,
}

impl FeatureMap {
    /// Empty map (rejected event).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a feature value.
    pub fn insert(&mut self, id: impl Into<FeatureId>, value: f64) {
        self.values.insert(id.into(), value);
    }

    /// Value of a feature, if defined for this event.
    pub fn get(&self, id: impl Into<FeatureId>) -> Option<f64> {
        self.values.get(&id.into()).copied()
    }

    /// Whether the map holds no features.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of defined features.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate `(feature, value)` in taxonomy order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}
