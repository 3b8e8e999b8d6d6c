//! Run configuration: event selection and optional feature groups.

use std::path::Path;

use qa_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Which rapidity moment the `mean_y` feature reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RapidityMoment {
    /// `<y>`
    #[default]
    First,
    /// `<y^2>`
    Second,
}

/// Acceptance condition on one header value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CutKind {
    /// `v == value`
    Equals {
        /// Required value.
        value: f64,
    },
    /// `lo <= v < hi`
    Range {
        /// Inclusive lower bound.
        lo: f64,
        /// Exclusive upper bound.
        hi: f64,
    },
}

impl CutKind {
    /// Whether `v` passes.
    pub fn accepts(&self, v: f64) -> bool {
        match *self {
            CutKind::Equals { value } => v == value,
            CutKind::Range { lo, hi } => lo <= v && v < hi,
        }
    }
}

/// Event cut on a named header field. `vtx_x`, `vtx_y` and `vtx_z` address
/// the reconstructed vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderCut {
    /// Header field name.
    pub field: String,
    /// Condition.
    #[serde(flatten)]
    pub kind: CutKind,
}

impl HeaderCut {
    /// `lo <= field < hi`
    pub fn range(field: impl Into<String>, lo: f64, hi: f64) -> Self {
        Self { field: field.into(), kind: CutKind::Range { lo, hi } }
    }

    /// `field == value`
    pub fn equals(field: impl Into<String>, value: f64) -> Self {
        Self { field: field.into(), kind: CutKind::Equals { value } }
    }
}

/// Configuration of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Name of the output bundle.
    pub bundle_name: String,
    /// Header trigger flag that must be set for an event to be analysed.
    pub trigger_field: String,
    /// Additional event cuts, all of which must pass.
    pub cuts: Vec<HeaderCut>,
    /// Power `k` of the momentum in the PRAT sums (1 or 2).
    pub momentum_power: u32,
    /// Moment reported by `mean_y`.
    pub rapidity_moment: RapidityMoment,
    /// Enable pion/helium counts and the pion fraction distribution.
    pub particle_abundance: bool,
    /// Enable the proton centre-of-mass rapidity features.
    pub cm_rapidity: bool,
    /// Beam rapidity subtracted to go to the centre-of-mass frame.
    pub beam_rapidity: f64,
    /// Particle-type label of protons.
    pub proton_pid: i64,
    /// Particle-type labels counted as charged pions.
    pub pion_pids: Vec<i64>,
    /// Particle-type labels counted as helium isotopes.
    pub helium_pids: Vec<i64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bundle_name: "quality_assurance".into(),
            trigger_field: "physical_trigger_2".into(),
            cuts: Vec::new(),
            momentum_power: 1,
            rapidity_moment: RapidityMoment::First,
            particle_abundance: true,
            cm_rapidity: false,
            beam_rapidity: 0.74,
            proton_pid: 2212,
            pion_pids: vec![211, -211],
            helium_pids: vec![1000020030, 1000020040],
        }
    }
}

impl AnalysisConfig {
    /// Read a JSON configuration file. Missing keys take their default.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let cfg: AnalysisConfig = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.momentum_power, 1 | 2) {
            return Err(Error::Validation(format!(
                "momentum_power must be 1 or 2, got {}",
                self.momentum_power
            )));
        }
        if self.trigger_field.is_empty() {
            return Err(Error::Validation("trigger_field must not be empty".into()));
        }
        if !self.beam_rapidity.is_finite() {
            return Err(Error::Validation(format!(
                "beam_rapidity must be finite, got {}",
                self.beam_rapidity
            )));
        }
        for cut in &self.cuts {
            if let CutKind::Range { lo, hi } = cut.kind
                && (lo.is_nan() || hi.is_nan() || lo >= hi)
            {
                return Err(Error::Validation(format!(
                    "cut on '{}' has empty range [{lo}, {hi})",
                    cut.field
                )));
            }
        }
        Ok(())
    }
}
