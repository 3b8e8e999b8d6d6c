//! Run orchestration: per-event update of every accumulator and final
//! serialization.
//!
//! Lifecycle: [`Engine::new`] yields a `Ready` engine, each
//! [`Engine::process`] call moves it to (or keeps it in) `Processing`, and
//! [`Engine::finalize`] moves it to the terminal `Finalized` state.

use std::sync::Arc;

use qa_core::{Error, Result};
use qa_hist::{Accumulator, Axis, Hist1D, Hist2D, Profile2D};
use serde::Serialize;

use crate::bundle::{Bundle, BundleSink};
use crate::config::AnalysisConfig;
use crate::efficiency::EfficiencyTable;
use crate::event::{BranchSchema, Event};
use crate::extractor::{EventSummary, FeatureExtractor};
use crate::features::CountFeature;
use crate::matrix::PairMatrix;
use crate::registry::AxisRegistry;

/// Engine lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Built, no event seen yet.
    Ready,
    /// At least one event processed.
    Processing,
    /// Accumulators closed; terminal.
    Finalized,
}

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Trigger or cuts failed; nothing was filled.
    Rejected,
    /// Filled. `kinematics` is false when the event had no tracks and only
    /// count-like features were recorded.
    Accepted {
        /// Whether track aggregates were filled.
        kinematics: bool,
    },
}

/// Event counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Events passed to [`Engine::process`].
    pub events_seen: u64,
    /// Events passing trigger and cuts.
    pub events_selected: u64,
    /// Selected events without tracks.
    pub events_without_tracks: u64,
}

impl RunStats {
    fn merged(self, other: RunStats) -> RunStats {
        RunStats {
            events_seen: self.events_seen + other.events_seen,
            events_selected: self.events_selected + other.events_selected,
            events_without_tracks: self.events_without_tracks + other.events_without_tracks,
        }
    }
}

#[derive(Debug, Clone)]
struct Marginals {
    vtx_z: Hist1D,
    vtx_x_vtx_y: Hist2D,
    vtx_z_vtx_r: Hist2D,
    vtx_z_n_hits: Hist2D,
    pions_to_all_tracks: Option<Hist1D>,
}

impl Marginals {
    fn new(abundance: bool) -> Result<Self> {
        let vtx_z = || Axis::new("vtx_z", "VTX_{z} [mm]", 240, -100.0, 20.0);
        Ok(Self {
            vtx_z: Hist1D::new("vtx_z", vtx_z()?),
            vtx_x_vtx_y: Hist2D::new(
                "vtx_x_vtx_y",
                Axis::new("vtx_x", "VTX_{x} [mm]", 250, -10.0, 10.0)?,
                Axis::new("vtx_y", "VTX_{y} [mm]", 250, -10.0, 10.0)?,
            ),
            vtx_z_vtx_r: Hist2D::new(
                "vtx_z_vtx_r",
                vtx_z()?,
                Axis::new("vtx_r", "#sqrt{VTX_{x}^{2}+VTX_{y}^{2}} [mm]", 250, 0.0, 10.0)?,
            ),
            vtx_z_n_hits: Hist2D::new(
                "vtx_z_n_tracks",
                vtx_z()?,
                Axis::new("hits_tof_rpc", "Hits TOF+RPC", 250, 0.0, 250.0)?,
            ),
            pions_to_all_tracks: if abundance {
                Some(Hist1D::new(
                    "pions_to_all_tracks",
                    Axis::new("pion_fraction", "N_{#pi^{#pm}}/N_{tracks}", 100, 0.0, 1.0)?,
                ))
            } else {
                None
            },
        })
    }

    fn fill(&mut self, s: &EventSummary) -> Result<()> {
        let [x, y, z] = s.vertex;
        self.vtx_z.fill(z)?;
        self.vtx_x_vtx_y.fill(x, y)?;
        self.vtx_z_vtx_r.fill(z, x.hypot(y))?;
        let hits = s.features.get(CountFeature::HitsTof).unwrap_or(f64::NAN)
            + s.features.get(CountFeature::HitsRpc).unwrap_or(f64::NAN);
        self.vtx_z_n_hits.fill(z, hits)?;
        if let Some(h) = self.pions_to_all_tracks.as_mut()
            && s.n_tracks > 0
        {
            h.fill(s.n_pions as f64 / s.n_tracks as f64)?;
        }
        Ok(())
    }

    fn merged(&self, o: &Self) -> Result<Self> {
        let pions = match (&self.pions_to_all_tracks, &o.pions_to_all_tracks) {
            (Some(a), Some(b)) => Some(a.merged(b)?),
            (None, None) => None,
            _ => {
                return Err(Error::ConfigurationMismatch(
                    "pions_to_all_tracks present in one engine only".into(),
                ));
            }
        };
        Ok(Self {
            vtx_z: self.vtx_z.merged(&o.vtx_z)?,
            vtx_x_vtx_y: self.vtx_x_vtx_y.merged(&o.vtx_x_vtx_y)?,
            vtx_z_vtx_r: self.vtx_z_vtx_r.merged(&o.vtx_z_vtx_r)?,
            vtx_z_n_hits: self.vtx_z_n_hits.merged(&o.vtx_z_n_hits)?,
            pions_to_all_tracks: pions,
        })
    }
}

#[derive(Debug, Clone)]
struct ProtonProfiles {
    chi2: Profile2D,
    dca_xy: Profile2D,
    dca_z: Profile2D,
}

impl ProtonProfiles {
    fn new() -> Result<Self> {
        let y = || Axis::new("ycm", "y_{cm}", 100, -1.0, 1.0);
        let pt = || Axis::new("pt", "p_{T} [GeV/c]", 100, 0.0, 2.0);
        Ok(Self {
            chi2: Profile2D::new("pt_rapidity_chi2", y()?, pt()?, "#chi^{2}"),
            dca_xy: Profile2D::new("pt_rapidity_dca_xy", y()?, pt()?, "DCA_{xy}"),
            dca_z: Profile2D::new("pt_rapidity_dca_z", y()?, pt()?, "DCA_{z}"),
        })
    }

    fn fill(&mut self, s: &EventSummary) -> Result<()> {
        for p in &s.protons {
            self.chi2.fill(p.ycm, p.pt, p.chi2)?;
            self.dca_xy.fill(p.ycm, p.pt, p.dca_xy)?;
            self.dca_z.fill(p.ycm, p.pt, p.dca_z)?;
        }
        Ok(())
    }

    fn merged(&self, o: &Self) -> Result<Self> {
        Ok(Self {
            chi2: self.chi2.merged(&o.chi2)?,
            dca_xy: self.dca_xy.merged(&o.dca_xy)?,
            dca_z: self.dca_z.merged(&o.dca_z)?,
        })
    }
}

/// Owns the registry, the extractor and every accumulator of a run.
#[derive(Debug, Clone)]
pub struct Engine {
    config: AnalysisConfig,
    registry: AxisRegistry,
    extractor: FeatureExtractor,
    state: EngineState,
    stats: RunStats,
    marginals: Marginals,
    profiles: ProtonProfiles,
    counts: PairMatrix,
    counts_kinematics: PairMatrix,
    kinematics: PairMatrix,
}

impl Engine {
    /// Resolve the schema, build the registry and every accumulator.
    ///
    /// Fails on invalid configuration or a field missing from `schema`.
    pub fn new(
        config: AnalysisConfig,
        schema: &(impl BranchSchema + ?Sized),
        efficiency: Option<Arc<EfficiencyTable>>,
    ) -> Result<Self> {
        let registry = AxisRegistry::standard()?;
        let extractor = FeatureExtractor::new(&config, schema, efficiency)?;
        let domains = extractor.domains().clone();

        let counts = PairMatrix::triangular("counts", &registry, &domains.counts)?;
        let counts_kinematics =
            PairMatrix::cross("counts_kinematics", &registry, &domains.counts, &domains.kinematics)?;
        let kinematics = PairMatrix::triangular("kinematics", &registry, &domains.kinematics)?;

        let engine = Self {
            marginals: Marginals::new(config.particle_abundance)?,
            profiles: ProtonProfiles::new()?,
            config,
            registry,
            extractor,
            state: EngineState::Ready,
            stats: RunStats::default(),
            counts,
            counts_kinematics,
            kinematics,
        };
        log::info!(
            "engine ready: {} count features, {} kinematic features, {} pair accumulators",
            domains.counts.len(),
            domains.kinematics.len(),
            engine.counts.len() + engine.counts_kinematics.len() + engine.kinematics.len()
        );
        Ok(engine)
    }

    /// Update every accumulator with one event.
    pub fn process(&mut self, event: &impl Event) -> Result<Outcome> {
        if self.state == EngineState::Finalized {
            return Err(Error::InvalidState("process called after finalize".into()));
        }
        self.state = EngineState::Processing;
        self.stats.events_seen += 1;

        let Some(summary) = self.extractor.summarize(event) else {
            return Ok(Outcome::Rejected);
        };
        self.stats.events_selected += 1;

        self.marginals.fill(&summary)?;
        self.profiles.fill(&summary)?;
        self.counts.fill(&summary.features)?;
        self.counts_kinematics.fill(&summary.features)?;
        self.kinematics.fill(&summary.features)?;

        let kinematics = summary.n_tracks > 0;
        if !kinematics {
            self.stats.events_without_tracks += 1;
        }
        Ok(Outcome::Accepted { kinematics })
    }

    /// Close every accumulator and collect the snapshots.
    pub fn finalize(&mut self) -> Result<Bundle> {
        if self.state == EngineState::Finalized {
            return Err(Error::InvalidState("engine already finalized".into()));
        }
        self.state = EngineState::Finalized;

        let mut bundle = Bundle::new(self.config.bundle_name.clone());
        let m = &mut self.marginals;
        bundle.histograms_1d.push(m.vtx_z.finalize());
        if let Some(h) = m.pions_to_all_tracks.as_mut() {
            bundle.histograms_1d.push(h.finalize());
        }
        bundle.histograms_2d.push(m.vtx_x_vtx_y.finalize());
        bundle.histograms_2d.push(m.vtx_z_vtx_r.finalize());
        bundle.histograms_2d.push(m.vtx_z_n_hits.finalize());
        bundle.profiles_2d.push(self.profiles.chi2.finalize());
        bundle.profiles_2d.push(self.profiles.dca_z.finalize());
        bundle.profiles_2d.push(self.profiles.dca_xy.finalize());
        bundle.histograms_2d.extend(self.counts.finalize());
        bundle.histograms_2d.extend(self.counts_kinematics.finalize());
        bundle.histograms_2d.extend(self.kinematics.finalize());

        log::info!(
            "finalized '{}': {} accumulators, {} of {} events selected",
            bundle.name,
            bundle.len(),
            self.stats.events_selected,
            self.stats.events_seen
        );
        Ok(bundle)
    }

    /// Finalize and hand the bundle to `sink`.
    pub fn finish(&mut self, sink: &mut impl BundleSink) -> Result<()> {
        let bundle = self.finalize()?;
        sink.write(&bundle)
    }

    /// Combine two engines that processed disjoint sub-streams.
    ///
    /// Both must share the configuration and efficiency table and must not
    /// be finalized.
    pub fn merged(&self, other: &Engine) -> Result<Engine> {
        if self.config != other.config {
            return Err(Error::ConfigurationMismatch("engines built from different configurations".into()));
        }
        if self.extractor.efficiency() != other.extractor.efficiency() {
            return Err(Error::ConfigurationMismatch("engines built with different efficiency tables".into()));
        }
        if self.state == EngineState::Finalized || other.state == EngineState::Finalized {
            return Err(Error::InvalidState("cannot merge a finalized engine".into()));
        }
        let state = if self.state == EngineState::Ready && other.state == EngineState::Ready {
            EngineState::Ready
        } else {
            EngineState::Processing
        };
        Ok(Engine {
            config: self.config.clone(),
            registry: self.registry.clone(),
            extractor: self.extractor.clone(),
            state,
            stats: self.stats.merged(other.stats),
            marginals: self.marginals.merged(&other.marginals)?,
            profiles: self.profiles.merged(&other.profiles)?,
            counts: self.counts.merged(&other.counts)?,
            counts_kinematics: self.counts_kinematics.merged(&other.counts_kinematics)?,
            kinematics: self.kinematics.merged(&other.kinematics)?,
        })
    }

    /// Lifecycle phase.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Event counters.
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Run configuration.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Axis registry.
    pub fn registry(&self) -> &AxisRegistry {
        &self.registry
    }

    /// Feature extractor.
    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Count × count matrix.
    pub fn count_matrix(&self) -> &PairMatrix {
        &self.counts
    }

    /// Count × kinematic matrix.
    pub fn count_kinematic_matrix(&self) -> &PairMatrix {
        &self.counts_kinematics
    }

    /// Kinematic × kinematic matrix.
    pub fn kinematic_matrix(&self) -> &PairMatrix {
        &self.kinematics
    }
}
