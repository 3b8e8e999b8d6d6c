//! Per-event feature extraction.
//!
//! One pass over the tracks accumulates the sums behind every kinematic
//! aggregate; one pass over the forward-wall hits builds the ring-partitioned
//! signal sums. Events failing the trigger or a cut yield nothing.

use std::sync::Arc;

use qa_core::{Error, Result};

use crate::config::{AnalysisConfig, RapidityMoment};
use crate::efficiency::EfficiencyTable;
use crate::event::{BranchSchema, Event, ResolvedFields, Track, WallHit};
use crate::features::{CountFeature, FeatureDomains, FeatureMap, KinematicFeature};

/// Four-momentum of a track built from its momentum and mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FourMomentum {
    /// x component.
    pub px: f64,
    /// y component.
    pub py: f64,
    /// z (beam) component.
    pub pz: f64,
    /// Energy.
    pub e: f64,
}

impl FourMomentum {
    /// From `(px, py, pz)` and mass.
    pub fn from_mass(p: [f64; 3], mass: f64) -> Self {
        let [px, py, pz] = p;
        let e = (px * px + py * py + pz * pz + mass * mass).sqrt();
        Self { px, py, pz, e }
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    /// Momentum magnitude.
    pub fn p(&self) -> f64 {
        self.pt().hypot(self.pz)
    }

    /// Polar angle with respect to the beam axis.
    pub fn theta(&self) -> f64 {
        self.pt().atan2(self.pz)
    }

    /// Longitudinal rapidity.
    pub fn rapidity(&self) -> f64 {
        0.5 * ((self.e + self.pz) / (self.e - self.pz)).ln()
    }
}

/// Per-proton quantities used by the kinematic profiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtonSample {
    /// Rapidity in the centre-of-mass frame.
    pub ycm: f64,
    /// Transverse momentum.
    pub pt: f64,
    /// Track fit chi2.
    pub chi2: f64,
    /// Distance of closest approach in the transverse plane.
    pub dca_xy: f64,
    /// Distance of closest approach along the beam.
    pub dca_z: f64,
}

/// Everything the engine needs from one selected event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    /// Feature values.
    pub features: FeatureMap,
    /// Reconstructed vertex.
    pub vertex: [f64; 3],
    /// Number of tracks.
    pub n_tracks: usize,
    /// Number of charged-pion tracks.
    pub n_pions: usize,
    /// Protons, in track order.
    pub protons: Vec<ProtonSample>,
}

#[derive(Debug, Default)]
struct TrackSums {
    n: usize,
    pt: f64,
    pz: f64,
    y: f64,
    theta: f64,
    e_cos: f64,
    e_sin: f64,
    p_cos: f64,
    p_sin: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TrackMeans {
    erat: f64,
    prat: f64,
    pt: f64,
    pz: f64,
    y: f64,
    theta: f64,
}

impl TrackSums {
    fn add(&mut self, mom: &FourMomentum, power: i32, moment: RapidityMoment) {
        let theta = mom.theta();
        let (sin, cos) = theta.sin_cos();
        let pk = mom.p().powi(power);
        let y = mom.rapidity();
        self.n += 1;
        self.pt += mom.pt();
        self.pz += mom.pz;
        self.y += match moment {
            RapidityMoment::First => y,
            RapidityMoment::Second => y * y,
        };
        self.theta += theta;
        self.e_cos += mom.e * cos;
        self.e_sin += mom.e * sin;
        self.p_cos += pk * cos;
        self.p_sin += pk * sin;
    }

    fn means(&self) -> Result<TrackMeans> {
        if self.n == 0 {
            return Err(Error::EmptyEventAggregate);
        }
        let n = self.n as f64;
        Ok(TrackMeans {
            erat: self.e_sin / self.e_cos,
            prat: self.p_sin / self.p_cos,
            pt: self.pt / n,
            pz: self.pz / n,
            y: self.y / n,
            theta: self.theta / n,
        })
    }
}

#[derive(Debug, Default)]
struct ProtonSums {
    n: usize,
    ycm: f64,
    bw_minus_fw: f64,
    w: f64,
    w_ycm: f64,
    w_bw_minus_fw: f64,
}

impl ProtonSums {
    fn add(&mut self, ycm: f64, w: f64) {
        let side = if ycm < 0.0 {
            1.0
        } else if ycm > 0.0 {
            -1.0
        } else {
            0.0
        };
        self.n += 1;
        self.ycm += ycm;
        self.bw_minus_fw += side;
        self.w += w;
        self.w_ycm += w * ycm;
        self.w_bw_minus_fw += w * side;
    }

    /// `(weighted mean, plain mean, weighted bw-fw, plain bw-fw)`
    fn aggregates(&self) -> Result<(f64, f64, f64, f64)> {
        if self.n == 0 {
            return Err(Error::EmptyEventAggregate);
        }
        let weighted_mean = if self.w > 0.0 { self.w_ycm / self.w } else { f64::NAN };
        Ok((weighted_mean, self.ycm / self.n as f64, self.w_bw_minus_fw, self.bw_minus_fw))
    }
}

/// Computes the feature map of one event.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    fields: ResolvedFields,
    domains: FeatureDomains,
    momentum_power: i32,
    rapidity_moment: RapidityMoment,
    particle_abundance: bool,
    cm_rapidity: bool,
    beam_rapidity: f64,
    proton_pid: i64,
    pion_pids: Vec<i64>,
    helium_pids: Vec<i64>,
    efficiency: Option<Arc<EfficiencyTable>>,
}

impl FeatureExtractor {
    /// Resolve fields against `schema` and capture the configuration.
    pub fn new(
        config: &AnalysisConfig,
        schema: &(impl BranchSchema + ?Sized),
        efficiency: Option<Arc<EfficiencyTable>>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fields: ResolvedFields::resolve(schema, config)?,
            domains: FeatureDomains::from_config(config),
            momentum_power: config.momentum_power as i32,
            rapidity_moment: config.rapidity_moment,
            particle_abundance: config.particle_abundance,
            cm_rapidity: config.cm_rapidity,
            beam_rapidity: config.beam_rapidity,
            proton_pid: config.proton_pid,
            pion_pids: config.pion_pids.clone(),
            helium_pids: config.helium_pids.clone(),
            efficiency,
        })
    }

    /// Enabled feature domains.
    pub fn domains(&self) -> &FeatureDomains {
        &self.domains
    }

    /// Efficiency table used for proton weights, if any.
    pub fn efficiency(&self) -> Option<&EfficiencyTable> {
        self.efficiency.as_deref()
    }

    /// Feature map of `event`; empty if the event is not selected.
    pub fn extract(&self, event: &impl Event) -> FeatureMap {
        self.summarize(event).map(|s| s.features).unwrap_or_default()
    }

    /// Features plus the per-track material needed for profiles and
    /// marginals, or `None` if the event is not selected.
    pub fn summarize(&self, event: &impl Event) -> Option<EventSummary> {
        if !self.fields.selects(event) {
            return None;
        }
        let f = &self.fields;
        let mut features = FeatureMap::new();
        features.insert(CountFeature::HitsTof, event.header_field(f.hits_tof));
        features.insert(CountFeature::HitsRpc, event.header_field(f.hits_rpc));
        features.insert(CountFeature::TracksMdc, event.header_field(f.tracks_mdc));

        let [fw_all, fw1, fw2, fw3] = self.wall_signals(event);
        features.insert(CountFeature::FwAllSignal, fw_all);
        features.insert(CountFeature::Fw1Signal, fw1);
        features.insert(CountFeature::Fw2Signal, fw2);
        features.insert(CountFeature::Fw3Signal, fw3);

        let mut sums = TrackSums::default();
        let mut proton_sums = ProtonSums::default();
        let mut protons = Vec::new();
        let mut n_pions = 0usize;
        let mut n_helium = 0usize;
        for track in event.tracks() {
            let mom = FourMomentum::from_mass(track.momentum(), track.mass());
            sums.add(&mom, self.momentum_power, self.rapidity_moment);

            let pid = track.pid();
            if self.pion_pids.contains(&pid) {
                n_pions += 1;
            }
            if self.helium_pids.contains(&pid) {
                n_helium += 1;
            }
            if pid != self.proton_pid {
                continue;
            }
            let sample = ProtonSample {
                ycm: mom.rapidity() - self.beam_rapidity,
                pt: mom.pt(),
                chi2: track.field(f.chi2),
                dca_xy: track.field(f.dca_xy).abs(),
                dca_z: track.field(f.dca_z).abs(),
            };
            proton_sums.add(sample.ycm, self.proton_weight(&sample));
            protons.push(sample);
        }

        if self.particle_abundance {
            features.insert(CountFeature::Pions, n_pions as f64);
            features.insert(CountFeature::Helium, n_helium as f64);
        }

        match sums.means() {
            Ok(m) => {
                features.insert(KinematicFeature::Erat, m.erat);
                features.insert(KinematicFeature::Prat, m.prat);
                features.insert(KinematicFeature::MeanPt, m.pt);
                features.insert(KinematicFeature::MeanPz, m.pz);
                features.insert(KinematicFeature::MeanY, m.y);
                features.insert(KinematicFeature::MeanTheta, m.theta);
            }
            Err(e) => log::debug!("skipping track aggregates: {e}"),
        }

        if self.cm_rapidity {
            match proton_sums.aggregates() {
                Ok((ycm, ycm_no_eff, bw_fw, bw_fw_no_eff)) => {
                    features.insert(KinematicFeature::MeanYcm, ycm);
                    features.insert(KinematicFeature::MeanYcmNoEff, ycm_no_eff);
                    features.insert(KinematicFeature::BwVsFw, bw_fw);
                    features.insert(KinematicFeature::BwVsFwNoEff, bw_fw_no_eff);
                }
                Err(e) => log::debug!("skipping proton rapidity aggregates: {e}"),
            }
        }

        Some(EventSummary {
            features,
            vertex: event.vertex(),
            n_tracks: sums.n,
            n_pions,
            protons,
        })
    }

    /// `[all, rings 0-5, rings 6-7, rings 8-10]`
    fn wall_signals(&self, event: &impl Event) -> [f64; 4] {
        let mut out = [0.0; 4];
        for hit in event.wall_hits() {
            let signal = hit.signal();
            out[0] += signal;
            let ring = hit.field(self.fields.ring);
            if ring.is_nan() {
                continue;
            }
            match ring as i64 {
                0..=5 => out[1] += signal,
                6 | 7 => out[2] += signal,
                8..=10 => out[3] += signal,
                _ => {}
            }
        }
        out
    }

    fn proton_weight(&self, p: &ProtonSample) -> f64 {
        let Some(table) = &self.efficiency else {
            return 1.0;
        };
        table.weight(p.ycm, p.pt).unwrap_or_else(|| {
            log::debug!("no positive efficiency at (ycm={}, pt={}); using unit weight", p.ycm, p.pt);
            1.0
        })
    }
}
