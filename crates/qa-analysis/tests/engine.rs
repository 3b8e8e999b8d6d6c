//! Integration tests: full runs through the engine on synthetic streams.

use std::sync::Arc;

use approx::assert_relative_eq;
use qa_analysis::memory::{MemorySchema, RecordedEvent, RecordedHit, RecordedTrack};
use qa_analysis::{
    AnalysisConfig, BranchSchema, Bundle, CountFeature, EVENT_HEADER, EfficiencyTable, Engine, EngineState,
    FeatureId, KinematicFeature, Outcome, VTX_TRACKS, WALL_HITS, run_sharded,
};
use qa_core::Error;
use qa_hist::Axis;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const PROTON_MASS: f64 = 0.938_272;
const PION_MASS: f64 = 0.139_570;

struct Fields {
    schema: MemorySchema,
}

impl Fields {
    fn new() -> Self {
        Self { schema: MemorySchema::hades() }
    }

    fn header(&self, name: &str) -> qa_analysis::FieldId {
        self.schema.field_id(EVENT_HEADER, name).unwrap()
    }

    fn track(&self, name: &str) -> qa_analysis::FieldId {
        self.schema.field_id(VTX_TRACKS, name).unwrap()
    }

    fn ring(&self) -> qa_analysis::FieldId {
        self.schema.field_id(WALL_HITS, "ring").unwrap()
    }

    fn event(&self, rng: &mut StdRng, triggered: bool) -> RecordedEvent {
        let n_tracks = rng.random_range(0..12);
        let mut ev = RecordedEvent::new([
            rng.random_range(-3.0..3.0),
            rng.random_range(-3.0..3.0),
            rng.random_range(-95.0..-60.0),
        ])
        .with_header(self.header("physical_trigger_2"), if triggered { 1.0 } else { 0.0 })
        .with_header(self.header("selected_tof_hits"), rng.random_range(0..80) as f64)
        .with_header(self.header("selected_rpc_hits"), rng.random_range(0..150) as f64)
        .with_header(self.header("selected_mdc_tracks"), n_tracks as f64);
        for _ in 0..n_tracks {
            let (mass, pid) = match rng.random_range(0..3) {
                0 => (PROTON_MASS, 2212),
                1 => (PION_MASS, 211),
                _ => (PION_MASS, -211),
            };
            let p = [
                rng.random_range(-0.6..0.6),
                rng.random_range(-0.6..0.6),
                rng.random_range(0.05..1.8),
            ];
            ev = ev.with_track(
                RecordedTrack::new(p, mass, pid)
                    .with_field(self.track("chi2"), rng.random_range(0.0..20.0))
                    .with_field(self.track("dca_xy"), rng.random_range(-5.0..5.0))
                    .with_field(self.track("dca_z"), rng.random_range(-5.0..5.0)),
            );
        }
        for _ in 0..rng.random_range(0..20) {
            ev = ev.with_hit(
                RecordedHit::new(rng.random_range(0.0..400.0))
                    .with_field(self.ring(), rng.random_range(0..12) as f64),
            );
        }
        ev
    }

    fn stream(&self, seed: u64, n: usize) -> Vec<RecordedEvent> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let triggered = rng.random_bool(0.8);
                self.event(&mut rng, triggered)
            })
            .collect()
    }

    fn engine(&self, config: AnalysisConfig) -> Engine {
        Engine::new(config, &self.schema, None).unwrap()
    }
}

fn id(f: impl Into<FeatureId>) -> FeatureId {
    f.into()
}

#[test]
fn accumulator_inventory() {
    let f = Fields::new();
    let mut engine = f.engine(AnalysisConfig::default());
    assert_eq!(engine.state(), EngineState::Ready);
    assert_eq!(engine.count_matrix().len(), 9 * 8 / 2);
    assert_eq!(engine.count_kinematic_matrix().len(), 9 * 6);
    assert_eq!(engine.kinematic_matrix().len(), 6 * 5 / 2);

    let bundle = engine.finalize().unwrap();
    assert_eq!(bundle.histograms_1d.len(), 2);
    assert_eq!(bundle.histograms_2d.len(), 3 + 36 + 54 + 15);
    assert_eq!(bundle.profiles_2d.len(), 3);
    assert!(bundle.hist_2d("hits_tof_hits_rpc").is_some());
    assert!(bundle.hist_2d("erat_prat").is_some());
    assert!(bundle.hist_2d("fw3_signal_mean_theta").is_some());

    let mut names = bundle.names();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), bundle.len());
}

#[test]
fn rejected_events_leave_accumulators_untouched() {
    let f = Fields::new();
    let mut rng = StdRng::seed_from_u64(11);
    let accepted: Vec<_> = (0..50).map(|_| f.event(&mut rng, true)).collect();
    let rejected: Vec<_> = (0..50).map(|_| f.event(&mut rng, false)).collect();

    let mut clean = f.engine(AnalysisConfig::default());
    let mut noisy = f.engine(AnalysisConfig::default());
    for (a, r) in accepted.iter().zip(&rejected) {
        clean.process(a).unwrap();
        assert_eq!(noisy.process(r).unwrap(), Outcome::Rejected);
        noisy.process(a).unwrap();
    }
    assert_eq!(noisy.stats().events_seen, 100);
    assert_eq!(noisy.stats().events_selected, 50);
    assert_eq!(clean.finalize().unwrap(), noisy.finalize().unwrap());
}

#[test]
fn cell_totals_match_selected_events() {
    let f = Fields::new();
    let events = f.stream(5, 400);
    let mut engine = f.engine(AnalysisConfig::default());
    for ev in &events {
        engine.process(ev).unwrap();
    }
    let stats = engine.stats();
    let with_tracks = stats.events_selected - stats.events_without_tracks;

    let tof = id(CountFeature::HitsTof);
    let fw1 = id(CountFeature::Fw1Signal);
    let pt = id(KinematicFeature::MeanPt);
    let theta = id(KinematicFeature::MeanTheta);
    assert_eq!(engine.count_matrix().get(tof, fw1).unwrap().total(), stats.events_selected);
    assert_eq!(engine.count_kinematic_matrix().get(tof, pt).unwrap().total(), with_tracks);
    assert_eq!(engine.kinematic_matrix().get(pt, theta).unwrap().total(), with_tracks);

    let bundle = engine.finalize().unwrap();
    assert_eq!(bundle.hist_1d("vtx_z").unwrap().entries, stats.events_selected);
    assert_eq!(bundle.hist_1d("pions_to_all_tracks").unwrap().entries, with_tracks);
}

#[test]
fn single_track_and_empty_events() {
    let f = Fields::new();
    let mut engine = f.engine(AnalysisConfig::default());
    let base = RecordedEvent::new([0.0, 0.0, -80.0])
        .with_header(f.header("physical_trigger_2"), 1.0)
        .with_header(f.header("selected_tof_hits"), 10.0)
        .with_header(f.header("selected_rpc_hits"), 20.0)
        .with_header(f.header("selected_mdc_tracks"), 1.0);

    let one = base.clone().with_track(RecordedTrack::new([0.5, 0.0, 1.0], PROTON_MASS, 2212));
    let features = engine.extractor().extract(&one);
    assert_relative_eq!(features.get(KinematicFeature::MeanPt).unwrap(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(features.get(KinematicFeature::MeanPz).unwrap(), 1.0, epsilon = 1e-12);
    assert_eq!(engine.process(&one).unwrap(), Outcome::Accepted { kinematics: true });

    assert_eq!(engine.process(&base).unwrap(), Outcome::Accepted { kinematics: false });

    let tof = id(CountFeature::HitsTof);
    let rpc = id(CountFeature::HitsRpc);
    let pt = id(KinematicFeature::MeanPt);
    let pz = id(KinematicFeature::MeanPz);
    assert_eq!(engine.count_matrix().get(tof, rpc).unwrap().total(), 2);
    assert_eq!(engine.count_kinematic_matrix().get(tof, pt).unwrap().total(), 1);
    let h = engine.kinematic_matrix().get(pt, pz).unwrap();
    assert_eq!(h.total(), 1);
    assert_eq!(h.count(50, 100), 1);
    assert_eq!(engine.stats().events_without_tracks, 1);
}

#[test]
fn track_count_never_paired_with_itself() {
    let f = Fields::new();
    let mut rng = StdRng::seed_from_u64(200);
    let mut engine = f.engine(AnalysisConfig::default());
    for _ in 0..200 {
        let ev = RecordedEvent::new([0.0, 0.0, -80.0])
            .with_header(f.header("physical_trigger_2"), 1.0)
            .with_header(f.header("selected_tof_hits"), 5.0)
            .with_header(f.header("selected_rpc_hits"), 5.0)
            .with_header(f.header("selected_mdc_tracks"), rng.random_range(0..200) as f64);
        engine.process(&ev).unwrap();
    }
    let mdc = id(CountFeature::TracksMdc);
    assert!(matches!(engine.count_matrix().get(mdc, mdc), Err(Error::UnknownPair { .. })));
    for &(a, b) in engine.count_matrix().pairs() {
        assert_ne!(a, b);
        assert_eq!(engine.count_matrix().get(a, b).unwrap().total(), 200);
    }
    let bundle = engine.finalize().unwrap();
    assert!(bundle.hist_2d("tracks_mdc_tracks_mdc").is_none());
}

#[test]
fn lifecycle_errors() {
    let f = Fields::new();
    let mut engine = f.engine(AnalysisConfig::default());
    let ev = f.stream(1, 1).remove(0);
    engine.process(&ev).unwrap();
    assert_eq!(engine.state(), EngineState::Processing);
    let mut sink: Vec<Bundle> = Vec::new();
    engine.finish(&mut sink).unwrap();
    assert_eq!(sink.len(), 1);
    assert_eq!(engine.state(), EngineState::Finalized);
    assert!(matches!(engine.process(&ev), Err(Error::InvalidState(_))));
    assert!(matches!(engine.finalize(), Err(Error::InvalidState(_))));
}

#[test]
fn schema_mismatch_fails_before_processing() {
    let schema = MemorySchema::hades().with_branch(VTX_TRACKS, ["chi2", "dca_xy"]);
    let err = Engine::new(AnalysisConfig::default(), &schema, None).unwrap_err();
    assert!(matches!(err, Error::UnknownField { ref branch, ref field } if branch == VTX_TRACKS && field == "dca_z"));
}

#[test]
fn sharded_run_matches_single_stream() {
    let f = Fields::new();
    let config = AnalysisConfig { cm_rapidity: true, ..Default::default() };
    let shards: Vec<Vec<RecordedEvent>> = (0..4).map(|s| f.stream(100 + s, 150)).collect();

    let mut single = f.engine(config.clone());
    for ev in shards.iter().flatten() {
        single.process(ev).unwrap();
    }
    let mut sharded = run_sharded(&config, &f.schema, None, &shards).unwrap();
    assert_eq!(sharded.stats(), single.stats());

    let a = single.finalize().unwrap();
    let b = sharded.finalize().unwrap();
    assert_eq!(a.histograms_1d, b.histograms_1d);
    assert_eq!(a.histograms_2d, b.histograms_2d);
    for (pa, pb) in a.profiles_2d.iter().zip(&b.profiles_2d) {
        assert_eq!(pa.name, pb.name);
        assert_eq!(pa.entries, pb.entries);
        for (ca, cb) in pa.cells.iter().zip(&pb.cells) {
            assert_eq!(ca.n, cb.n);
            assert_relative_eq!(ca.mean, cb.mean, epsilon = 1e-9);
        }
    }
}

#[test]
fn merge_rejects_different_configuration() {
    let f = Fields::new();
    let a = f.engine(AnalysisConfig::default());
    let b = f.engine(AnalysisConfig { momentum_power: 2, ..Default::default() });
    assert!(matches!(a.merged(&b), Err(Error::ConfigurationMismatch(_))));

    let mut c = f.engine(AnalysisConfig::default());
    c.finalize().unwrap();
    assert!(matches!(a.merged(&c), Err(Error::InvalidState(_))));
}

fn flat_efficiency(eff: f64) -> Arc<EfficiencyTable> {
    let x = Axis::new("ycm", "y_{cm}", 1, -1.0, 1.0).unwrap();
    let y = Axis::new("pt", "p_{T}", 1, 0.0, 2.0).unwrap();
    Arc::new(EfficiencyTable::new(x, y, vec![eff]).unwrap())
}

#[test]
fn merge_rejects_different_efficiency_tables() {
    let f = Fields::new();
    let build = |eff: Option<Arc<EfficiencyTable>>| {
        Engine::new(AnalysisConfig::default(), &f.schema, eff).unwrap()
    };
    let half = build(Some(flat_efficiency(0.5)));
    let tenth = build(Some(flat_efficiency(0.1)));
    let unweighted = build(None);
    assert!(matches!(half.merged(&tenth), Err(Error::ConfigurationMismatch(_))));
    assert!(matches!(half.merged(&unweighted), Err(Error::ConfigurationMismatch(_))));
    assert!(half.merged(&build(Some(flat_efficiency(0.5)))).is_ok());
}

#[test]
fn empty_shard_list_yields_fresh_engine() {
    let f = Fields::new();
    let shards: Vec<Vec<RecordedEvent>> = Vec::new();
    let engine = run_sharded(&AnalysisConfig::default(), &f.schema, None, &shards).unwrap();
    assert_eq!(engine.state(), EngineState::Ready);
    assert_eq!(engine.stats().events_seen, 0);
}
