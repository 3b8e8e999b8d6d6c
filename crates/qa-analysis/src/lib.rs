//! # qa-analysis
//!
//! Event-level quality assurance for heavy-ion collision data.
//!
//! For every selected event the [`FeatureExtractor`] derives detector
//! multiplicities and track-averaged kinematics; the [`Engine`] correlates
//! them pairwise in [`PairMatrix`] histograms, fills vertex marginals and
//! proton profiles, and finally hands a [`Bundle`] to a [`BundleSink`].
//!
//! ## Example
//!
//! ```
//! use qa_analysis::memory::{MemorySchema, RecordedEvent, RecordedTrack};
//! use qa_analysis::{AnalysisConfig, BranchSchema, Engine, EVENT_HEADER};
//!
//! let schema = MemorySchema::hades();
//! let trigger = schema.field_id(EVENT_HEADER, "physical_trigger_2").unwrap();
//! let mut engine = Engine::new(AnalysisConfig::default(), &schema, None).unwrap();
//!
//! let event = RecordedEvent::new([0.0, 0.0, -80.0])
//!     .with_header(trigger, 1.0)
//!     .with_track(RecordedTrack::new([0.5, 0.0, 1.0], 0.938, 2212));
//! engine.process(&event).unwrap();
//!
//! let bundle = engine.finalize().unwrap();
//! assert_eq!(bundle.hist_1d("vtx_z").unwrap().entries, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bundle;
pub mod config;
pub mod efficiency;
pub mod engine;
pub mod event;
pub mod extractor;
pub mod features;
pub mod matrix;
pub mod memory;
pub mod registry;
pub mod shard;

pub use bundle::{Bundle, BundleSink, JsonBundleWriter};
pub use config::{AnalysisConfig, CutKind, HeaderCut, RapidityMoment};
pub use efficiency::EfficiencyTable;
pub use engine::{Engine, EngineState, Outcome, RunStats};
pub use event::{
    BranchSchema, EVENT_HEADER, Event, FieldId, ResolvedFields, Track, VTX_TRACKS, WALL_HITS, WallHit,
};
pub use extractor::{EventSummary, FeatureExtractor, FourMomentum, ProtonSample};
pub use features::{CountFeature, FeatureDomains, FeatureId, FeatureMap, KinematicFeature};
pub use matrix::{PairLayout, PairMatrix};
pub use registry::AxisRegistry;
pub use shard::run_sharded;
