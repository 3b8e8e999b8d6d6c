//! Read-only contract of the event source.
//!
//! Named fields are resolved to [`FieldId`] handles once, when the engine is
//! built; per-event access goes through the handles only.

use qa_core::{Error, Result};

use crate::config::{AnalysisConfig, CutKind};

/// Branch holding per-event header fields.
pub const EVENT_HEADER: &str = "event_header";
/// Branch holding vertex-fitted tracks.
pub const VTX_TRACKS: &str = "mdc_vtx_tracks";
/// Branch holding forward-wall hits.
pub const WALL_HITS: &str = "forward_wall_hits";

/// Stable handle of a named field within one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub usize);

/// Resolves `(branch, field)` names to handles.
pub trait BranchSchema {
    /// Handle of `field` in `branch`, or `None` if the schema lacks it.
    fn field_id(&self, branch: &str, field: &str) -> Option<FieldId>;
}

/// Resolve a field or fail with [`Error::UnknownField`].
pub fn resolve_field(schema: &(impl BranchSchema + ?Sized), branch: &str, field: &str) -> Result<FieldId> {
    schema.field_id(branch, field).ok_or_else(|| Error::UnknownField {
        branch: branch.to_string(),
        field: field.to_string(),
    })
}

/// A reconstructed track.
pub trait Track {
    /// Momentum `(px, py, pz)` in GeV/c.
    fn momentum(&self) -> [f64; 3];
    /// Mass hypothesis in GeV/c².
    fn mass(&self) -> f64;
    /// Particle-type label (PDG code).
    fn pid(&self) -> i64;
    /// Named float field.
    fn field(&self, id: FieldId) -> f64;
}

/// A forward-wall hit.
pub trait WallHit {
    /// Signal amplitude.
    fn signal(&self) -> f64;
    /// Named field.
    fn field(&self, id: FieldId) -> f64;
}

/// One event as exposed by the stream source. Borrowed for a single
/// processing step and never retained.
///
/// There is no track-to-META-hit match accessor: no derived feature reads it.
pub trait Event {
    /// Track type.
    type Track: Track;
    /// Wall-hit type.
    type Hit: WallHit;

    /// Reconstructed vertex `(x, y, z)` in mm.
    fn vertex(&self) -> [f64; 3];
    /// Header field; integer and boolean fields are widened to `f64`.
    fn header_field(&self, id: FieldId) -> f64;
    /// Vertex-fitted tracks.
    fn tracks(&self) -> &[Self::Track];
    /// Forward-wall hits.
    fn wall_hits(&self) -> &[Self::Hit];
}

/// Where a cut reads its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutSource {
    /// Vertex coordinate 0, 1 or 2.
    Vertex(usize),
    /// Header field.
    Header(FieldId),
}

/// All field handles needed by the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFields {
    /// `selected_tof_hits`
    pub hits_tof: FieldId,
    /// `selected_rpc_hits`
    pub hits_rpc: FieldId,
    /// `selected_mdc_tracks`
    pub tracks_mdc: FieldId,
    /// The configured trigger flag.
    pub trigger: FieldId,
    /// Configured cuts.
    pub cuts: Vec<(CutSource, CutKind)>,
    /// Track `chi2`.
    pub chi2: FieldId,
    /// Track `dca_xy`.
    pub dca_xy: FieldId,
    /// Track `dca_z`.
    pub dca_z: FieldId,
    /// Wall-hit `ring`.
    pub ring: FieldId,
}

impl ResolvedFields {
    /// Resolve every field the run reads. Fails on the first missing one.
    pub fn resolve(schema: &(impl BranchSchema + ?Sized), config: &AnalysisConfig) -> Result<Self> {
        let cuts = config
            .cuts
            .iter()
            .map(|cut| {
                let source = match cut.field.as_str() {
                    "vtx_x" => CutSource::Vertex(0),
                    "vtx_y" => CutSource::Vertex(1),
                    "vtx_z" => CutSource::Vertex(2),
                    name => CutSource::Header(resolve_field(schema, EVENT_HEADER, name)?),
                };
                Ok((source, cut.kind.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            hits_tof: resolve_field(schema, EVENT_HEADER, "selected_tof_hits")?,
            hits_rpc: resolve_field(schema, EVENT_HEADER, "selected_rpc_hits")?,
            tracks_mdc: resolve_field(schema, EVENT_HEADER, "selected_mdc_tracks")?,
            trigger: resolve_field(schema, EVENT_HEADER, &config.trigger_field)?,
            cuts,
            chi2: resolve_field(schema, VTX_TRACKS, "chi2")?,
            dca_xy: resolve_field(schema, VTX_TRACKS, "dca_xy")?,
            dca_z: resolve_field(schema, VTX_TRACKS, "dca_z")?,
            ring: resolve_field(schema, WALL_HITS, "ring")?,
        })
    }

    /// Whether `event` fires the trigger and passes every cut.
    pub fn selects(&self, event: &impl Event) -> bool {
        let trigger = event.header_field(self.trigger);
        if trigger == 0.0 || trigger.is_nan() {
            return false;
        }
        let vertex = event.vertex();
        self.cuts.iter().all(|(source, kind)| {
            let v = match *source {
                CutSource::Vertex(i) => vertex[i],
                CutSource::Header(id) => event.header_field(id),
            };
            kind.accepts(v)
        })
    }
}
