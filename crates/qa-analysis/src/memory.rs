//! In-memory event source: a schema of named fields plus recorded events.
//!
//! Used by tests and by callers that stage events as JSON. Field values are
//! stored positionally; a [`FieldId`] is the position of the field name in
//! its branch list. Reading a field the event did not record yields NaN.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::event::{BranchSchema, EVENT_HEADER, Event, FieldId, Track, VTX_TRACKS, WALL_HITS, WallHit};

/// Branch name → ordered field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySchema {
    branches: HashMap<String, Vec<String>>,
}

impl MemorySchema {
    /// Empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a branch with its field names.
    pub fn with_branch<S: Into<String>>(
        mut self,
        branch: impl Into<String>,
        fields: impl IntoIterator<Item = S>,
    ) -> Self {
        self.branches.insert(branch.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    /// Layout of the HADES analysis-tree branches read by the engine.
    pub fn hades() -> Self {
        Self::new()
            .with_branch(
                EVENT_HEADER,
                [
                    "selected_tof_hits",
                    "selected_rpc_hits",
                    "selected_mdc_tracks",
                    "fw_adc",
                    "physical_trigger_2",
                    "physical_trigger_3",
                ],
            )
            .with_branch(VTX_TRACKS, ["chi2", "dca_xy", "dca_z"])
            .with_branch(WALL_HITS, ["ring"])
    }
}

impl BranchSchema for MemorySchema {
    fn field_id(&self, branch: &str, field: &str) -> Option<FieldId> {
        self.branches.get(branch)?.iter().position(|f| f == field).map(FieldId)
    }
}

fn read(values: &[f64], id: FieldId) -> f64 {
    values.get(id.0).copied().unwrap_or(f64::NAN)
}

fn write(values: &mut Vec<f64>, id: FieldId, v: f64) {
    if values.len() <= id.0 {
        values.resize(id.0 + 1, f64::NAN);
    }
    values[id.0] = v;
}

/// A recorded track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedTrack {
    /// `(px, py, pz)` in GeV/c.
    pub momentum: [f64; 3],
    /// Mass in GeV/c².
    pub mass: f64,
    /// Particle-type label.
    pub pid: i64,
    /// Field values by position.
    #[serde(default)]
    pub fields: Vec<f64>,
}

impl RecordedTrack {
    /// Track without named fields.
    pub fn new(momentum: [f64; 3], mass: f64, pid: i64) -> Self {
        Self { momentum, mass, pid, fields: Vec::new() }
    }

    /// Set a named field.
    pub fn with_field(mut self, id: FieldId, v: f64) -> Self {
        write(&mut self.fields, id, v);
        self
    }
}

impl Track for RecordedTrack {
    fn momentum(&self) -> [f64; 3] {
        self.momentum
    }

    fn mass(&self) -> f64 {
        self.mass
    }

    fn pid(&self) -> i64 {
        self.pid
    }

    fn field(&self, id: FieldId) -> f64 {
        read(&self.fields, id)
    }
}

/// A recorded forward-wall hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedHit {
    /// Signal amplitude.
    pub signal: f64,
    /// Field values by position.
    #[serde(default)]
    pub fields: Vec<f64>,
}

impl RecordedHit {
    /// Hit without named fields.
    pub fn new(signal: f64) -> Self {
        Self { signal, fields: Vec::new() }
    }

    /// Set a named field.
    pub fn with_field(mut self, id: FieldId, v: f64) -> Self {
        write(&mut self.fields, id, v);
        self
    }
}

impl WallHit for RecordedHit {
    fn signal(&self) -> f64 {
        self.signal
    }

    fn field(&self, id: FieldId) -> f64 {
        read(&self.fields, id)
    }
}

/// A recorded event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Vertex `(x, y, z)`.
    pub vertex: [f64; 3],
    /// Header values by position.
    #[serde(default)]
    pub header: Vec<f64>,
    /// Tracks.
    #[serde(default)]
    pub tracks: Vec<RecordedTrack>,
    /// Forward-wall hits.
    #[serde(default)]
    pub wall_hits: Vec<RecordedHit>,
}

impl RecordedEvent {
    /// Event at `vertex` with nothing else recorded.
    pub fn new(vertex: [f64; 3]) -> Self {
        Self { vertex, ..Default::default() }
    }

    /// Set a header field.
    pub fn with_header(mut self, id: FieldId, v: f64) -> Self {
        write(&mut self.header, id, v);
        self
    }

    /// Append a track.
    pub fn with_track(mut self, track: RecordedTrack) -> Self {
        self.tracks.push(track);
        self
    }

    /// Append a wall hit.
    pub fn with_hit(mut self, hit: RecordedHit) -> Self {
        self.wall_hits.push(hit);
        self
    }
}

impl Event for RecordedEvent {
    type Track = RecordedTrack;
    type Hit = RecordedHit;

    fn vertex(&self) -> [f64; 3] {
        self.vertex
    }

    fn header_field(&self, id: FieldId) -> f64 {
        read(&self.header, id)
    }

    fn tracks(&self) -> &[RecordedTrack] {
        &self.tracks
    }

    fn wall_hits(&self) -> &[RecordedHit] {
        &self.wall_hits
    }
}
