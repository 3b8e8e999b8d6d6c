//! Output bundle of finalized accumulators and the sinks that persist it.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use qa_core::Result;
use qa_hist::{Hist1DSnapshot, Hist2DSnapshot, Profile2DSnapshot};
use serde::{Deserialize, Serialize};

/// Named collection of finalized accumulators, each carrying its own axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Bundle name.
    pub name: String,
    /// 1D histograms.
    pub histograms_1d: Vec<Hist1DSnapshot>,
    /// 2D histograms (vertex marginals, then the feature matrices).
    pub histograms_2d: Vec<Hist2DSnapshot>,
    /// 2D profiles.
    pub profiles_2d: Vec<Profile2DSnapshot>,
}

impl Bundle {
    /// Empty bundle.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            histograms_1d: Vec::new(),
            histograms_2d: Vec::new(),
            profiles_2d: Vec::new(),
        }
    }

    /// Total number of accumulators.
    pub fn len(&self) -> usize {
        self.histograms_1d.len() + self.histograms_2d.len() + self.profiles_2d.len()
    }

    /// Whether the bundle holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 1D histogram by name.
    pub fn hist_1d(&self, name: &str) -> Option<&Hist1DSnapshot> {
        self.histograms_1d.iter().find(|h| h.name == name)
    }

    /// 2D histogram by name.
    pub fn hist_2d(&self, name: &str) -> Option<&Hist2DSnapshot> {
        self.histograms_2d.iter().find(|h| h.name == name)
    }

    /// Profile by name.
    pub fn profile_2d(&self, name: &str) -> Option<&Profile2DSnapshot> {
        self.profiles_2d.iter().find(|p| p.name == name)
    }

    /// Every accumulator name, in write order.
    pub fn names(&self) -> Vec<&str> {
        self.histograms_1d
            .iter()
            .map(|h| h.name.as_str())
            .chain(self.histograms_2d.iter().map(|h| h.name.as_str()))
            .chain(self.profiles_2d.iter().map(|p| p.name.as_str()))
            .collect()
    }
}

/// Destination for a finalized bundle.
pub trait BundleSink {
    /// Persist `bundle`.
    fn write(&mut self, bundle: &Bundle) -> Result<()>;
}

/// Collects bundles in memory.
impl BundleSink for Vec<Bundle> {
    fn write(&mut self, bundle: &Bundle) -> Result<()> {
        self.push(bundle.clone());
        Ok(())
    }
}

/// Writes the bundle as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonBundleWriter {
    path: PathBuf,
}

impl JsonBundleWriter {
    /// Writer targeting `path` (created or truncated on write).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BundleSink for JsonBundleWriter {
    fn write(&mut self, bundle: &Bundle) -> Result<()> {
        let out = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(out, bundle)?;
        log::info!("wrote {} accumulators to {}", bundle.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qa_hist::{Accumulator, Axis, Hist1D};

    fn bundle() -> Bundle {
        let mut h = Hist1D::new("vtx_z", Axis::new("vtx_z", "VTX_{z} [mm]", 4, -100.0, 20.0).unwrap());
        h.fill(-80.0).unwrap();
        let mut b = Bundle::new("qa");
        b.histograms_1d.push(h.finalize());
        b
    }

    #[test]
    fn lookup() {
        let b = bundle();
        assert_eq!(b.len(), 1);
        assert_eq!(b.names(), vec!["vtx_z"]);
        assert_eq!(b.hist_1d("vtx_z").unwrap().entries, 1);
        assert!(b.hist_2d("vtx_z").is_none());
    }

    #[test]
    fn json_writer_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = JsonBundleWriter::new(dir.path().join("qa.json"));
        w.write(&bundle()).unwrap();
        let back: Bundle = serde_json::from_str(&std::fs::read_to_string(w.path()).unwrap()).unwrap();
        assert_eq!(back, bundle());
    }

    #[test]
    fn memory_sink() {
        let mut sink: Vec<Bundle> = Vec::new();
        sink.write(&bundle()).unwrap();
        assert_eq!(sink.len(), 1);
    }
}
