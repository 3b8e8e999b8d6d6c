//! # qa-hist
//!
//! Fixed-width binned accumulators for per-event quality-assurance plots.
//!
//! Three kinds are provided: [`Hist1D`] and [`Hist2D`] count entries per bin,
//! [`Profile2D`] keeps a running mean of a third quantity per `(x, y)` bin.
//! All of them saturate: a finite coordinate outside an axis range is
//! accumulated into the nearest edge bin and tallied as under/overflow.
//!
//! ## Example
//!
//! ```
//! use qa_hist::{Accumulator, Axis, Hist2D};
//!
//! let x = Axis::new("hits_tof", "N hits TOF", 100, 0.0, 100.0).unwrap();
//! let y = Axis::new("hits_rpc", "N hits RPC", 200, 0.0, 200.0).unwrap();
//! let mut h = Hist2D::new("hits_tof_hits_rpc", x, y);
//! h.fill(12.0, 40.0).unwrap();
//! h.fill(150.0, 40.0).unwrap(); // saturates into the last x bin
//! assert_eq!(h.count(99, 40), 1);
//! let snapshot = h.finalize();
//! assert_eq!(snapshot.entries, 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod axis;
pub mod histogram;
pub mod profile;

pub use axis::{Axis, AxisSnapshot, Flow, FlowTally, Located};
pub use histogram::{Hist1D, Hist1DSnapshot, Hist2D, Hist2DSnapshot};
pub use profile::{Profile2D, Profile2DSnapshot, ProfileCell};

use qa_core::Result;

/// Common lifecycle of a binned accumulator: fill, merge, finalize.
pub trait Accumulator: Sized {
    /// Immutable, serializable view produced by [`Accumulator::finalize`].
    type Snapshot;

    /// Accumulator name (unique within an output bundle).
    fn name(&self) -> &str;

    /// Number of binned fills (rejected fills excluded).
    fn entries(&self) -> u64;

    /// Whether [`Accumulator::finalize`] has been called.
    fn is_closed(&self) -> bool;

    /// Close the accumulator and return its snapshot.
    ///
    /// Repeated calls return the same snapshot.
    fn finalize(&mut self) -> Self::Snapshot;

    /// Combine two accumulators built with identical name and axes.
    ///
    /// Commutative and associative; the result is open for further fills.
    fn merged(&self, other: &Self) -> Result<Self>;
}
