//! Error types for the quality-assurance pipeline

use thiserror::Error;

/// Quality-assurance error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Feature identifier without an axis registration
    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    /// Feature pair not present in a pairwise matrix
    #[error("unknown feature pair: ({first}, {second})")]
    UnknownPair {
        /// First feature name.
        first: String,
        /// Second feature name.
        second: String,
    },

    /// Fill attempted on an accumulator that was already finalized
    #[error("accumulator '{0}' is closed")]
    ClosedAccumulator(String),

    /// Merge of accumulators with incompatible shape
    #[error("configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    /// A per-track mean was requested for an event without contributing tracks
    #[error("no tracks contribute to the per-event aggregate")]
    EmptyEventAggregate,

    /// A named branch field is absent from the input schema
    #[error("field '{field}' not found in branch '{branch}'")]
    UnknownField {
        /// Branch name.
        branch: String,
        /// Field name.
        field: String,
    },

    /// Lifecycle violation
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offender() {
        let e = Error::UnknownPair { first: "hits_tof".into(), second: "hits_tof".into() };
        assert_eq!(e.to_string(), "unknown feature pair: (hits_tof, hits_tof)");

        let e = Error::UnknownField { branch: "event_header".into(), field: "fw_adc".into() };
        assert!(e.to_string().contains("fw_adc"));
    }

    #[test]
    fn io_converts() {
        fn open() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(open(), Err(Error::Io(_))));
    }
}
