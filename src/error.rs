//! Error types shared across the crate.

use thiserror::Error;

/// Errors that can occur while building or applying a [`crate::geometry::RotatorModel`].
#[derive(Debug, Error)]
pub enum GeometryError {
    /// A parameter file line could not be parsed.
    #[error("malformed parameter line {line_no}: {line:?}")]
    MalformedParameterLine {
        /// 1-based line number within the file.
        line_no: usize,
        /// The offending line.
        line: String,
    },
    /// A parameter key was not recognized.
    #[error("unknown rotator parameter key {key:?}")]
    UnknownParameterKey {
        /// The offending key.
        key: String,
    },
    /// A parameter value was not finite.
    #[error("parameter {key} has non-finite value {value}")]
    NonFiniteParameter {
        /// The offending key.
        key: String,
        /// The offending value.
        value: f64,
    },
    /// I/O failure while reading or writing a parameter file.
    #[error("I/O error reading parameter file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while parsing measurements or running a calibration.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// The measurement source (CSV file or FITS directory) could not be read.
    #[error("I/O error reading calibration input: {0}")]
    Io(#[from] std::io::Error),
    /// A CSV data line did not contain the required fields.
    #[error("malformed measurement on line {line_no}: {line:?}")]
    MalformedMeasurement {
        /// 1-based line number within the file.
        line_no: usize,
        /// The offending line.
        line: String,
    },
    /// No usable measurements remained after filtering.
    #[error("no usable measurements were found in the calibration input")]
    NoMeasurements,
    /// The optimizer failed to converge or encountered a non-finite residual.
    #[error("optimizer failed: {0}")]
    OptimizerFailed(String),
    /// The underlying geometric model rejected a parameter during fitting.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// FITS header decoding failed.
    #[cfg(feature = "fits")]
    #[error(transparent)]
    Fits(#[from] crate::fits::FitsHeaderError),
}

/// Errors surfaced by the tracking control plane.
#[cfg(feature = "tracker")]
#[derive(Debug, Error)]
pub enum TrackerError {
    /// `add_target` was called with an empty target name or rotator set.
    #[error("add_target requires a non-empty target name and at least one rotator")]
    EmptyTarget,
    /// `add_target` was called for a target that already has an active tracker.
    #[error("a tracker for target {0:?} already exists")]
    DuplicateTarget(String),
    /// The ephemeris adapter could not resolve the requested target.
    #[error("target {0:?} could not be resolved by the ephemeris adapter")]
    UnknownTarget(String),
    /// The ephemeris adapter has no upcoming pass for the target.
    #[error("target {0:?} has no upcoming pass")]
    NoPassAvailable(String),
    /// A bus publish or RPC call exceeded its deadline.
    #[error("operation on {0:?} timed out")]
    Timeout(&'static str),
    /// An inbound bus message could not be decoded.
    #[error("malformed bus message on {exchange}/{key}: {reason}")]
    MalformedMessage {
        /// The exchange the message arrived on.
        exchange: &'static str,
        /// The routing key the message arrived on.
        key: &'static str,
        /// A human-readable decoding failure reason.
        reason: String,
    },
}
