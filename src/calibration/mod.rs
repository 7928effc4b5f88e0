//! Measurement ingestion, encoder-drift removal, and nonlinear least-squares calibration.

pub mod calibrator;
pub mod drift;
pub mod measurement;

pub use calibrator::{CalibrationResult, Calibrator, Method};
pub use measurement::Measurement;
