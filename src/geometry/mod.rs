//! Quaternion/Euler math and the rotator forward/inverse geometric transform.

pub mod model;
pub mod params;
pub mod quaternion;

pub use model::RotatorModel;
pub use params::RotatorParams;
