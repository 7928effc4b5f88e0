//! The seven-parameter rotator calibration and its text persistence format.

use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::GeometryError;

/// The seven scalar parameters of the rotator geometric model.
///
/// All angles are degrees; `az_gain`/`el_gain` are dimensionless motor-to-sky gear ratios.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatorParams {
    /// Additive azimuth motor offset.
    pub az_off: f64,
    /// Additive elevation motor offset.
    pub el_off: f64,
    /// Multiplicative azimuth motor gain.
    pub az_gain: f64,
    /// Multiplicative elevation motor gain.
    pub el_gain: f64,
    /// Azimuth of the platform tilt axis, in `[0, 360)`.
    pub tilt_az: f64,
    /// Platform tilt magnitude.
    pub tilt_angle: f64,
    /// Payload rotation about its boresight.
    pub lateral_tilt: f64,
}

impl Default for RotatorParams {
    fn default() -> Self {
        RotatorParams {
            az_off: 0.0,
            el_off: 0.0,
            az_gain: 1.0,
            el_gain: 1.0,
            tilt_az: 0.0,
            tilt_angle: 0.0,
            lateral_tilt: 0.0,
        }
    }
}

const KEYS: [&str; 7] = [
    "az_off",
    "el_off",
    "az_gain",
    "el_gain",
    "tilt_az",
    "tilt_angle",
    "lateral_tilt",
];

impl RotatorParams {
    /// Builds a parameter set from the seven scalars, in the optimizer's canonical order
    /// `(el_off, az_off, el_gain, az_gain, tilt_az, tilt_angle, lateral_tilt)`.
    pub fn from_vector(v: &[f64; 7]) -> Self {
        RotatorParams {
            el_off: v[0],
            az_off: v[1],
            el_gain: v[2],
            az_gain: v[3],
            tilt_az: v[4],
            tilt_angle: v[5],
            lateral_tilt: v[6],
        }
    }

    /// Flattens the parameters in the optimizer's canonical order (see [`RotatorParams::from_vector`]).
    pub fn to_vector(self) -> [f64; 7] {
        [
            self.el_off,
            self.az_off,
            self.el_gain,
            self.az_gain,
            self.tilt_az,
            self.tilt_angle,
            self.lateral_tilt,
        ]
    }

    fn get(&self, key: &str) -> Option<f64> {
        match key {
            "az_off" => Some(self.az_off),
            "el_off" => Some(self.el_off),
            "az_gain" => Some(self.az_gain),
            "el_gain" => Some(self.el_gain),
            "tilt_az" => Some(self.tilt_az),
            "tilt_angle" => Some(self.tilt_angle),
            "lateral_tilt" => Some(self.lateral_tilt),
            _ => None,
        }
    }

    fn set(&mut self, key: &str, value: f64) -> Result<(), GeometryError> {
        if !value.is_finite() {
            return Err(GeometryError::NonFiniteParameter {
                key: key.to_owned(),
                value,
            });
        }
        match key {
            "az_off" => self.az_off = value,
            "el_off" => self.el_off = value,
            "az_gain" => self.az_gain = value,
            "el_gain" => self.el_gain = value,
            "tilt_az" => self.tilt_az = value,
            "tilt_angle" => self.tilt_angle = value,
            "lateral_tilt" => self.lateral_tilt = value,
            _ => return Err(GeometryError::UnknownParameterKey { key: key.to_owned() }),
        }
        Ok(())
    }

    /// Parses a `key: value` per line text parameter file. Missing keys default to identity.
    pub fn load<R: std::io::Read>(reader: R) -> Result<Self, GeometryError> {
        let mut params = RotatorParams::default();
        for (i, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let (key, value) = trimmed
                .split_once(':')
                .ok_or_else(|| GeometryError::MalformedParameterLine {
                    line_no: i + 1,
                    line: line.clone(),
                })?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| GeometryError::MalformedParameterLine {
                    line_no: i + 1,
                    line: line.clone(),
                })?;
            params.set(key.trim(), value)?;
        }
        Ok(params)
    }

    /// Loads parameters from a file path.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, GeometryError> {
        Self::load(std::fs::File::open(path)?)
    }

    /// Serializes the parameters as `key: value` lines.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<(), GeometryError> {
        for key in KEYS {
            writeln!(writer, "{key}: {}", self.get(key).unwrap())?;
        }
        Ok(())
    }

    /// Saves parameters to a file path.
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<(), GeometryError> {
        self.save(std::fs::File::create(path)?)
    }
}

impl fmt::Display for RotatorParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RotatorParams(el_off={:.3}, az_off={:.3}, el_gain={:.4}, az_gain={:.4}, \
             tilt_az={:.4}, tilt_angle={:.4}, lateral_tilt={:.4})",
            self.el_off, self.az_off, self.el_gain, self.az_gain, self.tilt_az, self.tilt_angle, self.lateral_tilt
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        let p = RotatorParams::default();
        assert_eq!(p.az_gain, 1.0);
        assert_eq!(p.el_gain, 1.0);
        assert_eq!(p.az_off, 0.0);
    }

    #[test]
    fn round_trips_through_text_format() {
        let p = RotatorParams {
            az_off: 1.5,
            el_off: -2.25,
            az_gain: 1.001,
            el_gain: 0.998,
            tilt_az: 45.0,
            tilt_angle: 0.3,
            lateral_tilt: -0.1,
        };
        let mut buf = Vec::new();
        p.save(&mut buf).unwrap();
        let loaded = RotatorParams::load(buf.as_slice()).unwrap();
        assert_eq!(loaded, p);
    }

    #[test]
    fn rejects_unknown_key() {
        let text = "az_off: 1.0\nbogus_key: 2.0\n";
        assert!(RotatorParams::load(text.as_bytes()).is_err());
    }

    #[test]
    fn missing_keys_default_to_identity() {
        let text = "az_off: 3.0\n";
        let p = RotatorParams::load(text.as_bytes()).unwrap();
        assert_eq!(p.az_off, 3.0);
        assert_eq!(p.az_gain, 1.0);
    }
}
