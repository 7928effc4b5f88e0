//! Calibration measurement records and their ingestion from CSV or FITS-directory sources.

use std::io::BufRead;
use std::path::Path;

use hifitime::Epoch;

use crate::error::CalibrationError;
use crate::geometry::RotatorModel;

/// A single calibration data point: a motor reading paired with ground truth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Motor-frame azimuth, degrees.
    pub az_motor: f64,
    /// Motor-frame elevation, degrees.
    pub el_motor: f64,
    /// Ground-truth (real sky) azimuth, degrees.
    pub az_truth: f64,
    /// Ground-truth (real sky) elevation, degrees.
    pub el_truth: f64,
    /// Timestamp of the observation, if known.
    pub ts: Option<Epoch>,
}

/// Parses the calibration CSV format: `az, el, gt_az, gt_el[, ts[, ...]]` per line, `#`
/// starts a trailing comment, blank lines are ignored.
///
/// The first two columns are the real-sky commanded `(az, el)` the rotator was driven to, not
/// raw motor-encoder readings. They are passed through `initial`'s [`RotatorModel::to_motor`]
/// once here so that `Measurement::az_motor`/`el_motor` are in the same raw motor-encoder frame
/// that [`super::Calibrator`]'s residuals expect.
pub fn parse_csv<R: std::io::Read>(
    reader: R,
    initial: &RotatorModel,
) -> Result<Vec<Measurement>, CalibrationError> {
    let mut out = Vec::new();
    for (i, line) in std::io::BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let fields: Vec<&str> = content.split(',').map(str::trim).collect();
        if fields.len() < 4 {
            return Err(CalibrationError::MalformedMeasurement {
                line_no: i + 1,
                line,
            });
        }
        let parse_f64 = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| CalibrationError::MalformedMeasurement {
                    line_no: i + 1,
                    line: line.clone(),
                })
        };
        let az_cmd = parse_f64(fields[0])?;
        let el_cmd = parse_f64(fields[1])?;
        let az_truth = parse_f64(fields[2])?;
        let el_truth = parse_f64(fields[3])?;
        let ts = fields.get(4).and_then(|s| s.parse::<Epoch>().ok());
        let (az_motor, el_motor) = initial.to_motor(az_cmd, el_cmd, true);
        out.push(Measurement {
            az_motor,
            el_motor,
            az_truth,
            el_truth,
            ts,
        });
    }
    Ok(out)
}

/// Orders file names the way the original tooling does: splitting on `_`, `.` and `-` and
/// comparing numeric runs numerically so that `frame_2.fits` sorts before `frame_10.fits`.
pub fn natural_sort_key(name: &str) -> Vec<NaturalKeyPart> {
    name.split(['_', '.', '-'])
        .map(|part| match part.parse::<u64>() {
            Ok(n) => NaturalKeyPart::Number(n),
            Err(_) => NaturalKeyPart::Text(part.to_owned()),
        })
        .collect()
}

/// One token of a [`natural_sort_key`] result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NaturalKeyPart {
    /// A purely numeric path segment, compared by value.
    Number(u64),
    /// A non-numeric path segment, compared lexically.
    Text(String),
}

#[cfg(feature = "fits")]
/// Reads calibration measurements from a directory of FITS files.
///
/// Each file's primary-HDU header must expose `AZ-MNT`/`EL-MNT` (or the legacy synonym
/// `AZ-MOUNT`/`EL-MOUNT`), `AZ-SOLV`/`EL-SOLV`, and `DATE-OBS`. Files whose `AZ-MNTDC`/`EL-MNTDC`
/// duty cycle exceeds 50 in magnitude on either axis are skipped. Files are visited in natural
/// sort order.
///
/// `AZ-MNT`/`EL-MNT` record the real-sky commanded pointing, not raw motor-encoder counts; they
/// are passed through `initial`'s [`RotatorModel::to_motor`] once here, same as [`parse_csv`].
pub fn parse_fits_dir(
    dir: impl AsRef<Path>,
    initial: &RotatorModel,
) -> Result<Vec<Measurement>, CalibrationError> {
    use crate::fits::{FitsHeader, FitsHeaderKeyword, HduList};
    use std::fs::File;
    use std::io::BufReader;

    let dir = dir.as_ref();
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.ends_with(".fits")
                || lower.ends_with(".fits.bz2")
                || lower.ends_with(".fits.zip")
                || lower.ends_with(".fits.gz")
        })
        .collect();
    names.sort_by(|a, b| natural_sort_key(a).cmp(&natural_sort_key(b)));

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let path = dir.join(&name);
        let file = File::open(&path)?;
        let mut hdus = HduList::new(BufReader::new(file));
        let Some(hdu) = hdus.first_mut() else {
            continue;
        };
        let header = &mut hdu.header;

        let get = |header: &mut FitsHeader, key: [u8; 8]| -> Option<f64> {
            header
                .get_card(FitsHeaderKeyword::from(key))
                .and_then(|card| card.get_value::<f64>().ok())
                .map(|v| *v)
        };

        let az_dc = get(header, *b"AZ-MNTDC");
        let el_dc = get(header, *b"EL-MNTDC");
        if let (Some(az_dc), Some(el_dc)) = (az_dc, el_dc) {
            if az_dc.abs() > 50.0 || el_dc.abs() > 50.0 {
                continue;
            }
        }

        let az_mnt = get(header, *b"AZ-MNT  ").or_else(|| get(header, *b"AZ-MOUNT"));
        let el_mnt = get(header, *b"EL-MNT  ").or_else(|| get(header, *b"EL-MOUNT"));
        let az_solv = get(header, *b"AZ-SOLV ");
        let el_solv = get(header, *b"EL-SOLV ");

        let (Some(az_cmd), Some(el_cmd), Some(az_truth), Some(el_truth)) =
            (az_mnt, el_mnt, az_solv, el_solv)
        else {
            continue;
        };

        let ts = header
            .get_card(FitsHeaderKeyword::from(*b"DATE-OBS"))
            .and_then(|card| card.get_value::<String>().ok())
            .and_then(|s| s.parse::<Epoch>().ok());

        let (az_motor, el_motor) = initial.to_motor(az_cmd, el_cmd, true);
        out.push(Measurement {
            az_motor,
            el_motor,
            az_truth,
            el_truth,
            ts,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RotatorParams;

    #[test]
    fn parses_simple_csv() {
        let text = "# comment\n10.0, 20.0, 10.1, 20.2\n  \n30, 40, 30.1, 40.2, 2020-01-01T00:00:00Z\n";
        let identity = RotatorModel::new(RotatorParams::default());
        let rows = parse_csv(text.as_bytes(), &identity).unwrap();
        assert_eq!(rows.len(), 2);
        assert!((rows[0].az_motor - 10.0).abs() < 1e-9);
        assert!(rows[1].ts.is_some());
    }

    #[test]
    fn applies_the_initial_model_to_convert_commanded_to_motor_frame() {
        let text = "10.0, 20.0, 10.1, 20.2\n";
        let params = RotatorParams {
            az_off: 5.0,
            ..RotatorParams::default()
        };
        let model = RotatorModel::new(params);
        let rows = parse_csv(text.as_bytes(), &model).unwrap();
        let (expect_az, expect_el) = model.to_motor(10.0, 20.0, true);
        assert!((rows[0].az_motor - expect_az).abs() < 1e-9);
        assert!((rows[0].el_motor - expect_el).abs() < 1e-9);
    }

    #[test]
    fn rejects_short_lines() {
        let text = "10.0, 20.0\n";
        let identity = RotatorModel::new(RotatorParams::default());
        assert!(parse_csv(text.as_bytes(), &identity).is_err());
    }

    #[test]
    fn natural_sort_orders_numeric_runs() {
        let mut names = vec!["frame_10.fits", "frame_2.fits", "frame_1.fits"];
        names.sort_by(|a, b| natural_sort_key(a).cmp(&natural_sort_key(b)));
        assert_eq!(names, vec!["frame_1.fits", "frame_2.fits", "frame_10.fits"]);
    }
}
