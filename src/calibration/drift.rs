//! Linear encoder-drift estimation, modeled as proportional to cumulative slew distance.

use crate::geometry::quaternion::wrapdeg;
use crate::geometry::RotatorModel;

use super::measurement::Measurement;

/// Per-point `(az, el)` drift to subtract from motor readings before computing residuals.
pub type Drift = Vec<(f64, f64)>;

/// Estimates encoder drift from the first and last `window` points of `data`, assuming it grows
/// linearly with cumulative absolute slew distance between those two endpoints.
///
/// Drift at point 0 equals the first-window mean error exactly; drift at the last point equals
/// the last-window mean error exactly; points in between are interpolated by cumulative absolute
/// slew distance, computed and applied per axis (az and el each use their own cumulative-distance
/// fraction). Returns one `(az, el)` drift value per measurement, already negated so it can be
/// subtracted directly from the raw motor reading.
pub fn estimate_drift(model: &RotatorModel, data: &[Measurement], window: usize) -> Drift {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    let window = window.min(n);

    let motor_truth: Vec<(f64, f64)> = data
        .iter()
        .map(|m| model.to_motor(m.az_truth, m.el_truth, true))
        .collect();

    let mean_err = |range: std::ops::Range<usize>| -> (f64, f64) {
        let len = range.len().max(1) as f64;
        let (mut sum_az, mut sum_el) = (0.0, 0.0);
        for i in range {
            sum_az += wrapdeg(motor_truth[i].0 - data[i].az_motor);
            sum_el += motor_truth[i].1 - data[i].el_motor;
        }
        (sum_az / len, sum_el / len)
    };

    let err0 = mean_err(0..window);
    let err1 = mean_err(n.saturating_sub(window)..n);

    if n == 1 {
        return vec![(-err0.0, -err0.1)];
    }

    let mut cum_az = vec![0.0_f64; n];
    let mut cum_el = vec![0.0_f64; n];
    for i in 1..n {
        cum_az[i] = cum_az[i - 1] + wrapdeg(data[i].az_motor - data[i - 1].az_motor).abs();
        cum_el[i] = cum_el[i - 1] + (data[i].el_motor - data[i - 1].el_motor).abs();
    }
    let total_az = cum_az[n - 1].max(f64::EPSILON);
    let total_el = cum_el[n - 1].max(f64::EPSILON);

    (0..n)
        .map(|i| {
            let frac_az = cum_az[i] / total_az;
            let frac_el = cum_el[i] / total_el;
            let az = err0.0 + (err1.0 - err0.0) * frac_az;
            let el = err0.1 + (err1.1 - err0.1) * frac_el;
            (-az, -el)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RotatorParams;

    #[test]
    fn zero_data_gives_no_drift() {
        let model = RotatorModel::new(RotatorParams::default());
        assert!(estimate_drift(&model, &[], 3).is_empty());
    }

    #[test]
    fn drift_interpolates_between_endpoints() {
        let model = RotatorModel::new(RotatorParams::default());
        let data: Vec<Measurement> = (0..10)
            .map(|i| {
                let az = i as f64 * 10.0;
                Measurement {
                    az_motor: az + 0.5 * i as f64,
                    el_motor: 20.0,
                    az_truth: az,
                    el_truth: 20.0,
                    ts: None,
                }
            })
            .collect();
        let drift = estimate_drift(&model, &data, 3);
        assert_eq!(drift.len(), 10);
        // drift should grow in magnitude roughly monotonically along the slew
        assert!(drift[9].0.abs() >= drift[0].0.abs());
    }
}
