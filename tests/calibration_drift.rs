//! S6: calibration recovers the true parameters in the presence of linear encoder drift.

use skyrotor::calibration::{Calibrator, Measurement, Method};
use skyrotor::geometry::{RotatorModel, RotatorParams};

#[test]
fn s6_calibration_with_drift_recovers_truth() {
    let truth = RotatorParams {
        az_off: 2.0,
        el_off: -1.0,
        az_gain: 1.002,
        el_gain: 0.998,
        tilt_az: 10.0,
        tilt_angle: 0.5,
        lateral_tilt: 0.1,
    };
    let model = RotatorModel::new(truth);

    let n = 10;
    let data: Vec<Measurement> = (0..n)
        .map(|i| {
            let az = -100.0 + 20.0 * i as f64;
            let el = 20.0 + 2.0 * i as f64;
            let (az_m, el_m) = model.to_motor(az, el, true);
            let drift = 0.5 * i as f64;
            Measurement {
                az_motor: az_m + drift,
                el_motor: el_m + drift,
                az_truth: az,
                el_truth: el,
                ts: None,
            }
        })
        .collect();

    let calibrator = Calibrator::new(RotatorParams::default(), Method::LeastSquares, 2)
        .with_drift_removal(3);
    let result = calibrator.fit(&data).unwrap();

    assert!((result.params.az_off - truth.az_off).abs() < 0.05, "{:?}", result.params);
    assert!((result.params.el_off - truth.el_off).abs() < 0.05, "{:?}", result.params);
    assert!((result.params.az_gain - truth.az_gain).abs() < 0.001, "{:?}", result.params);
    assert!((result.params.el_gain - truth.el_gain).abs() < 0.001, "{:?}", result.params);
}
