//! End-to-end scenarios for the rotator geometric model.

use skyrotor::geometry::{RotatorModel, RotatorParams};

#[test]
fn s1_identity_model_passes_through() {
    let model = RotatorModel::new(RotatorParams::default());
    let (az, el) = model.to_real(90.0, 45.0, true);
    assert!((az - 90.0).abs() < 1e-9);
    assert!((el - 45.0).abs() < 1e-9);
}

#[test]
fn s2_offset_only_model() {
    let params = RotatorParams {
        az_off: 1.0,
        el_off: -2.0,
        ..RotatorParams::default()
    };
    let model = RotatorModel::new(params);
    let (az, el) = model.to_real(91.0, 43.0, true);
    assert!((az - 90.0).abs() < 1e-6, "az={az}");
    assert!((el - 45.0).abs() < 1e-6, "el={el}");
}

#[test]
fn s3_platform_tilt_lifts_or_lowers_horizon() {
    let params = RotatorParams {
        tilt_az: 0.0,
        tilt_angle: 1.0,
        ..RotatorParams::default()
    };
    let model = RotatorModel::new(params);

    let (az0, el0) = model.to_real(0.0, 0.0, true);
    assert!(el0 > 0.0, "el0={el0}");
    assert!((el0 - 1.0).abs() < 0.05, "el0={el0}");
    assert!(az0.abs() < 0.01 || (az0 - 360.0).abs() < 0.01, "az0={az0}");

    let (az1, el1) = model.to_real(180.0, 0.0, true);
    assert!(el1 < 0.0, "el1={el1}");
    assert!((el1 + 1.0).abs() < 0.05, "el1={el1}");
    assert!((az1 - 180.0).abs() < 0.01, "az1={az1}");
}

#[test]
fn s4_azimuth_branch_is_continuous_across_the_cut() {
    let model = RotatorModel::new(RotatorParams::default());
    let (az_a, _) = model.to_real(-170.0, 10.0, false);
    let (az_b, _) = model.to_real(190.0, 10.0, false);
    assert!((skyrotor::geometry::quaternion::wrapdeg(az_a) - skyrotor::geometry::quaternion::wrapdeg(az_b)).abs() < 1e-6);
    assert!((az_a - -170.0).abs() <= 0.01 || (az_a - 190.0).abs() <= 0.01);
    assert!((az_b - -170.0).abs() <= 0.01 || (az_b - 190.0).abs() <= 0.01);
}

#[test]
fn round_trip_holds_in_the_small_tilt_regime() {
    let params = RotatorParams {
        az_off: 0.5,
        el_off: -0.3,
        az_gain: 1.01,
        el_gain: 0.99,
        tilt_az: 40.0,
        tilt_angle: 2.0,
        lateral_tilt: 1.0,
    };
    let model = RotatorModel::new(params);
    for az in [-170.0, -45.0, 0.0, 45.0, 90.0, 150.0] {
        for el in [-60.0, -10.0, 0.0, 30.0, 70.0] {
            let (real_az, real_el) = model.to_real(az, el, true);
            let (back_az, back_el) = model.to_motor(real_az, real_el, true);
            let daz = skyrotor::geometry::quaternion::wrapdeg(back_az - az);
            assert!(daz.abs() < 1e-6, "az={az} el={el} daz={daz}");
            assert!((back_el - el).abs() < 1e-6, "az={az} el={el} del={}", back_el - el);
        }
    }
}
