//! The seven-parameter rotator forward/inverse geometric transform.

use std::cell::RefCell;

use super::params::RotatorParams;
use super::quaternion::{eul_to_q, q_times_v, to_azel, wrapdeg, Axis, Quaternion};

const TILT_CACHE_SIZE: usize = 128;

/// A small bounded least-recently-used cache, keyed by exact bit pattern of its float inputs.
///
/// Platform/payload tilt quaternions depend only on calibration parameters, which change rarely,
/// but are recomputed on every residual evaluation during optimization — memoizing them by
/// parameter tuple avoids millions of redundant trig calls per fit.
struct TiltCache<K, V> {
    entries: Vec<(K, V)>,
    capacity: usize,
}

impl<K: PartialEq + Copy, V: Copy> TiltCache<K, V> {
    fn new(capacity: usize) -> Self {
        TiltCache {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn get_or_insert_with(&mut self, key: K, f: impl FnOnce() -> V) -> V {
        if let Some(pos) = self.entries.iter().position(|(k, _)| *k == key) {
            let entry = self.entries.remove(pos);
            let value = entry.1;
            self.entries.push((key, value));
            return value;
        }
        let value = f();
        if self.entries.len() >= self.capacity {
            self.entries.remove(0);
        }
        self.entries.push((key, value));
        value
    }
}

/// The seven-parameter rotator geometric model: converts between motor and real sky angles.
///
/// Assumes a right-handed ground-station frame with x pointing north, y east and z down, so
/// `az = 0, el = 0` is the horizon due north and positive elevation lifts above the horizon.
pub struct RotatorModel {
    params: RotatorParams,
    platform_cache: RefCell<TiltCache<(u64, u64), Quaternion>>,
    payload_cache: RefCell<TiltCache<u64, Quaternion>>,
}

impl Clone for RotatorModel {
    fn clone(&self) -> Self {
        RotatorModel::new(self.params)
    }
}

impl std::fmt::Debug for RotatorModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatorModel").field("params", &self.params).finish()
    }
}

impl RotatorModel {
    /// Builds a model from the given parameters.
    pub fn new(params: RotatorParams) -> Self {
        RotatorModel {
            params,
            platform_cache: RefCell::new(TiltCache::new(TILT_CACHE_SIZE)),
            payload_cache: RefCell::new(TiltCache::new(TILT_CACHE_SIZE)),
        }
    }

    /// The parameters backing this model.
    pub fn params(&self) -> RotatorParams {
        self.params
    }

    fn payload_q(&self) -> Quaternion {
        let key = self.params.lateral_tilt.to_bits();
        self.payload_cache.borrow_mut().get_or_insert_with(key, || {
            eul_to_q(&[(Axis::Z, self.params.lateral_tilt.to_radians())])
        })
    }

    fn platform_q(&self) -> Quaternion {
        let key = (self.params.tilt_az.to_bits(), self.params.tilt_angle.to_bits());
        self.platform_cache.borrow_mut().get_or_insert_with(key, || {
            let tilt_axis = q_times_v(
                eul_to_q(&[(Axis::Z, (self.params.tilt_az - 90.0).to_radians())]),
                [1.0, 0.0, 0.0],
            );
            let angle_rad = self.params.tilt_angle.to_radians();
            Quaternion::from_rotation_vector([
                tilt_axis[0] * angle_rad,
                tilt_axis[1] * angle_rad,
                tilt_axis[2] * angle_rad,
            ])
        })
    }

    /// Converts motor-frame `(az, el)` in degrees to real sky `(az, el)` in degrees.
    ///
    /// If `wrap` is false, the azimuth branch nearest to the input `az` is chosen, keeping
    /// trajectories continuous when they straddle the +/-180 degree cut.
    pub fn to_real(&self, az: f64, el: f64, wrap: bool) -> (f64, f64) {
        let az_m = wrapdeg((az - self.params.az_off) / self.params.az_gain).to_radians();
        let el_m = ((el - self.params.el_off) / self.params.el_gain).to_radians();

        let q_m = eul_to_q(&[(Axis::Z, az_m), (Axis::Y, el_m)]);
        let q_r = self.platform_q() * q_m * self.payload_q();
        let (mut az_r, el_r) = to_azel(q_r);

        if !wrap && (az_r - az).abs() > 180.0 {
            az_r += 360.0;
        }
        (az_r, el_r)
    }

    /// Converts motor-frame angular rates (degrees/second) at `(az, el)` to real-frame rates.
    pub fn rate_to_real(&self, az: f64, el: f64, az_dot: f64, el_dot: f64) -> (f64, f64) {
        let az_m = wrapdeg((az - self.params.az_off) / self.params.az_gain).to_radians();
        let el_m = ((el - self.params.el_off) / self.params.el_gain).to_radians();
        let q_m = eul_to_q(&[(Axis::Z, az_m), (Axis::Y, el_m)]);
        let q_r = self.platform_q() * q_m * self.payload_q();

        let omega_m = Quaternion {
            w: 0.0,
            x: 0.0,
            y: el_dot.to_radians() / self.params.el_gain,
            z: az_dot.to_radians() / self.params.az_gain,
        };
        let q_m_dot = Quaternion {
            w: 0.5 * omega_m.w,
            x: 0.5 * omega_m.x,
            y: 0.5 * omega_m.y,
            z: 0.5 * omega_m.z,
        } * q_m;
        let q_r_dot = self.platform_q() * q_m_dot * self.payload_q();
        let omega_r = {
            let two_qdot_qconj = q_r_dot * q_r.conj();
            Quaternion {
                w: 2.0 * two_qdot_qconj.w,
                x: 2.0 * two_qdot_qconj.x,
                y: 2.0 * two_qdot_qconj.y,
                z: 2.0 * two_qdot_qconj.z,
            }
        };
        (omega_r.z.to_degrees(), omega_r.y.to_degrees())
    }

    /// Converts real sky `(az, el)` in degrees to motor-frame `(az, el)` in degrees.
    ///
    /// `to_real`'s `(az, el)` output is the pointing direction extracted from the composed
    /// quaternion `Q_platform . q_m . Q_payload` via [`to_azel`], which discards that
    /// quaternion's roll about the boresight. Because of that, `q_m = Q_platform* . q_r .
    /// Q_payload*` followed by the same extraction is only an approximate inverse once
    /// `tilt_angle`/`lateral_tilt` are nonzero: the discarded roll does not commute with the
    /// tilts. This closed-form estimate is used as the starting point for a Newton-Raphson
    /// refinement against [`RotatorModel::to_real`] itself (central-difference Jacobian, 2x2
    /// linear solve per step), which drives the round trip to floating-point precision.
    pub fn to_motor(&self, az: f64, el: f64, wrap: bool) -> (f64, f64) {
        let (mut az_m, mut el_m) = self.to_motor_estimate(az, el);

        const H: f64 = 1e-6;
        for _ in 0..8 {
            let (real_az, real_el) = self.to_real(az_m, el_m, true);
            let err_az = wrapdeg(az - real_az);
            let err_el = el - real_el;
            if err_az.abs() < 1e-10 && err_el.abs() < 1e-10 {
                break;
            }

            let (real_az_daz, real_el_daz) = self.to_real(az_m + H, el_m, true);
            let (real_az_del, real_el_del) = self.to_real(az_m, el_m + H, true);
            // Jacobian of to_real w.r.t. (az_m, el_m), central-difference-free (single-sided is
            // enough since only the step direction matters for Newton's method).
            let j_az_azm = wrapdeg(real_az_daz - real_az) / H;
            let j_el_azm = (real_el_daz - real_el) / H;
            let j_az_elm = wrapdeg(real_az_del - real_az) / H;
            let j_el_elm = (real_el_del - real_el) / H;

            let det = j_az_azm * j_el_elm - j_az_elm * j_el_azm;
            if !det.is_finite() || det.abs() < 1e-12 {
                break;
            }
            let d_az_m = (err_az * j_el_elm - j_az_elm * err_el) / det;
            let d_el_m = (j_az_azm * err_el - err_az * j_el_azm) / det;
            az_m += d_az_m;
            el_m += d_el_m;
        }

        az_m = wrapdeg(az_m);
        if !wrap && (az_m - az).abs() > 180.0 {
            az_m += 360.0;
        }
        (az_m, el_m)
    }

    /// Closed-form first estimate for [`RotatorModel::to_motor`], ignoring the roll discarded
    /// by [`to_azel`]. Exact for the identity/no-tilt model; used only as a Newton seed.
    fn to_motor_estimate(&self, az: f64, el: f64) -> (f64, f64) {
        let q_r = eul_to_q(&[(Axis::Z, az.to_radians()), (Axis::Y, el.to_radians())]);
        let q_m = self.platform_q().conj() * q_r * self.payload_q().conj();
        let (az_m_raw, el_m_raw) = to_azel(q_m);
        (
            wrapdeg(az_m_raw * self.params.az_gain + self.params.az_off),
            el_m_raw * self.params.el_gain + self.params.el_off,
        )
    }

    /// Converts real-frame angular rates (degrees/second) at `(az, el)` to motor-frame rates.
    pub fn rate_to_motor(&self, az: f64, el: f64, az_dot: f64, el_dot: f64) -> (f64, f64) {
        let q_r = eul_to_q(&[(Axis::Z, az.to_radians()), (Axis::Y, el.to_radians())]);
        let q_m = self.platform_q().conj() * q_r * self.payload_q().conj();

        let omega_r = Quaternion {
            w: 0.0,
            x: 0.0,
            y: el_dot.to_radians(),
            z: az_dot.to_radians(),
        };
        let q_r_dot = Quaternion {
            w: 0.5 * omega_r.w,
            x: 0.5 * omega_r.x,
            y: 0.5 * omega_r.y,
            z: 0.5 * omega_r.z,
        } * q_r;
        let q_m_dot = self.platform_q().conj() * q_r_dot * self.payload_q().conj();
        let omega_m = {
            let two_qdot_qconj = q_m_dot * q_m.conj();
            Quaternion {
                w: 2.0 * two_qdot_qconj.w,
                x: 2.0 * two_qdot_qconj.x,
                y: 2.0 * two_qdot_qconj.y,
                z: 2.0 * two_qdot_qconj.z,
            }
        };
        (
            self.params.az_gain * omega_m.z.to_degrees(),
            self.params.el_gain * omega_m.y.to_degrees(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{a} !~= {b} (tol {tol})");
    }

    #[test]
    fn identity_params_pass_through() {
        let model = RotatorModel::new(RotatorParams::default());
        let (az, el) = model.to_real(90.0, 45.0, false);
        approx_eq(az, 90.0, 1e-9);
        approx_eq(el, 45.0, 1e-9);

        let (az, el) = model.to_motor(90.0, 45.0, false);
        approx_eq(az, 90.0, 1e-9);
        approx_eq(el, 45.0, 1e-9);
    }

    #[test]
    fn offset_only_model() {
        let params = RotatorParams {
            az_off: 1.0,
            el_off: -2.0,
            ..RotatorParams::default()
        };
        let model = RotatorModel::new(params);
        let (az, el) = model.to_real(91.0, 43.0, false);
        approx_eq(az, 90.0, 1e-6);
        approx_eq(el, 45.0, 1e-6);
    }

    #[test]
    fn platform_tilt_lifts_or_lowers_horizon() {
        let params = RotatorParams {
            tilt_az: 0.0,
            tilt_angle: 1.0,
            ..RotatorParams::default()
        };
        let model = RotatorModel::new(params);
        let (az0, el0) = model.to_real(0.0, 0.0, false);
        let (az180, el180) = model.to_real(180.0, 0.0, false);
        assert!(el0 > 0.5 && el0 < 1.5);
        assert!(el180 < -0.5 && el180 > -1.5);
        approx_eq(az0, 0.0, 0.01);
        approx_eq(wrapdeg(az180 - 180.0), 0.0, 0.5);
    }

    #[test]
    fn azimuth_branch_selection_is_continuous() {
        let model = RotatorModel::new(RotatorParams::default());
        let (az1, _) = model.to_real(-170.0, 10.0, false);
        let (az2, _) = model.to_real(190.0, 10.0, false);
        approx_eq(wrapdeg(az1), wrapdeg(az2), 0.01);
    }

    #[test]
    fn round_trip_within_small_tilt_regime() {
        let params = RotatorParams {
            az_off: 2.0,
            el_off: -1.0,
            az_gain: 1.02,
            el_gain: 0.98,
            tilt_az: 37.0,
            tilt_angle: 2.0,
            lateral_tilt: -1.5,
        };
        let model = RotatorModel::new(params);
        for &(az, el) in &[(10.0, 20.0), (170.0, 45.0), (-60.0, 70.0), (300.0, 5.0)] {
            let (real_az, real_el) = model.to_real(az, el, true);
            let (back_az, back_el) = model.to_motor(real_az, real_el, true);
            approx_eq(wrapdeg(back_az - az), 0.0, 1e-6);
            approx_eq(back_el, el, 1e-6);
        }
    }
}
