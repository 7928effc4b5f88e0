//! Hamilton quaternions and the body-fixed Euler composition used by the rotator model.

use std::ops::Mul;

/// One of the three coordinate axes, used to build elementary rotation quaternions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// The x axis (north, in the ground-station frame).
    X,
    /// The y axis (east).
    Y,
    /// The z axis (down).
    Z,
}

/// A unit Hamilton quaternion `w + xi + yj + zk`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    /// Scalar part.
    pub w: f64,
    /// i component.
    pub x: f64,
    /// j component.
    pub y: f64,
    /// k component.
    pub z: f64,
}

impl Quaternion {
    /// The multiplicative identity (no rotation).
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Constructs a pure (zero scalar part) quaternion from a 3-vector.
    pub const fn pure(v: [f64; 3]) -> Quaternion {
        Quaternion {
            w: 0.0,
            x: v[0],
            y: v[1],
            z: v[2],
        }
    }

    /// The elementary rotation of `angle_rad` about one coordinate axis.
    pub fn axis_angle(axis: Axis, angle_rad: f64) -> Quaternion {
        let half = angle_rad / 2.0;
        let (s, c) = half.sin_cos();
        match axis {
            Axis::X => Quaternion { w: c, x: s, y: 0.0, z: 0.0 },
            Axis::Y => Quaternion { w: c, x: 0.0, y: s, z: 0.0 },
            Axis::Z => Quaternion { w: c, x: 0.0, y: 0.0, z: s },
        }
    }

    /// Builds the rotation represented by a rotation vector: direction is the rotation axis,
    /// magnitude (in radians) is the rotation angle.
    pub fn from_rotation_vector(v: [f64; 3]) -> Quaternion {
        let angle = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if angle == 0.0 {
            return Quaternion::IDENTITY;
        }
        let axis = [v[0] / angle, v[1] / angle, v[2] / angle];
        let half = angle / 2.0;
        let (s, c) = half.sin_cos();
        Quaternion {
            w: c,
            x: axis[0] * s,
            y: axis[1] * s,
            z: axis[2] * s,
        }
    }

    /// The conjugate `w - xi - yj - zk`. Equal to the inverse for unit quaternions.
    pub fn conj(&self) -> Quaternion {
        Quaternion {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    /// The vector (i, j, k) part.
    pub fn vec(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    fn mul(self, rhs: Quaternion) -> Quaternion {
        Quaternion {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }
}

/// Composes a sequence of body-fixed Euler rotations into a single quaternion.
///
/// Each subsequent rotation is applied in the frame produced by all previous rotations
/// (body-fixed convention), so the result is the Hamilton product `q_1 * q_2 * ... * q_n`
/// of the elementary rotations, taken in the order given.
///
/// ```
/// use skyrotor::geometry::quaternion::{eul_to_q, Axis, Quaternion};
///
/// let q = eul_to_q(&[(Axis::Z, 0.0), (Axis::Y, 0.0)]);
/// assert_eq!(q, Quaternion::IDENTITY);
/// ```
pub fn eul_to_q(steps: &[(Axis, f64)]) -> Quaternion {
    steps
        .iter()
        .fold(Quaternion::IDENTITY, |q, &(axis, angle)| {
            q * Quaternion::axis_angle(axis, angle)
        })
}

/// Rotates a 3-vector by a (unit) quaternion via the sandwich product `q v q*`.
pub fn q_times_v(q: Quaternion, v: [f64; 3]) -> [f64; 3] {
    (q * Quaternion::pure(v) * q.conj()).vec()
}

/// Extracts yaw, pitch and roll (radians, ZYX/body-fixed convention) from a quaternion.
///
/// Pitch is clamped to `[-1, 1]` before `asin` to absorb floating-point rounding near the poles.
pub fn to_ypr(q: Quaternion) -> (f64, f64, f64) {
    let (q0, q1, q2, q3) = (q.w, q.x, q.y, q.z);
    let roll = (2.0 * (q2 * q3 + q0 * q1)).atan2(1.0 - 2.0 * (q1 * q1 + q2 * q2));
    let pitch = (-2.0 * (q1 * q3 - q0 * q2)).clamp(-1.0, 1.0).asin();
    let yaw = (2.0 * (q1 * q2 + q0 * q3)).atan2(1.0 - 2.0 * (q2 * q2 + q3 * q3));
    (yaw, pitch, roll)
}

/// Extracts `(azimuth_deg, elevation_deg)` from a quaternion, discarding roll.
pub fn to_azel(q: Quaternion) -> (f64, f64) {
    let (yaw, pitch, _roll) = to_ypr(q);
    (yaw.to_degrees(), pitch.to_degrees())
}

/// Wraps an angle in degrees to `(-180, 180]`.
///
/// ```
/// use skyrotor::geometry::quaternion::wrapdeg;
///
/// assert_eq!(wrapdeg(180.0), 180.0);
/// assert_eq!(wrapdeg(181.0), -179.0);
/// assert_eq!(wrapdeg(-181.0), 179.0);
/// assert_eq!(wrapdeg(0.0), 0.0);
/// ```
pub fn wrapdeg(angle: f64) -> f64 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapdeg_is_idempotent() {
        for raw in [-725.0_f64, -400.0, -180.0, -0.001, 0.0, 180.0, 360.0, 900.3] {
            let once = wrapdeg(raw);
            assert!(once > -180.0 && once <= 180.0, "{once} out of range");
            assert!((wrapdeg(once) - once).abs() < 1e-9);
        }
    }

    #[test]
    fn identity_quaternion_is_noop() {
        let v = [1.0, 2.0, 3.0];
        assert_eq!(q_times_v(Quaternion::IDENTITY, v), v);
    }

    #[test]
    fn axis_rotation_moves_orthogonal_vector() {
        let q = Quaternion::axis_angle(Axis::Z, std::f64::consts::FRAC_PI_2);
        let rotated = q_times_v(q, [1.0, 0.0, 0.0]);
        assert!((rotated[0] - 0.0).abs() < 1e-9);
        assert!((rotated[1] - 1.0).abs() < 1e-9);
        assert!((rotated[2] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn to_azel_recovers_pure_yaw_pitch() {
        let q = eul_to_q(&[(Axis::Z, 30f64.to_radians()), (Axis::Y, 10f64.to_radians())]);
        let (az, el) = to_azel(q);
        assert!((az - 30.0).abs() < 1e-9);
        assert!((el - 10.0).abs() < 1e-9);
    }
}
