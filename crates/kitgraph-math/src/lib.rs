#![warn(missing_docs)]

//! Math types for the kitgraph resolution engine.
//!
//! Thin wrappers around nalgebra providing the rigid transforms the
//! resolver composes: translations, axis rotations, frame construction
//! from an origin plus two axes, and tolerance helpers.

use nalgebra::{Unit, Vector3, Vector4};

pub use nalgebra::Matrix4;

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Translation by a vector.
    pub fn translation_by(v: &Vec3) -> Self {
        Self::translation(v.x, v.y, v.z)
    }

    /// Rotation about an arbitrary axis through the origin by `angle` radians.
    ///
    /// Uses Rodrigues' rotation formula.
    pub fn rotation_about_axis(axis: &Dir3, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        let (x, y, z) = (axis.as_ref().x, axis.as_ref().y, axis.as_ref().z);
        let mut m = Matrix4::identity();
        m[(0, 0)] = t * x * x + c;
        m[(0, 1)] = t * x * y - s * z;
        m[(0, 2)] = t * x * z + s * y;
        m[(1, 0)] = t * x * y + s * z;
        m[(1, 1)] = t * y * y + c;
        m[(1, 2)] = t * y * z - s * x;
        m[(2, 0)] = t * x * z - s * y;
        m[(2, 1)] = t * y * z + s * x;
        m[(2, 2)] = t * z * z + c;
        Self { matrix: m }
    }

    /// Shortest rotation taking direction `from` onto direction `to`.
    ///
    /// Both inputs are normalized first. Antiparallel directions rotate by π
    /// about the z axis when `to` lies in the xy plane, otherwise about
    /// `z × to` (falling back to the x axis when `to` is parallel to z).
    /// Returns `None` if either input has zero length.
    pub fn rotation_between(from: &Vec3, to: &Vec3, tol: &Tolerance) -> Option<Self> {
        let f = from.try_normalize(tol.linear)?;
        let t = to.try_normalize(tol.linear)?;
        let dot = f.dot(&t).clamp(-1.0, 1.0);
        if dot >= 1.0 - tol.angular {
            return Some(Self::identity());
        }
        if dot <= -1.0 + tol.angular {
            let axis = if t.z.abs() < tol.linear {
                Vec3::z()
            } else {
                Vec3::z()
                    .cross(&t)
                    .try_normalize(tol.linear)
                    .unwrap_or_else(Vec3::x)
            };
            return Some(Self::rotation_about_axis(
                &Dir3::new_normalize(axis),
                std::f64::consts::PI,
            ));
        }
        let axis = Dir3::new_normalize(f.cross(&t));
        Some(Self::rotation_about_axis(&axis, dot.acos()))
    }

    /// Rigid frame with the given origin and axes.
    ///
    /// The x axis is normalized, z is `x × y`, and y is re-orthogonalized as
    /// `z × x`. Returns `None` when the axes are degenerate (zero or parallel).
    pub fn from_frame(origin: &Point3, x_axis: &Vec3, y_axis: &Vec3, tol: &Tolerance) -> Option<Self> {
        let x = x_axis.try_normalize(tol.linear)?;
        let z = x.cross(y_axis).try_normalize(tol.linear)?;
        let y = z.cross(&x).normalize();
        let mut m = Matrix4::identity();
        for row in 0..3 {
            m[(row, 0)] = x[row];
            m[(row, 1)] = y[row];
            m[(row, 2)] = z[row];
        }
        m[(0, 3)] = origin.x;
        m[(1, 3)] = origin.y;
        m[(2, 3)] = origin.z;
        Some(Self { matrix: m })
    }

    /// Origin, x axis and y axis of this transform's frame.
    pub fn frame(&self) -> (Point3, Vec3, Vec3) {
        let m = &self.matrix;
        (
            Point3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]),
            Vec3::new(m[(0, 0)], m[(1, 0)], m[(2, 0)]),
            Vec3::new(m[(0, 1)], m[(1, 1)], m[(2, 1)]),
        )
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Inverse of a rigid transform: transposed rotation, back-rotated translation.
    ///
    /// Exact for rotation + translation matrices; use [`inverse`](Self::inverse)
    /// for general affine transforms.
    pub fn rigid_inverse(&self) -> Self {
        let m = &self.matrix;
        let mut out = Matrix4::identity();
        for row in 0..3 {
            for col in 0..3 {
                out[(row, col)] = m[(col, row)];
            }
        }
        for row in 0..3 {
            out[(row, 3)] = -(0..3).map(|k| m[(k, row)] * m[(k, 3)]).sum::<f64>();
        }
        Self { matrix: out }
    }

    /// Element-wise comparison within the linear tolerance.
    pub fn approx_eq(&self, other: &Transform, tol: &Tolerance) -> bool {
        self.matrix
            .iter()
            .zip(other.matrix.iter())
            .all(|(a, b)| (a - b).abs() < tol.linear)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default tolerances (1e-5 linear, 1e-9 rad angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-5,
        angular: 1e-9,
    };

    /// Tolerance with the given linear distance and the default angular bound.
    pub fn linear(linear: f64) -> Self {
        Self {
            linear,
            ..Self::DEFAULT
        }
    }

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Round `value` to `decimals` decimal places, mapping `-0.0` to `0.0`.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_rigid_inverse_matches_general_inverse() {
        let axis = Dir3::new_normalize(Vec3::new(1.0, 2.0, 3.0));
        let t = Transform::translation(4.0, -5.0, 6.0).then(&Transform::rotation_about_axis(&axis, 0.7));
        let tol = Tolerance::DEFAULT;
        assert!(t.rigid_inverse().approx_eq(&t.inverse().unwrap(), &tol));
        assert!(t.then(&t.rigid_inverse()).approx_eq(&Transform::identity(), &tol));
    }

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result - p).norm() < 1e-12);
    }

    #[test]
    fn test_translation() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let result = t.apply_point(&Point3::new(1.0, 2.0, 3.0));
        assert!((result.x - 11.0).abs() < 1e-12);
        assert!((result.y - 22.0).abs() < 1e-12);
        assert!((result.z - 33.0).abs() < 1e-12);
        // directions ignore translation
        let v = t.apply_vec(&Vec3::x());
        assert!((v - Vec3::x()).norm() < 1e-12);
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let rotate = Transform::rotation_about_axis(&Dir3::new_normalize(Vec3::z()), PI / 2.0);
        let translate = Transform::translation(1.0, 0.0, 0.0);
        // (rotate * translate)(origin) = rotate((1,0,0)) = (0,1,0)
        let result = rotate.then(&translate).apply_point(&Point3::origin());
        assert!(result.x.abs() < 1e-12);
        assert!((result.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse() {
        let t = Transform::translation(1.0, 2.0, 3.0)
            .then(&Transform::rotation_about_axis(&Dir3::new_normalize(Vec3::new(1.0, 1.0, 0.0)), 0.3));
        let inv = t.inverse().unwrap();
        let p = Point3::new(5.0, 6.0, 7.0);
        let result = t.then(&inv).apply_point(&p);
        assert!((result - p).norm() < 1e-12);
    }

    #[test]
    fn test_rotation_about_axis() {
        let axis = Dir3::new_normalize(Vec3::z());
        let t = Transform::rotation_about_axis(&axis, PI / 2.0);
        let result = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(result.x.abs() < 1e-12);
        assert!((result.y - 1.0).abs() < 1e-12);
        assert!(result.z.abs() < 1e-12);
    }

    #[test]
    fn test_rotation_between_general() {
        let tol = Tolerance::DEFAULT;
        let from = Vec3::new(1.0, 0.0, 0.0);
        let to = Vec3::new(0.0, 3.0, 0.0);
        let r = Transform::rotation_between(&from, &to, &tol).unwrap();
        let mapped = r.apply_vec(&from);
        assert!((mapped - Vec3::y()).norm() < 1e-12);
    }

    #[test]
    fn test_rotation_between_parallel_is_identity() {
        let tol = Tolerance::DEFAULT;
        let r = Transform::rotation_between(&Vec3::y(), &Vec3::new(0.0, 2.0, 0.0), &tol).unwrap();
        assert!(r.approx_eq(&Transform::identity(), &tol));
    }

    #[test]
    fn test_rotation_between_antiparallel() {
        let tol = Tolerance::DEFAULT;
        // in the xy plane: half turn about z
        let r = Transform::rotation_between(&Vec3::y(), &-Vec3::y(), &tol).unwrap();
        assert!((r.apply_vec(&Vec3::y()) + Vec3::y()).norm() < 1e-12);
        assert!((r.apply_vec(&Vec3::z()) - Vec3::z()).norm() < 1e-12);

        // along z: axis falls back to x
        let r = Transform::rotation_between(&Vec3::z(), &-Vec3::z(), &tol).unwrap();
        assert!((r.apply_vec(&Vec3::z()) + Vec3::z()).norm() < 1e-12);
        assert!((r.apply_vec(&Vec3::x()) - Vec3::x()).norm() < 1e-12);

        // tilted target
        let to = Vec3::new(0.0, 1.0, 1.0);
        let r = Transform::rotation_between(&-to, &to, &tol).unwrap();
        assert!((r.apply_vec(&-to) - to).norm() < 1e-9);
    }

    #[test]
    fn test_rotation_between_zero_vector() {
        let tol = Tolerance::DEFAULT;
        assert!(Transform::rotation_between(&Vec3::zeros(), &Vec3::x(), &tol).is_none());
    }

    #[test]
    fn test_frame_roundtrip() {
        let tol = Tolerance::DEFAULT;
        let origin = Point3::new(1.0, 2.0, 3.0);
        let t = Transform::from_frame(&origin, &Vec3::new(2.0, 0.0, 0.0), &Vec3::new(0.5, 1.0, 0.0), &tol)
            .unwrap();
        let (o, x, y) = t.frame();
        assert!(tol.points_equal(&o, &origin));
        assert!((x - Vec3::x()).norm() < 1e-12);
        // y is re-orthogonalized against x
        assert!((y - Vec3::y()).norm() < 1e-12);
    }

    #[test]
    fn test_frame_degenerate() {
        let tol = Tolerance::DEFAULT;
        assert!(Transform::from_frame(&Point3::origin(), &Vec3::x(), &Vec3::x(), &tol).is_none());
        assert!(Transform::from_frame(&Point3::origin(), &Vec3::zeros(), &Vec3::y(), &tol).is_none());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.234_567_89, 5), 1.23457);
        assert_eq!(round_to(-0.000_000_1, 5), 0.0);
        assert!(round_to(-0.000_000_1, 5).is_sign_positive());
    }

    #[test]
    fn test_tolerance_points_equal() {
        let tol = Tolerance::DEFAULT;
        let a = Point3::new(1.0, 2.0, 3.0);
        let b = Point3::new(1.0 + 1e-7, 2.0, 3.0);
        assert!(tol.points_equal(&a, &b));
        let c = Point3::new(1.001, 2.0, 3.0);
        assert!(!tol.points_equal(&a, &c));
    }
}
