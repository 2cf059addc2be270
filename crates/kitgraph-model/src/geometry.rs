//! Plain geometric values stored in kits and designs.

use kitgraph_math::{round_to, Point3, Tolerance, Transform, Vec3};
use serde::{Deserialize, Serialize};

/// A position in 3D space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The point as an nalgebra point.
    pub fn to_point3(self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}

impl From<Point3> for Point {
    fn from(p: Point3) -> Self {
        Self::new(p.x, p.y, p.z)
    }
}

/// A direction or offset in 3D space. Not normalized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vector {
    /// Create a new vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The vector as an nalgebra vector.
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

impl From<Vec3> for Vector {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// A 2D position on the design diagram.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord {
    /// Horizontal diagram position.
    pub x: f64,
    /// Vertical diagram position.
    pub y: f64,
}

impl Coord {
    /// Create a new diagram coordinate.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A placement frame: origin plus two in-plane axes.
///
/// The axes are not required to be orthonormal. Conversion to a matrix
/// normalizes x, derives z as `x × y` and re-orthogonalizes y as `z × x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plane {
    /// Origin of the frame.
    pub origin: Point,
    /// Local x axis.
    pub x_axis: Vector,
    /// Local y axis.
    pub y_axis: Vector,
}

impl Plane {
    /// Create a plane from an origin and two axes.
    pub fn new(origin: Point, x_axis: Vector, y_axis: Vector) -> Self {
        Self {
            origin,
            x_axis,
            y_axis,
        }
    }

    /// World XY plane at the origin.
    pub fn identity() -> Self {
        Self::new(
            Point::default(),
            Vector::new(1.0, 0.0, 0.0),
            Vector::new(0.0, 1.0, 0.0),
        )
    }

    /// Rigid transform of this frame, or `None` when its axes are degenerate.
    pub fn to_transform(&self, tol: &Tolerance) -> Option<Transform> {
        Transform::from_frame(
            &self.origin.to_point3(),
            &self.x_axis.to_vec3(),
            &self.y_axis.to_vec3(),
            tol,
        )
    }

    /// The frame described by a transform's translation and first two columns.
    pub fn from_transform(transform: &Transform) -> Self {
        let (origin, x_axis, y_axis) = transform.frame();
        Self::new(origin.into(), x_axis.into(), y_axis.into())
    }

    /// Every component rounded to `decimals` places.
    pub fn rounded(&self, decimals: u32) -> Self {
        let point = |p: Point| {
            Point::new(
                round_to(p.x, decimals),
                round_to(p.y, decimals),
                round_to(p.z, decimals),
            )
        };
        let vector = |v: Vector| {
            Vector::new(
                round_to(v.x, decimals),
                round_to(v.y, decimals),
                round_to(v.z, decimals),
            )
        };
        Self::new(point(self.origin), vector(self.x_axis), vector(self.y_axis))
    }

    /// Component-wise comparison within the linear tolerance.
    pub fn approx_eq(&self, other: &Plane, tol: &Tolerance) -> bool {
        let close = |a: [f64; 3], b: [f64; 3]| a.iter().zip(b).all(|(x, y)| tol.is_zero(x - y));
        let p = |p: Point| [p.x, p.y, p.z];
        let v = |v: Vector| [v.x, v.y, v.z];
        close(p(self.origin), p(other.origin))
            && close(v(self.x_axis), v(other.x_axis))
            && close(v(self.y_axis), v(other.y_axis))
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self::identity()
    }
}
