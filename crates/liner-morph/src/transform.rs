//! Homogeneous transforms for aligning meshes before morphing.
//!
//! Scan and liner meshes rarely arrive in the same frame. These helpers
//! build 4x4 matrices for [`Mesh::transformed`](crate::Mesh::transformed).
//! Angles are in degrees.

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};

/// Rotation of `degrees` about the X axis.
pub fn rot_x(degrees: f64) -> Matrix4<f64> {
    let (s, c) = degrees.to_radians().sin_cos();
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0, //
        0.0, c, -s, 0.0, //
        0.0, s, c, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Rotation of `degrees` about the Y axis.
pub fn rot_y(degrees: f64) -> Matrix4<f64> {
    let (s, c) = degrees.to_radians().sin_cos();
    Matrix4::new(
        c, 0.0, s, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        -s, 0.0, c, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Rotation of `degrees` about the Z axis.
pub fn rot_z(degrees: f64) -> Matrix4<f64> {
    let (s, c) = degrees.to_radians().sin_cos();
    Matrix4::new(
        c, -s, 0.0, 0.0, //
        s, c, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Translation by `offset`.
pub fn translation_matrix(offset: Vector3<f64>) -> Matrix4<f64> {
    Matrix4::new_translation(&offset)
}

/// Uniform scaling by `factor`.
pub fn scaling_matrix(factor: f64) -> Matrix4<f64> {
    Matrix4::new_scaling(factor)
}

/// Apply a homogeneous matrix to a point.
pub fn transform_point(matrix: &Matrix4<f64>, point: &Point3<f64>) -> Point3<f64> {
    matrix.transform_point(point)
}

/// Rotation, uniform scale and translation: `p -> R * (s * p) + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Rotation quaternion.
    pub rotation: UnitQuaternion<f64>,
    /// Translation vector.
    pub translation: Vector3<f64>,
    /// Uniform scale factor (1.0 = no scaling).
    pub scale: f64,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// The identity.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
            scale: 1.0,
        }
    }

    /// Pure translation.
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    /// Pure rotation.
    pub fn from_rotation(rotation: UnitQuaternion<f64>) -> Self {
        Self {
            rotation,
            ..Self::identity()
        }
    }

    /// Rotation of `degrees` about `axis`.
    ///
    /// A zero axis gives the identity rotation.
    pub fn from_axis_angle(axis: Vector3<f64>, degrees: f64) -> Self {
        let rotation = nalgebra::Unit::try_new(axis, f64::EPSILON)
            .map(|axis| UnitQuaternion::from_axis_angle(&axis, degrees.to_radians()))
            .unwrap_or_else(UnitQuaternion::identity);
        Self::from_rotation(rotation)
    }

    /// Pure uniform scaling.
    pub fn from_scale(scale: f64) -> Self {
        Self {
            scale,
            ..Self::identity()
        }
    }

    /// Apply to a point.
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        let rotated = self.rotation * (point.coords * self.scale);
        Point3::from(rotated + self.translation)
    }

    /// Apply to a direction (no translation).
    pub fn transform_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * (vector * self.scale)
    }

    /// `self` followed by `other`.
    pub fn then(&self, other: &RigidTransform) -> RigidTransform {
        RigidTransform {
            rotation: other.rotation * self.rotation,
            translation: other.rotation * (self.translation * other.scale) + other.translation,
            scale: self.scale * other.scale,
        }
    }

    /// The inverse transform. Undefined for a zero scale.
    pub fn inverse(&self) -> RigidTransform {
        let rotation = self.rotation.inverse();
        let scale = 1.0 / self.scale;
        RigidTransform {
            rotation,
            translation: rotation * (-self.translation * scale),
            scale,
        }
    }

    /// As a 4x4 homogeneous matrix.
    pub fn to_matrix4(&self) -> Matrix4<f64> {
        let r = self.rotation.to_rotation_matrix();
        let mut m = Matrix4::identity();
        for i in 0..3 {
            for j in 0..3 {
                m[(i, j)] = r[(i, j)] * self.scale;
            }
            m[(i, 3)] = self.translation[i];
        }
        m
    }
}
