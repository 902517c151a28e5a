//! Orthonormal shading frames.

use super::common::Dot;
use super::{Normal3f, Vector3f};
use crate::pbrt::{abs, Float};

/// Create an orthonormal coordinate system around a single unit vector and
/// return the two missing basis vectors.
///
/// The second vector is constructed by zeroing one coordinate, swapping the
/// remaining two and negating one of them; the third is the cross product of
/// the first two.
///
/// * `v1` - The first unit vector of the coordinate system.
pub fn coordinate_system(v1: &Vector3f) -> (Vector3f, Vector3f) {
    let v2 = if abs(v1.x) > abs(v1.y) {
        Vector3f::new(-v1.z, 0.0, v1.x) / (v1.x * v1.x + v1.z * v1.z).sqrt()
    } else {
        Vector3f::new(0.0, v1.z, -v1.y) / (v1.y * v1.y + v1.z * v1.z).sqrt()
    };

    let v3 = v1.cross(&v2);

    (v2, v3)
}

/// An orthonormal frame used to transform directions between world space and
/// a local space in which the normal coincides with the z-axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frame {
    /// First tangent vector.
    pub s: Vector3f,

    /// Second tangent vector.
    pub t: Vector3f,

    /// The normal, serving as the local z-axis.
    pub n: Normal3f,
}

impl Frame {
    /// Creates a frame from three orthonormal vectors.
    ///
    /// * `s` - First tangent.
    /// * `t` - Second tangent.
    /// * `n` - Normal.
    pub fn new(s: Vector3f, t: Vector3f, n: Normal3f) -> Self {
        Self { s, t, n }
    }

    /// Builds a frame around a unit normal, completing the tangents with
    /// `coordinate_system`.
    ///
    /// * `n` - The unit normal.
    pub fn from_normal(n: Normal3f) -> Self {
        let (s, t) = coordinate_system(&Vector3f::from(n));
        Self { s, t, n }
    }

    /// Transform a world-space direction into this frame.
    ///
    /// * `v` - World-space direction.
    pub fn to_local(&self, v: &Vector3f) -> Vector3f {
        Vector3f::new(v.dot(&self.s), v.dot(&self.t), v.dot(&self.n))
    }

    /// Transform a local direction back into world space.
    ///
    /// * `v` - Local direction.
    pub fn to_world(&self, v: &Vector3f) -> Vector3f {
        self.s * v.x + self.t * v.y + Vector3f::from(self.n) * v.z
    }

    /// Cosine of the angle between a local direction and the frame normal.
    ///
    /// * `v` - Local direction.
    #[inline(always)]
    pub fn cos_theta(v: &Vector3f) -> Float {
        v.z
    }
}

impl Default for Frame {
    /// Returns the standard frame with the normal along +z.
    fn default() -> Self {
        Self {
            s: Vector3f::new(1.0, 0.0, 0.0),
            t: Vector3f::new(0.0, 1.0, 0.0),
            n: Normal3f::new(0.0, 0.0, 1.0),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
