//! Interactions

use crate::geometry::{Frame, Normal3f, Point3f, Vector3f};
use crate::pbrt::Float;
use crate::reflection::BxDF;
use std::sync::Arc;

/// Interface presented by shapes to the gathering stage; the only property
/// the photon map consumes is the scattering function at the hit point.
pub trait Shape: Send + Sync {
    /// Returns the BSDF of the shape's material.
    fn bsdf(&self) -> &dyn BxDF;
}

/// Atomic reference counted `Shape`.
pub type ArcShape = Arc<dyn Shape>;

/// Geometry of a ray-surface hit consumed by the density estimators.
#[derive(Clone)]
pub struct SurfaceInteraction {
    /// Point of interaction.
    pub p: Point3f,

    /// Geometric surface normal at the point of interaction.
    pub n: Normal3f,

    /// Shading frame; its normal is given by per-vertex normals and/or bump
    /// mapping and can deviate from the geometric normal.
    pub sh_frame: Frame,

    /// Outgoing viewing direction in the shading frame.
    pub wi: Vector3f,

    /// The shape that was hit.
    pub shape: ArcShape,
}

impl SurfaceInteraction {
    /// Creates a new surface interaction.
    ///
    /// * `p`        - Point of interaction.
    /// * `n`        - Geometric surface normal.
    /// * `sh_frame` - Shading frame.
    /// * `wi`       - Outgoing viewing direction in the shading frame.
    /// * `shape`    - The shape that was hit.
    pub fn new(
        p: Point3f,
        n: Normal3f,
        sh_frame: Frame,
        wi: Vector3f,
        shape: ArcShape,
    ) -> Self {
        Self {
            p,
            n,
            sh_frame,
            wi,
            shape,
        }
    }

    /// Transform a world-space direction into the shading frame.
    ///
    /// * `v` - World-space direction.
    pub fn to_local(&self, v: &Vector3f) -> Vector3f {
        self.sh_frame.to_local(v)
    }
}

/// Sampled interaction with a participating medium, recorded while marching
/// a ray through it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MediumInteraction {
    /// Point of interaction.
    pub p: Point3f,

    /// Time of interaction.
    pub time: Float,
}

impl MediumInteraction {
    /// Creates a new medium interaction.
    ///
    /// * `p`    - Point of interaction.
    /// * `time` - Time of interaction.
    pub fn new(p: Point3f, time: Float) -> Self {
        Self { p, time }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
