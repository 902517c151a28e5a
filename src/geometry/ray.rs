//! Rays

use super::{Point3f, Vector3f};
use crate::pbrt::{Float, INFINITY};

/// A semi-infinite line specified by an origin and a direction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray {
    /// Origin.
    pub o: Point3f,

    /// Direction.
    pub d: Vector3f,

    /// Maximum extent of the ray.
    pub t_max: Float,

    /// Time value.
    pub time: Float,
}

impl Ray {
    /// Creates a new ray.
    ///
    /// * `o`     - Origin.
    /// * `d`     - Direction.
    /// * `t_max` - Maximum extent of the ray.
    /// * `time`  - Time value.
    pub fn new(o: Point3f, d: Vector3f, t_max: Float, time: Float) -> Self {
        Self { o, d, t_max, time }
    }

    /// Get a point at a given parameter along the ray.
    ///
    /// * `t` - Parameter.
    pub fn at(&self, t: Float) -> Point3f {
        self.o + self.d * t
    }
}

impl Default for Ray {
    /// Returns a ray at the origin along +z with unbounded extent.
    fn default() -> Self {
        Self {
            o: Point3f::zero(),
            d: Vector3f::new(0.0, 0.0, 1.0),
            t_max: INFINITY,
            time: 0.0,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point3;

    #[test]
    fn at_walks_along_direction() {
        let r = Ray::new(
            point3(1.0, 0.0, 0.0),
            Vector3f::new(0.0, 2.0, 0.0),
            INFINITY,
            0.0,
        );
        assert_eq!(r.at(0.5), point3(1.0, 1.0, 0.0));
    }
}
