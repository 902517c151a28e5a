//! Henyey-Greenstein

use super::PhaseFunction;
use crate::geometry::{Dot, Vector3f};
use crate::pbrt::{Float, INV_FOUR_PI};

/// Henyey-Greenstein phase function.
pub struct HenyeyGreenstein {
    /// The asymmetry parameter. It is the average value of the product of the
    /// phase function being approximated and the cosine of the angle between
    /// two directions. Isotropic phase functions use g = 0.
    pub g: Float,
}

impl HenyeyGreenstein {
    /// Returns a new `HenyeyGreenstein`.
    ///
    /// * `g` - The asymmetry parameter.
    pub fn new(g: Float) -> Self {
        Self { g }
    }
}

impl PhaseFunction for HenyeyGreenstein {
    /// Returns the value of the phase function for the given pair of directions.
    ///
    /// * `wo` - Outgoing direction.
    /// * `wi` - Incident direction.
    fn p(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        phase_hg(wo.dot(wi), self.g)
    }
}

/// Computes the Henyey-Greenstein phase function which can be used by other
/// phase functions.
///
/// * `cos_theta` - Angle between two direction vectors.
/// * `g`         - Asymmetry parameter.
#[inline]
pub fn phase_hg(cos_theta: Float, g: Float) -> Float {
    let denom = 1.0 + g * g + 2.0 * g * cos_theta;
    INV_FOUR_PI * (1.0 - g * g) / (denom * denom.sqrt())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isotropic_is_uniform() {
        let hg = HenyeyGreenstein::new(0.0);
        let wo = Vector3f::new(0.0, 0.0, 1.0);
        for wi in [
            Vector3f::new(0.0, 0.0, 1.0),
            Vector3f::new(0.0, 0.0, -1.0),
            Vector3f::new(1.0, 0.0, 0.0),
        ] {
            assert!((hg.p(&wo, &wi) - INV_FOUR_PI).abs() < 1e-7);
        }
    }

    #[test]
    fn forward_scattering_peaks_forward() {
        let hg = HenyeyGreenstein::new(0.8);
        let wo = Vector3f::new(0.0, 0.0, 1.0);
        let forward = hg.p(&wo, &Vector3f::new(0.0, 0.0, -1.0));
        let backward = hg.p(&wo, &Vector3f::new(0.0, 0.0, 1.0));
        assert!(forward > backward);
    }
}
