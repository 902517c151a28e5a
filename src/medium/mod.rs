//! Media

mod henyey_greenstein;

// Re-export
pub use henyey_greenstein::*;

use crate::geometry::Vector3f;
use crate::pbrt::Float;
use std::sync::Arc;

/// Models scattering properties in volumetric media.
pub trait PhaseFunction: Send + Sync {
    /// Returns the value of the phase function for the given pair of directions.
    ///
    /// * `wo` - Outgoing direction.
    /// * `wi` - Incident direction.
    fn p(&self, wo: &Vector3f, wi: &Vector3f) -> Float;
}

/// Interface presented by participating media; the photon map only consumes
/// the directional scattering distribution.
pub trait Medium: Send + Sync {
    /// Returns the phase function of the medium.
    fn phase(&self) -> &dyn PhaseFunction;
}

/// Atomic reference counted `Medium`.
pub type ArcMedium = Arc<dyn Medium>;

/// A medium with wavelength-independent scattering properties that are
/// constant throughout its extent.
pub struct HomogeneousMedium {
    /// The phase function.
    phase: HenyeyGreenstein,
}

impl HomogeneousMedium {
    /// Creates a new homogeneous medium.
    ///
    /// * `g` - Henyey-Greenstein asymmetry parameter.
    pub fn new(g: Float) -> Self {
        Self {
            phase: HenyeyGreenstein::new(g),
        }
    }
}

impl Medium for HomogeneousMedium {
    /// Returns the phase function of the medium.
    fn phase(&self) -> &dyn PhaseFunction {
        &self.phase
    }
}
