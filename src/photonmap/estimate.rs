//! Density estimators over the balanced photon map.

use super::search::SearchResult;
use super::PhotonMap;
use crate::geometry::{Dot, Frame, Normal3f, Point3f, Ray};
use crate::interaction::{MediumInteraction, SurfaceInteraction};
use crate::medium::Medium;
use crate::pbrt::{abs, Float, INV_PI, PI};
use crate::spectrum::Spectrum;

impl PhotonMap {
    /// Estimates the irradiance at a surface point by summing the power of
    /// the nearest photons and dividing by the area of the disc spanned by
    /// the final search radius, assuming the surface is locally flat.
    ///
    /// Photons arriving from the opposite side of a thin surface are
    /// rejected against the given normal. Degenerate queries (empty map,
    /// zero radius, everything rejected) yield a zero spectrum.
    ///
    /// * `p`             - Query position.
    /// * `n`             - Surface normal at the query position.
    /// * `search_radius` - Search radius.
    /// * `max_photons`   - Photon budget of the lookup.
    pub fn estimate_irradiance(
        &self,
        p: &Point3f,
        n: &Normal3f,
        search_radius: Float,
        max_photons: usize,
    ) -> Spectrum {
        assert!(self.balanced, "photon map queried before balancing");

        let mut dist_squared = search_radius * search_radius;
        let mut results = vec![SearchResult::default(); max_photons + 1];
        let count = self.nn_search(p, &mut dist_squared, max_photons, &mut results);

        let mut result = Spectrum::default();
        for r in results[..count].iter() {
            let photon = self.photon(r.index);

            // Don't use samples from the opposite side of a thin surface.
            if photon.direction().dot(n) < 0.0 {
                result += photon.power();
            }
        }

        if result.is_black() || dist_squared == 0.0 {
            return Spectrum::default();
        }
        result * (self.scale * INV_PI / dist_squared)
    }

    /// Estimates the irradiance at a surface point, weighting each photon by
    /// Simpson's kernel `(1 - d²/r²)²` to down-weight samples near the
    /// search boundary. The normalization constant `3/(π r²)` compensates
    /// for the kernel's integral over the disc.
    ///
    /// * `p`             - Query position.
    /// * `n`             - Surface normal at the query position.
    /// * `search_radius` - Search radius.
    /// * `max_photons`   - Photon budget of the lookup.
    pub fn estimate_irradiance_filtered(
        &self,
        p: &Point3f,
        n: &Normal3f,
        search_radius: Float,
        max_photons: usize,
    ) -> Spectrum {
        assert!(self.balanced, "photon map queried before balancing");

        let mut dist_squared = search_radius * search_radius;
        let mut results = vec![SearchResult::default(); max_photons + 1];
        let count = self.nn_search(p, &mut dist_squared, max_photons, &mut results);

        let mut result = Spectrum::default();
        for r in results[..count].iter() {
            let photon = self.photon(r.index);

            // Don't use samples from the opposite side of a thin surface.
            if photon.direction().dot(n) < 0.0 {
                let sqr_term = 1.0 - r.dist_squared / dist_squared;
                result += photon.power() * (sqr_term * sqr_term);
            }
        }

        if result.is_black() || dist_squared == 0.0 {
            return Spectrum::default();
        }
        result * (self.scale * 3.0 * INV_PI / dist_squared)
    }

    /// Estimates the outgoing radiance at a surface intersection by
    /// evaluating the BSDF for each photon's incident direction, weighted by
    /// Simpson's kernel.
    ///
    /// * `its`           - The surface intersection.
    /// * `search_radius` - Search radius.
    /// * `max_photons`   - Photon budget of the lookup.
    pub fn estimate_radiance_filtered(
        &self,
        its: &SurfaceInteraction,
        search_radius: Float,
        max_photons: usize,
    ) -> Spectrum {
        assert!(self.balanced, "photon map queried before balancing");

        let bsdf = its.shape.bsdf();

        let mut dist_squared = search_radius * search_radius;
        let mut results = vec![SearchResult::default(); max_photons + 1];
        let count = self.nn_search(&its.p, &mut dist_squared, max_photons, &mut results);

        let mut result = Spectrum::default();
        for r in results[..count].iter() {
            let photon = self.photon(r.index);
            let wo = its.to_local(&-photon.direction());

            let sqr_term = 1.0 - r.dist_squared / dist_squared;
            let weight = sqr_term * sqr_term;

            result += photon.power() * (bsdf.f(&its.wi, &wo) * weight);
        }

        if result.is_black() || dist_squared == 0.0 {
            return Spectrum::default();
        }
        result * (self.scale * 3.0 * INV_PI / dist_squared)
    }

    /// Accumulates raw photon contributions at a surface intersection
    /// without any area normalization; progressive estimators divide by
    /// their own shrinking radius. Walks the tree directly instead of
    /// materializing a result list, with a fixed (unshrinking) radius.
    ///
    /// Photons deposited deeper than `max_depth`, whose normal deviates
    /// from the shading normal, or which graze their own surface are
    /// skipped. Surviving photons are evaluated under the BSDF with swapped
    /// query directions (importance transport), corrected for the
    /// non-symmetry introduced by shading normals.
    ///
    /// Returns the number of photons that contributed.
    ///
    /// * `its`           - The surface intersection.
    /// * `search_radius` - Fixed search radius.
    /// * `result`        - Accumulated contribution.
    /// * `max_depth`     - Largest accepted photon bounce index.
    pub fn estimate_radiance_raw(
        &self,
        its: &SurfaceInteraction,
        search_radius: Float,
        result: &mut Spectrum,
        max_depth: u16,
    ) -> usize {
        assert!(self.balanced, "photon map queried before balancing");

        *result = Spectrum::default();
        let bsdf = its.shape.bsdf();
        let mut accum = Spectrum::default();
        let mut count = 0;

        self.for_each_within(&its.p, search_radius * search_radius, |index, _| {
            let photon = self.photon(index);
            let photon_normal = photon.normal();
            let wi_world = -photon.direction();

            if photon.depth() > max_depth
                || photon_normal.dot(&its.sh_frame.n) < 0.1
                || photon_normal.dot(&wi_world) < 1e-2
            {
                return;
            }

            let wi_local = its.to_local(&wi_world);

            // Importance transport: evaluate the BSDF with swapped
            // directions and account for non-symmetry due to shading
            // normals.
            accum += photon.power()
                * bsdf.f(&wi_local, &its.wi)
                * (abs(Frame::cos_theta(&wi_local)) / photon_normal.dot(&wi_world));
            count += 1;
        });

        *result = accum * self.scale;
        count
    }

    /// Estimates the in-scattered radiance inside a participating medium at
    /// a ray origin, normalized by the volume of the gather ball.
    ///
    /// * `m_rec`         - Sampled medium interaction; carried for phase
    ///                     models that condition on the local medium state.
    /// * `ray`           - Ray whose origin is the query point and whose
    ///                     direction faces away from the viewer.
    /// * `search_radius` - Search radius.
    /// * `max_photons`   - Photon budget of the lookup.
    /// * `medium`        - The participating medium.
    pub fn estimate_volume_radiance(
        &self,
        _m_rec: &MediumInteraction,
        ray: &Ray,
        search_radius: Float,
        max_photons: usize,
        medium: &dyn Medium,
    ) -> Spectrum {
        assert!(self.balanced, "photon map queried before balancing");

        let mut dist_squared = search_radius * search_radius;
        let mut results = vec![SearchResult::default(); max_photons + 1];
        let count = self.nn_search(&ray.o, &mut dist_squared, max_photons, &mut results);

        let phase = medium.phase();
        let wo = -ray.d;

        let mut result = Spectrum::default();
        for r in results[..count].iter() {
            let photon = self.photon(r.index);
            result += photon.power() * phase.p(&wo, &photon.direction());
        }

        if result.is_black() || dist_squared == 0.0 {
            return Spectrum::default();
        }
        let vol_factor = (4.0 / 3.0) * PI * dist_squared * dist_squared.sqrt();
        result * (self.scale / vol_factor)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{point3, Vector3f};
    use crate::interaction::{ArcShape, Shape};
    use crate::medium::HomogeneousMedium;
    use crate::pbrt::{INV_FOUR_PI, INFINITY};
    use crate::reflection::{BxDF, LambertianReflection};
    use std::sync::Arc;

    struct Matte(LambertianReflection);
    impl Shape for Matte {
        fn bsdf(&self) -> &dyn BxDF {
            &self.0
        }
    }

    fn matte_shape(reflectance: Float) -> ArcShape {
        Arc::new(Matte(LambertianReflection::new(Spectrum::new(reflectance))))
    }

    fn assert_close(s: Spectrum, expected: Float) {
        for v in s.to_rgb() {
            assert!(
                (v - expected).abs() < 1e-4,
                "expected {} per channel, got {:?}",
                expected,
                s
            );
        }
    }

    /// Map with one unit photon at the origin arriving straight down.
    fn single_photon_map() -> PhotonMap {
        let mut map = PhotonMap::new(16);
        assert!(map.store_photon(
            &point3(0.0, 0.0, 0.0),
            &Normal3f::new(0.0, 0.0, 1.0),
            &Vector3f::new(0.0, 0.0, -1.0),
            &Spectrum::new(1.0),
            0,
        ));
        map.balance();
        map
    }

    fn interaction_at_origin() -> SurfaceInteraction {
        SurfaceInteraction::new(
            point3(0.0, 0.0, 0.0),
            Normal3f::new(0.0, 0.0, 1.0),
            Frame::default(),
            Vector3f::new(0.0, 0.0, 1.0),
            matte_shape(1.0),
        )
    }

    #[test]
    fn empty_map_estimates_to_zero() {
        let mut map = PhotonMap::new(100);
        map.balance();

        let e = map.estimate_irradiance(
            &point3(0.0, 0.0, 0.0),
            &Normal3f::new(0.0, 0.0, 1.0),
            1.0,
            32,
        );
        assert!(e.is_black());
    }

    #[test]
    fn single_photon_irradiance() {
        let map = single_photon_map();

        // One photon of unit power over the unit disc.
        let e = map.estimate_irradiance(
            &point3(0.0, 0.0, 0.0),
            &Normal3f::new(0.0, 0.0, 1.0),
            1.0,
            32,
        );
        assert_close(e, INV_PI);

        // Same side as the photon's direction of travel: rejected.
        let e = map.estimate_irradiance(
            &point3(0.0, 0.0, 0.0),
            &Normal3f::new(0.0, 0.0, -1.0),
            1.0,
            32,
        );
        assert!(e.is_black());
    }

    #[test]
    fn scale_factor_is_applied() {
        let mut map = PhotonMap::new(16);
        assert!(map.store_photon(
            &point3(0.0, 0.0, 0.0),
            &Normal3f::new(0.0, 0.0, 1.0),
            &Vector3f::new(0.0, 0.0, -1.0),
            &Spectrum::new(1.0),
            0,
        ));
        map.balance();
        map.set_scale(0.25);

        let e = map.estimate_irradiance(
            &point3(0.0, 0.0, 0.0),
            &Normal3f::new(0.0, 0.0, 1.0),
            1.0,
            32,
        );
        assert_close(e, 0.25 * INV_PI);
    }

    #[test]
    fn filtered_irradiance_weights_by_kernel() {
        let map = single_photon_map();

        // The photon sits at the query point, so the kernel weight is one
        // and only the 3/(π r²) normalization differs from the plain
        // estimate.
        let e = map.estimate_irradiance_filtered(
            &point3(0.0, 0.0, 0.0),
            &Normal3f::new(0.0, 0.0, 1.0),
            1.0,
            32,
        );
        assert_close(e, 3.0 * INV_PI);

        // A photon at the edge of the disc is weighted to nothing.
        let mut map = PhotonMap::new(16);
        assert!(map.store_photon(
            &point3(0.999, 0.0, 0.0),
            &Normal3f::new(0.0, 0.0, 1.0),
            &Vector3f::new(0.0, 0.0, -1.0),
            &Spectrum::new(1.0),
            0,
        ));
        map.balance();
        let e = map.estimate_irradiance_filtered(
            &point3(0.0, 0.0, 0.0),
            &Normal3f::new(0.0, 0.0, 1.0),
            1.0,
            32,
        );
        assert!(e.max_component_value() < 1e-2);
    }

    #[test]
    fn filtered_radiance_applies_bsdf() {
        let map = single_photon_map();
        let its = interaction_at_origin();

        // Lambertian with unit reflectance: f = 1/π, kernel weight 1.
        let e = map.estimate_radiance_filtered(&its, 1.0, 32);
        assert_close(e, 3.0 * INV_PI * INV_PI);
    }

    #[test]
    fn raw_radiance_counts_survivors() {
        let map = single_photon_map();
        let its = interaction_at_origin();

        let mut result = Spectrum::default();
        let count = map.estimate_radiance_raw(&its, 1.0, &mut result, 4);
        assert_eq!(count, 1);
        // f = 1/π, cos θ = 1 and the photon normal is aligned with its
        // incident direction, so the correction is one.
        assert_close(result, INV_PI);
    }

    #[test]
    fn raw_radiance_rejects_deep_photons() {
        let mut map = PhotonMap::new(16);
        assert!(map.store_photon(
            &point3(0.0, 0.0, 0.0),
            &Normal3f::new(0.0, 0.0, 1.0),
            &Vector3f::new(0.0, 0.0, -1.0),
            &Spectrum::new(1.0),
            9,
        ));
        map.balance();
        let its = interaction_at_origin();

        let mut result = Spectrum::default();
        let count = map.estimate_radiance_raw(&its, 1.0, &mut result, 4);
        assert_eq!(count, 0);
        assert!(result.is_black());
    }

    #[test]
    fn raw_radiance_rejects_deviating_normals() {
        let mut map = PhotonMap::new(16);
        // Photon normal nearly perpendicular to the shading normal.
        assert!(map.store_photon(
            &point3(0.0, 0.0, 0.0),
            &Normal3f::new(1.0, 0.0, 0.0),
            &Vector3f::new(-1.0, 0.0, 0.0),
            &Spectrum::new(1.0),
            0,
        ));
        map.balance();
        let its = interaction_at_origin();

        let mut result = Spectrum::default();
        let count = map.estimate_radiance_raw(&its, 1.0, &mut result, 4);
        assert_eq!(count, 0);
    }

    #[test]
    fn volume_radiance_uses_phase_and_ball_volume() {
        let map = single_photon_map();
        let medium = HomogeneousMedium::new(0.0);
        let ray = Ray::new(
            point3(0.0, 0.0, 0.0),
            Vector3f::new(0.0, 0.0, 1.0),
            INFINITY,
            0.0,
        );
        let m_rec = MediumInteraction::new(ray.o, 0.0);

        // Isotropic phase 1/(4π) over the unit ball volume 4π/3.
        let e = map.estimate_volume_radiance(&m_rec, &ray, 1.0, 32, &medium);
        assert_close(e, INV_FOUR_PI * 3.0 / (4.0 * PI));
    }

    #[test]
    #[should_panic(expected = "before balancing")]
    fn query_before_balance_panics() {
        let map = PhotonMap::new(4);
        map.estimate_irradiance(&point3(0.0, 0.0, 0.0), &Normal3f::new(0.0, 0.0, 1.0), 1.0, 8);
    }
}
