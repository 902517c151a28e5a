//! Nearest-neighbour search over the balanced photon array.

use super::{left_child, right_child, PhotonMap, MAX_PHOTONMAP_DEPTH};
use crate::geometry::Point3f;
use crate::pbrt::Float;

/// A photon found by `nn_search`: its squared distance to the query point
/// and its index in the photon storage.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SearchResult {
    /// Squared distance to the query position.
    pub dist_squared: Float,

    /// Index of the photon in the map.
    pub index: usize,
}

impl SearchResult {
    /// Creates a new search result.
    ///
    /// * `dist_squared` - Squared distance to the query position.
    /// * `index`        - Index of the photon in the map.
    pub fn new(dist_squared: Float, index: usize) -> Self {
        Self {
            dist_squared,
            index,
        }
    }
}

/// Establish the max-heap property over the whole slice, keyed by squared
/// distance.
fn make_heap(results: &mut [SearchResult]) {
    let n = results.len();
    for i in (0..n / 2).rev() {
        sift_down(results, i, n);
    }
}

/// Restore the max-heap property downwards from `root` within `results[..n]`.
fn sift_down(results: &mut [SearchResult], mut root: usize, n: usize) {
    loop {
        let mut child = 2 * root + 1;
        if child >= n {
            break;
        }
        if child + 1 < n && results[child].dist_squared < results[child + 1].dist_squared {
            child += 1;
        }
        if results[root].dist_squared < results[child].dist_squared {
            results.swap(root, child);
            root = child;
        } else {
            break;
        }
    }
}

/// Restore the max-heap property upwards from the last element.
fn sift_up(results: &mut [SearchResult]) {
    let mut child = results.len() - 1;
    while child > 0 {
        let parent = (child - 1) / 2;
        if results[parent].dist_squared < results[child].dist_squared {
            results.swap(parent, child);
            child = parent;
        } else {
            break;
        }
    }
}

impl PhotonMap {
    /// Finds the `max_size` photons nearest to `p` within the given search
    /// radius.
    ///
    /// The traversal is iterative with an explicit stack bounded by
    /// [`MAX_PHOTONMAP_DEPTH`] and allocates nothing. While fewer than
    /// `max_size` photons have been found, candidates are appended to
    /// `results` unordered; once the buffer fills, it is reorganized into a
    /// max-heap on squared distance and every further candidate evicts the
    /// farthest photon, shrinking the search radius to the new maximum. The
    /// extra slot in `results` is the transient insertion position of that
    /// heap step.
    ///
    /// On return `search_radius_squared` holds the squared distance to the
    /// farthest photon kept, or the input radius if the buffer never filled.
    ///
    /// * `p`                     - Query position.
    /// * `search_radius_squared` - Squared search radius; shrunk in place.
    /// * `max_size`              - Maximum number of photons to return.
    /// * `results`               - Result buffer of at least `max_size + 1`.
    pub fn nn_search(
        &self,
        p: &Point3f,
        search_radius_squared: &mut Float,
        max_size: usize,
        results: &mut [SearchResult],
    ) -> usize {
        assert!(self.balanced, "photon map queried before balancing");
        assert!(
            results.len() > max_size,
            "result buffer must hold max_size + 1 entries"
        );

        if self.photon_count == 0 || max_size == 0 {
            return 0;
        }

        let pos = [p.x, p.y, p.z];
        let mut stack = [0_usize; MAX_PHOTONMAP_DEPTH];
        let mut index = 1;
        let mut stack_pos = 1;
        let mut fill = 0;
        let mut is_priority_queue = false;
        let mut dist_squared = *search_radius_squared;

        while index > 0 {
            let current = index;
            let photon = &self.photons[current];

            if self.is_inner_node(current) {
                let axis = photon.axis as usize;
                let dist_to_plane = pos[axis] - photon.pos[axis];

                // Does the search region overlap both split half-spaces?
                let search_both = dist_to_plane * dist_to_plane <= dist_squared;

                if dist_to_plane > 0.0 {
                    // The query is on the right side of the split; search
                    // that side first.
                    if self.has_right_child(current) {
                        if search_both {
                            stack[stack_pos] = left_child(current);
                            stack_pos += 1;
                        }
                        index = right_child(current);
                    } else if search_both {
                        index = left_child(current);
                    } else {
                        stack_pos -= 1;
                        index = stack[stack_pos];
                    }
                } else {
                    // The query is on the left side of the split; search
                    // that side first.
                    if search_both && self.has_right_child(current) {
                        stack[stack_pos] = right_child(current);
                        stack_pos += 1;
                    }
                    index = left_child(current);
                }
            } else {
                stack_pos -= 1;
                index = stack[stack_pos];
            }

            // Check if the current photon lies within the search radius.
            let photon_dist_squared = photon.distance_squared(&pos);

            if photon_dist_squared < dist_squared {
                if fill < max_size {
                    // There is still room, just append.
                    results[fill] = SearchResult::new(photon_dist_squared, current);
                    fill += 1;
                } else {
                    // As in Jensen's implementation, switch to a priority
                    // queue once the result space is exhausted.
                    if !is_priority_queue {
                        make_heap(&mut results[..max_size]);
                        is_priority_queue = true;
                    }

                    // Add the new photon, remove the one farthest away.
                    results[max_size] = SearchResult::new(photon_dist_squared, current);
                    sift_up(&mut results[..max_size + 1]);
                    results.swap(0, max_size);
                    sift_down(&mut results[..max_size], 0, max_size);

                    // Reduce the search radius accordingly.
                    dist_squared = results[0].dist_squared;
                }
            }
        }

        *search_radius_squared = dist_squared;
        fill
    }

    /// Visits every photon within `dist_squared` of `p` without shrinking
    /// the radius or materializing a result list. Shares the tree traversal
    /// of [`nn_search`] and is the workhorse of the progressive (raw)
    /// radiance estimator.
    ///
    /// * `p`            - Query position.
    /// * `dist_squared` - Fixed squared search radius.
    /// * `visit`        - Called with each photon index and its squared
    ///                    distance.
    pub(super) fn for_each_within<F>(&self, p: &Point3f, dist_squared: Float, mut visit: F)
    where
        F: FnMut(usize, Float),
    {
        if self.photon_count == 0 {
            return;
        }

        let pos = [p.x, p.y, p.z];
        let mut stack = [0_usize; MAX_PHOTONMAP_DEPTH];
        let mut index = 1;
        let mut stack_pos = 1;

        while index > 0 {
            let current = index;
            let photon = &self.photons[current];

            if self.is_inner_node(current) {
                let axis = photon.axis as usize;
                let dist_to_plane = pos[axis] - photon.pos[axis];
                let search_both = dist_to_plane * dist_to_plane <= dist_squared;

                if dist_to_plane > 0.0 {
                    if self.has_right_child(current) {
                        if search_both {
                            stack[stack_pos] = left_child(current);
                            stack_pos += 1;
                        }
                        index = right_child(current);
                    } else if search_both {
                        index = left_child(current);
                    } else {
                        stack_pos -= 1;
                        index = stack[stack_pos];
                    }
                } else {
                    if search_both && self.has_right_child(current) {
                        stack[stack_pos] = right_child(current);
                        stack_pos += 1;
                    }
                    index = left_child(current);
                }
            } else {
                stack_pos -= 1;
                index = stack[stack_pos];
            }

            let photon_dist_squared = photon.distance_squared(&pos);
            if photon_dist_squared < dist_squared {
                visit(current, photon_dist_squared);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{point3, Normal3f, Vector3f};
    use crate::spectrum::Spectrum;
    use proptest::prelude::*;

    fn build_map(points: &[(f32, f32, f32)]) -> PhotonMap {
        let mut map = PhotonMap::new(points.len().max(1));
        for (x, y, z) in points {
            assert!(map.store_photon(
                &point3(*x, *y, *z),
                &Normal3f::new(0.0, 0.0, 1.0),
                &Vector3f::new(0.0, 0.0, -1.0),
                &Spectrum::new(1.0),
                0,
            ));
        }
        map.balance();
        map
    }

    /// Brute-force reference: squared distances of all photons within the
    /// radius, nearest first.
    fn brute_force(
        points: &[(f32, f32, f32)],
        p: &Point3f,
        radius_squared: f32,
    ) -> Vec<f32> {
        let mut dists: Vec<f32> = points
            .iter()
            .map(|(x, y, z)| point3(*x, *y, *z).distance_squared(p))
            .filter(|d| *d < radius_squared)
            .collect();
        dists.sort_by(|a, b| a.partial_cmp(b).unwrap());
        dists
    }

    #[test]
    fn grid_query_finds_exact_photon() {
        let mut points = Vec::new();
        for x in 0..8 {
            for y in 0..8 {
                for z in 0..8 {
                    points.push((x as f32, y as f32, z as f32));
                }
            }
        }
        let map = build_map(&points);

        let mut radius_squared = 4.0;
        let mut results = vec![SearchResult::default(); 2];
        let count = map.nn_search(&point3(0.0, 0.0, 0.0), &mut radius_squared, 1, &mut results);

        assert_eq!(count, 1);
        assert_eq!(results[0].dist_squared, 0.0);
        assert_eq!(radius_squared, 0.0);
        assert_eq!(map.photon(results[0].index).position(), point3(0.0, 0.0, 0.0));
    }

    #[test]
    fn unfilled_buffer_keeps_input_radius() {
        let map = build_map(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0)]);

        let mut radius_squared = 100.0;
        let mut results = vec![SearchResult::default(); 9];
        let count = map.nn_search(&point3(0.0, 0.0, 0.0), &mut radius_squared, 8, &mut results);

        assert_eq!(count, 2);
        assert_eq!(radius_squared, 100.0);
    }

    #[test]
    fn empty_map_returns_nothing() {
        let mut map = PhotonMap::new(100);
        map.balance();

        let mut radius_squared = 1.0;
        let mut results = vec![SearchResult::default(); 33];
        let count = map.nn_search(&point3(0.0, 0.0, 0.0), &mut radius_squared, 32, &mut results);

        assert_eq!(count, 0);
        assert_eq!(radius_squared, 1.0);
    }

    proptest! {
        #[test]
        fn matches_brute_force(
            points in proptest::collection::vec(
                (-10.0f32..10.0, -10.0f32..10.0, -10.0f32..10.0),
                1..200,
            ),
            query in (-10.0f32..10.0, -10.0f32..10.0, -10.0f32..10.0),
            max_size in 1usize..32,
            radius in 0.5f32..20.0,
        ) {
            let map = build_map(&points);
            let p = point3(query.0, query.1, query.2);

            let mut radius_squared = radius * radius;
            let mut results = vec![SearchResult::default(); max_size + 1];
            let count = map.nn_search(&p, &mut radius_squared, max_size, &mut results);

            let expected = brute_force(&points, &p, radius * radius);
            let expected_count = expected.len().min(max_size);
            prop_assert_eq!(count, expected_count);

            // The returned set is exactly the k nearest.
            let mut got: Vec<f32> = results[..count]
                .iter()
                .map(|r| r.dist_squared)
                .collect();
            got.sort_by(|a, b| a.partial_cmp(b).unwrap());
            prop_assert_eq!(&got, &expected[..expected_count]);

            // The radius never grows; when the buffer filled it equals the
            // distance to the farthest returned photon.
            prop_assert!(radius_squared <= radius * radius);
            if expected.len() > max_size {
                prop_assert_eq!(radius_squared, expected[expected_count - 1]);
            } else {
                prop_assert_eq!(radius_squared, radius * radius);
            }
        }

        #[test]
        fn fixed_radius_walk_matches_brute_force(
            points in proptest::collection::vec(
                (-10.0f32..10.0, -10.0f32..10.0, -10.0f32..10.0),
                1..200,
            ),
            query in (-10.0f32..10.0, -10.0f32..10.0, -10.0f32..10.0),
            radius in 0.5f32..20.0,
        ) {
            let map = build_map(&points);
            let p = point3(query.0, query.1, query.2);

            let mut got = Vec::new();
            map.for_each_within(&p, radius * radius, |_, d2| got.push(d2));
            got.sort_by(|a, b| a.partial_cmp(b).unwrap());

            prop_assert_eq!(got, brute_force(&points, &p, radius * radius));
        }
    }
}
