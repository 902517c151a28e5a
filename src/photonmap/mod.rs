//! Photon Map
//!
//! An in-memory spatial index over the photons deposited by a particle
//! tracing stage. Photons are appended unordered during the build phase;
//! a one-shot [`PhotonMap::balance`] permutes the array into a left-balanced
//! kd-tree addressed like a binary heap, after which the map is immutable
//! and nearest-neighbour queries and density estimates may run from any
//! number of threads.

mod balance;
mod estimate;
mod photon;
mod search;

// Re-export
pub use photon::Photon;
pub use search::SearchResult;

use crate::geometry::{Bounds3f, Normal3f, Point3f, Union, Vector3f};
use crate::pbrt::Float;
use crate::spectrum::Spectrum;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::mem;

/// Upper bound on the traversal stack depth. A left-balanced tree of
/// 2^30 photons has 30 levels, so this covers any capacity the constructor
/// accepts.
pub const MAX_PHOTONMAP_DEPTH: usize = 30;

/// Heap slot of the left child of `i`.
#[inline(always)]
pub(crate) const fn left_child(i: usize) -> usize {
    2 * i
}

/// Heap slot of the right child of `i`.
#[inline(always)]
pub(crate) const fn right_child(i: usize) -> usize {
    2 * i + 1
}

/// A bounded collection of photons, balanced once into a left-balanced
/// kd-tree and queried by the density estimators of the gathering stage.
pub struct PhotonMap {
    /// Photon storage. Entries start at index 1 for convenient heap
    /// addressing; slot 0 is a sentinel.
    photons: Vec<Photon>,

    /// Number of photons stored so far.
    photon_count: usize,

    /// Capacity fixed at construction.
    max_photons: usize,

    /// Bounding box of all stored photon positions.
    aabb: Bounds3f,

    /// Set once `balance` has run; queries are legal only afterwards.
    balanced: bool,

    /// Global factor applied to every estimate; the particle tracer sets it
    /// to 1 / number of emitted particles.
    scale: Float,

    /// Largest heap slot that has children.
    last_inner_node: usize,

    /// Largest heap slot that has a right child.
    last_r_child_node: usize,
}

impl PhotonMap {
    /// Creates an empty photon map.
    ///
    /// * `max_photons` - Capacity of the map.
    pub fn new(max_photons: usize) -> Self {
        assert!(
            max_photons < 1 << MAX_PHOTONMAP_DEPTH,
            "photon map capacity exceeds the supported tree depth"
        );

        Self {
            photons: vec![Photon::default(); max_photons + 1],
            photon_count: 0,
            max_photons,
            aabb: Bounds3f::default(),
            balanced: false,
            scale: 1.0,
            last_inner_node: 0,
            last_r_child_node: 0,
        }
    }

    /// Returns the number of photons stored.
    pub fn photon_count(&self) -> usize {
        self.photon_count
    }

    /// Returns the capacity of the map.
    pub fn max_photons(&self) -> usize {
        self.max_photons
    }

    /// Returns the bounding box of all stored photon positions.
    pub fn aabb(&self) -> Bounds3f {
        self.aabb
    }

    /// Returns true once the map has been balanced.
    pub fn is_balanced(&self) -> bool {
        self.balanced
    }

    /// Returns the global scale factor applied to every estimate.
    pub fn scale(&self) -> Float {
        self.scale
    }

    /// Sets the global scale factor applied to every estimate.
    ///
    /// * `scale` - The new scale; the particle tracer uses 1 / number of
    ///             emitted particles.
    pub fn set_scale(&mut self, scale: Float) {
        self.scale = scale;
    }

    /// Returns the photon stored at the given index in `[1, photon_count]`.
    ///
    /// * `i` - The photon index.
    pub fn photon(&self, i: usize) -> &Photon {
        assert!(i >= 1 && i <= self.photon_count, "photon index out of range");
        &self.photons[i]
    }

    /// Heap slot `i` is an inner node (has at least a left child).
    #[inline(always)]
    fn is_inner_node(&self, i: usize) -> bool {
        i <= self.last_inner_node
    }

    /// Heap slot `i` has a right child.
    #[inline(always)]
    fn has_right_child(&self, i: usize) -> bool {
        i <= self.last_r_child_node
    }

    /// Stores a photon. Returns false without side effects once the capacity
    /// is reached. Must not be called after `balance`.
    ///
    /// * `pos`    - Deposit position.
    /// * `normal` - Surface normal at the deposit point (zero in media).
    /// * `dir`    - Incident direction of the particle.
    /// * `power`  - Radiant power carried by the particle.
    /// * `depth`  - Bounce index at which the particle was deposited.
    pub fn store_photon(
        &mut self,
        pos: &Point3f,
        normal: &Normal3f,
        dir: &Vector3f,
        power: &Spectrum,
        depth: u16,
    ) -> bool {
        self.store(Photon::new(pos, normal, dir, power, depth))
    }

    /// Stores an existing photon record, e.g. when merging per-worker shard
    /// maps. Returns false without side effects once the capacity is
    /// reached. Must not be called after `balance`.
    ///
    /// * `photon` - The photon record.
    pub fn store(&mut self, photon: Photon) -> bool {
        assert!(!self.balanced, "photon stored into a balanced map");

        // Overflow check.
        if self.photon_count >= self.max_photons {
            return false;
        }

        // Keep track of the volume covered by all stored photons.
        self.aabb = self.aabb.union(&photon.position());

        self.photon_count += 1;
        self.photons[self.photon_count] = photon;

        true
    }

    /// Permutes the photon array in place into a left-balanced kd-tree and
    /// freezes the map; queries are legal from here on. May be called once.
    pub fn balance(&mut self) {
        if self.photon_count == 0 {
            info!("Photon map: no need for balancing, no photons available.");
            self.balanced = true;
            return;
        }
        assert!(!self.balanced, "photon map balanced twice");

        info!(
            "Photon map: balancing {} photons ({:.2} KiB)..",
            self.photon_count,
            (mem::size_of::<Photon>() * (self.photon_count + 1)) as f64 / 1024.0
        );

        // Shuffle an index array instead of copying photons back and forth,
        // then apply the resulting permutation once.
        let mut indices: Vec<usize> = (0..=self.photon_count).collect();
        let mut heap_permutation = vec![0_usize; self.photon_count + 1];
        let mut aabb = self.aabb;

        balance::balance_recursive(
            &mut self.photons,
            &mut indices,
            &mut heap_permutation,
            &mut aabb,
            1,
            self.photon_count + 1,
            1,
        );

        balance::permute_inplace(&mut self.photons, &mut heap_permutation);

        // Cache the bounds for O(1) inner-node and right-child tests during
        // traversal.
        self.last_inner_node = self.photon_count / 2;
        self.last_r_child_node = (self.photon_count - 1) / 2;
        self.balanced = true;
    }

    /// Serializes the map to a binary stream.
    ///
    /// * `writer` - The output stream.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        debug!(
            "Serializing a photon map ({:.2} KiB)",
            (self.photon_count * mem::size_of::<Photon>()) as f64 / 1024.0
        );

        writer.write_f32::<LittleEndian>(self.aabb.p_min.x)?;
        writer.write_f32::<LittleEndian>(self.aabb.p_min.y)?;
        writer.write_f32::<LittleEndian>(self.aabb.p_min.z)?;
        writer.write_f32::<LittleEndian>(self.aabb.p_max.x)?;
        writer.write_f32::<LittleEndian>(self.aabb.p_max.y)?;
        writer.write_f32::<LittleEndian>(self.aabb.p_max.z)?;
        writer.write_u8(self.balanced as u8)?;
        writer.write_u64::<LittleEndian>(self.max_photons as u64)?;
        writer.write_u64::<LittleEndian>(self.last_inner_node as u64)?;
        writer.write_u64::<LittleEndian>(self.last_r_child_node as u64)?;
        writer.write_f32::<LittleEndian>(self.scale)?;
        writer.write_u64::<LittleEndian>(self.photon_count as u64)?;

        for photon in self.photons[1..].iter() {
            photon.write_to(writer)?;
        }

        Ok(())
    }

    /// Reconstructs a map from a binary stream. A map serialized after
    /// balancing is immediately queryable.
    ///
    /// * `reader` - The input stream.
    pub fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let p_min = Point3f::new(
            reader.read_f32::<LittleEndian>()?,
            reader.read_f32::<LittleEndian>()?,
            reader.read_f32::<LittleEndian>()?,
        );
        let p_max = Point3f::new(
            reader.read_f32::<LittleEndian>()?,
            reader.read_f32::<LittleEndian>()?,
            reader.read_f32::<LittleEndian>()?,
        );
        let balanced = reader.read_u8()? != 0;
        let max_photons = reader.read_u64::<LittleEndian>()? as usize;
        let last_inner_node = reader.read_u64::<LittleEndian>()? as usize;
        let last_r_child_node = reader.read_u64::<LittleEndian>()? as usize;
        let scale = reader.read_f32::<LittleEndian>()?;
        let photon_count = reader.read_u64::<LittleEndian>()? as usize;

        let mut photons = vec![Photon::default(); max_photons + 1];
        for photon in photons[1..].iter_mut() {
            *photon = Photon::read_from(reader)?;
        }

        Ok(Self {
            photons,
            photon_count,
            max_photons,
            aabb: Bounds3f { p_min, p_max },
            balanced,
            scale,
            last_inner_node,
            last_r_child_node,
        })
    }

    /// Dumps every photon position as an OBJ point set.
    ///
    /// * `path` - The output file path.
    pub fn dump_obj(&self, path: &str) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut os = BufWriter::new(file);

        writeln!(os, "o Photons")?;
        for i in 1..=self.photon_count {
            let p = self.photons[i].position();
            writeln!(os, "v {} {} {}", p.x, p.y, p.z)?;
        }

        // Fake faces so that importers keep the unreferenced vertices.
        for i in 3..=self.photon_count {
            writeln!(os, "f {} {} {}", i, i - 1, i - 2)?;
        }

        Ok(())
    }
}

impl fmt::Display for PhotonMap {
    /// Formats a human readable summary of the map.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PhotonMap[\n  aabb = {:?},\n  photonCount = {},\n  maxPhotons = {},\n  balanced = {},\n  scale = {}\n]",
            self.aabb, self.photon_count, self.max_photons, self.balanced, self.scale
        )
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point3;
    use rayon::prelude::*;

    fn store_unit_photon(map: &mut PhotonMap, x: f32, y: f32, z: f32) -> bool {
        map.store_photon(
            &point3(x, y, z),
            &Normal3f::new(0.0, 0.0, 1.0),
            &Vector3f::new(0.0, 0.0, -1.0),
            &Spectrum::new(1.0),
            0,
        )
    }

    fn grid_map() -> PhotonMap {
        let mut map = PhotonMap::new(512);
        for x in 0..8 {
            for y in 0..8 {
                for z in 0..8 {
                    assert!(store_unit_photon(&mut map, x as f32, y as f32, z as f32));
                }
            }
        }
        map.balance();
        map
    }

    #[test]
    fn aabb_contains_every_insertion() {
        let mut map = PhotonMap::new(16);
        let points = [
            point3(0.0, 0.0, 0.0),
            point3(-3.0, 5.0, 1.0),
            point3(2.0, -1.0, 4.0),
        ];
        for p in &points {
            assert!(store_unit_photon(&mut map, p.x, p.y, p.z));
        }
        for p in &points {
            assert!(map.aabb().contains(p));
        }
    }

    #[test]
    fn overflow_returns_false_without_side_effects() {
        let mut map = PhotonMap::new(2);
        assert!(store_unit_photon(&mut map, 0.0, 0.0, 0.0));
        assert!(store_unit_photon(&mut map, 1.0, 0.0, 0.0));

        let aabb = map.aabb();
        assert!(!store_unit_photon(&mut map, 50.0, 50.0, 50.0));
        assert_eq!(map.photon_count(), 2);
        assert_eq!(map.aabb(), aabb);
    }

    #[test]
    #[should_panic(expected = "balanced map")]
    fn store_after_balance_panics() {
        let mut map = PhotonMap::new(4);
        store_unit_photon(&mut map, 0.0, 0.0, 0.0);
        map.balance();
        store_unit_photon(&mut map, 1.0, 0.0, 0.0);
    }

    #[test]
    fn balance_shape_is_left_balanced() {
        let map = grid_map();
        let n = map.photon_count();

        for i in 1..=n {
            if i <= n / 2 {
                assert!(left_child(i) <= n);
            } else {
                assert!(left_child(i) > n);
            }
            if i <= (n - 1) / 2 {
                assert!(right_child(i) <= n);
            } else {
                assert!(right_child(i) > n);
            }
        }
    }

    #[test]
    fn duplicate_coordinates_balance_cleanly() {
        // Ten photons on a plane of constant x exercise the relaxed
        // partition; a strict split would degrade on this input.
        let mut map = PhotonMap::new(16);
        for i in 0..10 {
            assert!(store_unit_photon(&mut map, 1.0, i as f32, (i % 3) as f32));
        }
        map.balance();

        let mut radius_squared = 1000.0;
        let mut results = vec![SearchResult::default(); 11];
        let count = map.nn_search(&point3(1.0, 0.0, 0.0), &mut radius_squared, 10, &mut results);
        assert_eq!(count, 10);
    }

    #[test]
    fn fully_coincident_photons_balance_cleanly() {
        let mut map = PhotonMap::new(128);
        for _ in 0..128 {
            assert!(store_unit_photon(&mut map, 2.0, 2.0, 2.0));
        }
        map.balance();

        let mut radius_squared = 1.0;
        let mut results = vec![SearchResult::default(); 33];
        let count = map.nn_search(&point3(2.0, 2.0, 2.0), &mut radius_squared, 32, &mut results);
        assert_eq!(count, 32);
        assert_eq!(radius_squared, 0.0);
    }

    #[test]
    fn merge_by_reinsertion_matches_single_map() {
        let mut shard_a = PhotonMap::new(8);
        let mut shard_b = PhotonMap::new(8);
        for i in 0..8 {
            assert!(store_unit_photon(&mut shard_a, i as f32, 0.0, 0.0));
            assert!(store_unit_photon(&mut shard_b, i as f32, 1.0, 0.0));
        }

        let mut merged = PhotonMap::new(16);
        for shard in [&shard_a, &shard_b] {
            for i in 1..=shard.photon_count() {
                assert!(merged.store(*shard.photon(i)));
            }
        }
        merged.balance();

        assert_eq!(merged.photon_count(), 16);
        let mut radius_squared = 0.25;
        let mut results = vec![SearchResult::default(); 2];
        let count = merged.nn_search(&point3(3.0, 1.0, 0.0), &mut radius_squared, 1, &mut results);
        assert_eq!(count, 1);
        assert_eq!(results[0].dist_squared, 0.0);
    }

    #[test]
    fn serialization_round_trips_bit_identically() {
        let map = grid_map();

        let mut buffer = Vec::new();
        map.write_to(&mut buffer).unwrap();
        let restored = PhotonMap::read_from(&mut buffer.as_slice()).unwrap();

        assert!(restored.is_balanced());
        assert_eq!(restored.photon_count(), map.photon_count());
        assert_eq!(restored.max_photons(), map.max_photons());
        assert_eq!(restored.aabb(), map.aabb());

        // Queries against the restored map must be bit-identical.
        for query in [
            point3(0.0, 0.0, 0.0),
            point3(3.5, 3.5, 3.5),
            point3(7.0, 0.0, 7.0),
        ] {
            let mut r1 = 4.0;
            let mut r2 = 4.0;
            let mut results1 = vec![SearchResult::default(); 9];
            let mut results2 = vec![SearchResult::default(); 9];
            let c1 = map.nn_search(&query, &mut r1, 8, &mut results1);
            let c2 = restored.nn_search(&query, &mut r2, 8, &mut results2);
            assert_eq!(c1, c2);
            assert_eq!(r1, r2);
            assert_eq!(results1[..c1], results2[..c2]);
        }
    }

    #[test]
    fn deserialized_unbalanced_map_can_still_be_built() {
        let mut map = PhotonMap::new(4);
        store_unit_photon(&mut map, 0.0, 0.0, 0.0);

        let mut buffer = Vec::new();
        map.write_to(&mut buffer).unwrap();
        let mut restored = PhotonMap::read_from(&mut buffer.as_slice()).unwrap();

        assert!(!restored.is_balanced());
        assert!(restored.store(*map.photon(1)));
        restored.balance();
        assert_eq!(restored.photon_count(), 2);
    }

    #[test]
    fn dump_obj_writes_vertices_and_filler_faces() {
        let mut map = PhotonMap::new(4);
        for i in 0..4 {
            store_unit_photon(&mut map, i as f32, 0.0, 0.0);
        }

        let path = std::env::temp_dir().join("photonmap_dump_test.obj");
        let path = path.to_str().unwrap();
        map.dump_obj(path).unwrap();

        let contents = std::fs::read_to_string(path).unwrap();
        std::fs::remove_file(path).ok();

        assert!(contents.starts_with("o Photons\n"));
        assert_eq!(contents.matches("\nv ").count() + 1, 5); // 4 vertices, one after header
        assert!(contents.contains("f 3 2 1"));
        assert!(contents.contains("f 4 3 2"));
    }

    #[test]
    fn display_summarizes_state() {
        let mut map = PhotonMap::new(4);
        store_unit_photon(&mut map, 0.0, 0.0, 0.0);
        let text = format!("{}", map);
        assert!(text.contains("photonCount = 1"));
        assert!(text.contains("maxPhotons = 4"));
        assert!(text.contains("balanced = false"));
    }

    #[test]
    fn queries_run_concurrently() {
        let map = grid_map();

        let counts: Vec<usize> = (0..64usize)
            .into_par_iter()
            .map(|i| {
                let p = point3((i % 8) as f32, ((i / 8) % 8) as f32, 0.0);
                let mut radius_squared = 2.0;
                let mut results = vec![SearchResult::default(); 5];
                map.nn_search(&p, &mut radius_squared, 4, &mut results)
            })
            .collect();

        for count in counts {
            assert_eq!(count, 4);
        }
    }
}
