//! Balancing of the photon array into a left-balanced kd-tree.
//!
//! The photons are never moved during partitioning; an index array is
//! shuffled instead, and the resulting heap permutation is applied to the
//! photon storage once at the end.

use super::photon::Photon;
use super::{left_child, right_child};
use crate::geometry::Bounds3f;
use crate::pbrt::Axis;

/// Relaxed partitioning, after Jensen's reference implementation.
///
/// Accepts *two* predicates with the guarantee that for every element either
/// `pred1(x) == !pred2(x)` or both return false. When the routine finishes,
/// every element satisfying `pred1` is on the left of the returned split
/// point and every element satisfying `pred2` is on the right; elements on
/// which both predicates are false may end up on either side.
///
/// The relaxation matters for balancing performance: partitioning around a
/// pivot coordinate with strict `<` / `>=` predicates degrades to quadratic
/// time when many photons share the pivot value, which happens whenever a
/// scene contains an axis-aligned surface. Letting coincident photons fall
/// on either side keeps the two sets close to equal size.
///
/// The element at `end` must fail `pred1`; it acts as the guard for the
/// left-to-right scan.
///
/// * `indices` - Photon index array being partitioned.
/// * `start`   - First position of the range.
/// * `end`     - One past the last position of the range.
/// * `pred1`   - Left-side predicate.
/// * `pred2`   - Right-side predicate.
fn guarded_partition<P1, P2>(
    indices: &mut [usize],
    mut start: usize,
    mut end: usize,
    pred1: P1,
    pred2: P2,
) -> usize
where
    P1: Fn(usize) -> bool,
    P2: Fn(usize) -> bool,
{
    end -= 1;
    loop {
        while pred1(indices[start]) {
            // Guarded by the element past `end`.
            start += 1;
        }
        while pred2(indices[end]) && end > start {
            end -= 1;
        }
        if start >= end {
            break;
        }
        indices.swap(start, end);
        start += 1;
        end -= 1;
    }
    start
}

/// Works like QUICKSORT without fully sorting: after it returns, the element
/// at `pivot` imposes an ordering with respect to every other element of
/// `[left, right)` along the chosen axis. It repeatedly partitions around an
/// arbitrarily chosen pivot value (the rightmost element) and then iterates
/// into whichever half still contains the requested pivot position.
///
/// * `photons` - Photon storage.
/// * `indices` - Photon index array being reordered.
/// * `left`    - First position of the range.
/// * `right`   - One past the last position of the range.
/// * `pivot`   - Position that must end up in sorted order.
/// * `axis`    - Coordinate axis to order by.
pub(super) fn quick_partition(
    photons: &[Photon],
    indices: &mut [usize],
    left: usize,
    right: usize,
    pivot: usize,
    axis: Axis,
) {
    let axis = usize::from(axis);
    let mut left = left;
    let mut right = right - 1;

    while right > left {
        let pivot_value = photons[indices[right]].pos[axis];

        let mid = guarded_partition(
            indices,
            left,
            right,
            |i| photons[i].pos[axis] < pivot_value,
            |i| photons[i].pos[axis] > pivot_value,
        );

        // Move the pivot in between the two sets.
        indices.swap(mid, right);

        if mid > pivot {
            right = mid - 1;
        } else if mid < pivot {
            left = mid + 1;
        } else {
            return;
        }
    }
}

/// Given a subtree size, returns the number of nodes on the left subtree of
/// the corresponding left-balanced tree. Assumes `tree_size > 1`. There are
/// two cases: either the left subtree can be filled completely, or the last
/// level runs out of nodes before reaching half-way.
///
/// * `tree_size` - Number of nodes in the subtree.
pub(super) fn left_subtree_size(tree_size: usize) -> usize {
    // Walk down until the first incompletely filled tree level.
    let mut p = 1;
    while 2 * p <= tree_size {
        p *= 2;
    }

    // Number of filled slots in the last level.
    let remaining = tree_size - p + 1;

    if 2 * remaining < p {
        // The last level ends inside the left subtree; remove the
        // overestimate and add the remaining nodes.
        p = (p >> 1) + remaining;
    }

    p - 1
}

/// Recursively builds the heap permutation for the subrange
/// `[sort_start, sort_end)` of the index array, rooted at heap slot
/// `heap_index`.
///
/// Each step selects the split axis as the widest dimension of the current
/// cell, quick-partitions the range so the left-balanced pivot falls into
/// sorted position, records the pivot photon in the permutation, and recurses
/// into both halves with the cell bounds tightened to the split plane.
///
/// * `photons`          - Photon storage; split axes are written into pivots.
/// * `indices`          - Photon index array.
/// * `heap_permutation` - Destination slot -> photon storage index map.
/// * `aabb`             - Bounds of the cell being split; restored on return.
/// * `sort_start`       - First position of the subrange.
/// * `sort_end`         - One past the last position of the subrange.
/// * `heap_index`       - Heap slot of the subtree root.
pub(super) fn balance_recursive(
    photons: &mut [Photon],
    indices: &mut [usize],
    heap_permutation: &mut [usize],
    aabb: &mut Bounds3f,
    sort_start: usize,
    sort_end: usize,
    heap_index: usize,
) {
    // A fully left-balanced binary tree has this many nodes on its left
    // subtree.
    let left_size = left_subtree_size(sort_end - sort_start);
    let pivot = sort_start + left_size;

    // Splitting along the axis with the widest spread works well in practice
    // and is cheap to compute.
    let split_axis = aabb.maximum_extent();

    quick_partition(photons, indices, sort_start, sort_end, pivot, split_axis);
    let split_pos = photons[indices[pivot]].pos[usize::from(split_axis)];

    // Update the heap permutation and record the splitting axis.
    heap_permutation[heap_index] = indices[pivot];
    photons[indices[pivot]].axis = u8::from(split_axis);

    if pivot > sort_start {
        if pivot > sort_start + 1 {
            let saved = aabb.p_max[split_axis];
            aabb.p_max[split_axis] = split_pos;
            balance_recursive(
                photons,
                indices,
                heap_permutation,
                aabb,
                sort_start,
                pivot,
                left_child(heap_index),
            );
            aabb.p_max[split_axis] = saved;
        } else {
            // Single-element subtree, record it directly.
            heap_permutation[left_child(heap_index)] = indices[sort_start];
        }
    }

    if pivot < sort_end - 1 {
        if pivot < sort_end - 2 {
            let saved = aabb.p_min[split_axis];
            aabb.p_min[split_axis] = split_pos;
            balance_recursive(
                photons,
                indices,
                heap_permutation,
                aabb,
                pivot + 1,
                sort_end,
                right_child(heap_index),
            );
            aabb.p_min[split_axis] = saved;
        } else {
            // Single-element subtree, record it directly.
            heap_permutation[right_child(heap_index)] = indices[sort_end - 1];
        }
    }
}

/// Applies a permutation to the photon array by following its cycles, so no
/// second array of photons is needed. `perm[i]` names the storage index of
/// the photon that must end up in slot `i`. The permutation array is
/// consumed: it is the identity afterwards.
///
/// * `photons` - Photon storage.
/// * `perm`    - The permutation; `perm[0]` must be `0` (sentinel slot).
pub(super) fn permute_inplace(photons: &mut [Photon], perm: &mut [usize]) {
    for i in 0..perm.len() {
        if perm[i] == i {
            continue;
        }

        // The start of a new cycle has been found. Save the value at this
        // position, since it will be overwritten.
        let saved = photons[i];
        let mut j = i;

        loop {
            let k = perm[j];
            perm[j] = j;

            if k == i {
                // End of the cycle; fix the final position with the saved
                // photon.
                photons[j] = saved;
                break;
            }

            photons[j] = photons[k];
            j = k;
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
