//! Common geometry traits and constructors.

use super::{Normal3, Point3, Vector3};
use num_traits::Num;

/// Dot product of two geometric entities.
pub trait Dot<V> {
    /// The result type of the dot product.
    type Output;

    /// Returns the dot product.
    ///
    /// * `other` - The other entity.
    fn dot(&self, other: &V) -> Self::Output;
}

/// Union of two geometric entities.
pub trait Union<T> {
    /// Return the union with another entity.
    ///
    /// * `other` - The other entity.
    fn union(&self, other: &T) -> Self;
}

/// Creates a new 3-D vector.
///
/// * `x` - X-coordinate.
/// * `y` - Y-coordinate.
/// * `z` - Z-coordinate.
pub fn vector3<T: Num>(x: T, y: T, z: T) -> Vector3<T> {
    Vector3::new(x, y, z)
}

/// Creates a new 3-D point.
///
/// * `x` - X-coordinate.
/// * `y` - Y-coordinate.
/// * `z` - Z-coordinate.
pub fn point3<T: Num>(x: T, y: T, z: T) -> Point3<T> {
    Point3::new(x, y, z)
}

/// Creates a new 3-D normal.
///
/// * `x` - X-coordinate.
/// * `y` - Y-coordinate.
/// * `z` - Z-coordinate.
pub fn normal3<T: Num>(x: T, y: T, z: T) -> Normal3<T> {
    Normal3::new(x, y, z)
}
