//! Photon map core of a physically based rendering system.
//!
//! Photons deposited by a particle tracing pass are collected into a
//! [`photonmap::PhotonMap`], balanced once into a left-balanced kd-tree
//! stored in implicit heap order, and then queried concurrently by the
//! density estimators of a gathering pass.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod geometry;
pub mod interaction;
pub mod medium;
pub mod pbrt;
pub mod photonmap;
pub mod reflection;
pub mod spectrum;
