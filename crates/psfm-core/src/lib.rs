//! Core types and engines for projective structure-from-motion.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Pt2`, `Mat34`, ...),
//! - the pairwise image graph consumed by the initializer ([`PairwiseGraph`]),
//! - the image database trait ([`LookupSimilarImages`]),
//! - bundle-adjustment-ready scene containers ([`ProjectiveStructure`],
//!   [`SceneObservations`]),
//! - a generic RANSAC engine ([`ransac`], [`Estimator`]),
//! - deterministic synthetic scenes for tests ([`synthetic`]).
//!
//! Estimation algorithms live in `psfm-linear` and `psfm-optim`; the
//! orchestration that ties them together lives in `psfm-pipeline` and is
//! re-exported via the top-level `psfm` crate.

/// Linear algebra type aliases and projection helpers.
pub mod math;
/// Pairwise image graph: views, motions, inlier correspondences.
pub mod graph;
/// Read-only access to per-view detected features.
pub mod database;
/// Feature track records shared between the graph and the solvers.
pub mod matches;
/// Projective scene structure and observation containers.
pub mod structure;
/// Generic RANSAC engine and traits.
pub mod ransac;
/// Deterministic synthetic multi-view scenes.
pub mod synthetic;

pub use database::*;
pub use graph::*;
pub use matches::*;
pub use math::*;
pub use ransac::*;
pub use structure::*;
