//! High-level entry crate for the `psfm` toolbox.
//!
//! Builds a projective reconstruction around a seed view of a pairwise
//! image graph: triplet selection, three-view track intersection, robust
//! trifocal estimation, triangulation, resection of the remaining views,
//! and projective bundle adjustment.
//!
//! ```no_run
//! use psfm::prelude::*;
//!
//! # fn demo(db: &dyn LookupSimilarImages, graph: &PairwiseGraph) -> Result<(), InitializeError> {
//! let mut init = ProjectiveInitializer::default();
//! let seed = 0;
//! let conn: Vec<usize> = (0..graph.views[seed].connections.len()).collect();
//! init.projective_scene(db, graph, seed, &conn)?;
//!
//! for (slot, view) in init.structure.views.iter().enumerate() {
//!     println!("slot {slot}: camera {:?}", view.camera);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - **[`core`]**: math types, the pairwise graph, scene containers, RANSAC
//! - **[`linear`]**: closed-form kernels (trifocal, triangulation, resection)
//! - **[`optim`]**: projective bundle adjustment and scene scaling
//! - **[`pipeline`]**: the initializer tying the stages together

/// Core math types, graph and scene containers, RANSAC primitives.
pub mod core {
    pub use psfm_core::*;
}

/// Deterministic synthetic scene generation helpers.
pub mod synthetic {
    pub use psfm_core::synthetic::*;
}

/// Closed-form estimation kernels.
pub mod linear {
    pub use psfm_linear::*;
}

/// Non-linear refinement.
pub mod optim {
    pub use psfm_optim::*;
}

/// The projective initialization pipeline.
pub mod pipeline {
    pub use psfm_pipeline::*;
}

// Re-exports for convenience
pub use psfm_core::{
    ImageShape, LookupSimilarImages, PairwiseGraph, PairwiseMotion, PairwiseView,
    ProjectiveStructure, SceneObservations,
};
pub use psfm_pipeline::{InitializeError, ProjectiveInitializer, ProjectiveInitializerConfig};

/// Convenient re-exports for common use cases.
pub mod prelude {
    pub use crate::core::{
        ImageShape, IndexPair, LookupSimilarImages, Mat34, PairwiseGraph, ProjectiveStructure,
        Pt2, Real, SceneObservations, Vec4,
    };
    pub use crate::pipeline::{
        InitializeError, ProjectiveInitializer, ProjectiveInitializerConfig,
    };
}
