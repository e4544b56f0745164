//! Projective structure-from-motion initialization.
//!
//! Given a pairwise image graph and a feature database, the
//! [`ProjectiveInitializer`] builds a projective reconstruction anchored at
//! a chosen seed view:
//!
//! 1. select the best-scoring view triplet containing the seed,
//! 2. intersect feature tracks across the triplet's three motions,
//! 3. robustly fit a trifocal tensor and extract compatible cameras,
//! 4. triangulate the inlier tracks as homogeneous points,
//! 5. resect every remaining view connected to the seed,
//! 6. refine everything with projective bundle adjustment.
//!
//! ```no_run
//! use psfm_core::{LookupSimilarImages, PairwiseGraph};
//! use psfm_pipeline::ProjectiveInitializer;
//!
//! # fn demo(db: &dyn LookupSimilarImages, graph: &PairwiseGraph) -> anyhow::Result<()> {
//! let mut init = ProjectiveInitializer::default();
//! let seed = 0;
//! let conn: Vec<usize> = (0..graph.views[seed].connections.len()).collect();
//! init.projective_scene(db, graph, seed, &conn)?;
//! println!("{} points reconstructed", init.structure.points.len());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod initializer;

pub use config::*;
pub use error::*;
pub use initializer::*;
