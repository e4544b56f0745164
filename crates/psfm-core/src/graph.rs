//! Pairwise image graph.
//!
//! Views and motions live in two arenas and reference each other by index,
//! which keeps the bidirectional view ↔ edge relationship free of reference
//! cycles. Each motion records which of its two views authored it (`src`)
//! and which received it (`dst`); inlier correspondences are stored in that
//! authorship order. Use [`PairwiseMotion::oriented_inliers`] to read them
//! relative to a chosen endpoint without juggling direction flags.

use crate::Real;
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// A pair of feature indices associated across a motion edge: `src` indexes
/// a feature in the edge's source view, `dst` in its destination view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPair {
    pub src: usize,
    pub dst: usize,
}

impl IndexPair {
    pub fn new(src: usize, dst: usize) -> Self {
        Self { src, dst }
    }
}

/// An image node. Feature indices in this view are dense integers in
/// `[0, total_features)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseView {
    /// Opaque identifier, also the key into the image database.
    pub id: String,
    /// Number of features detected in this view.
    pub total_features: usize,
    /// Indices into [`PairwiseGraph::motions`] for every edge touching this view.
    pub connections: Vec<usize>,
}

/// An undirected pairwise relation between two views with a designated
/// source and destination. The designation is intrinsic to the edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseMotion {
    /// Index of the view that authored this motion.
    pub src: usize,
    /// Index of the destination view.
    pub dst: usize,
    /// Quality score consumed by triplet selection. Higher is better.
    pub score: Real,
    /// Feature correspondences that survived pairwise robust matching.
    pub inliers: Vec<IndexPair>,
}

impl PairwiseMotion {
    /// The endpoint of this motion that is not `view`.
    pub fn other(&self, view: usize) -> usize {
        if view == self.src {
            self.dst
        } else {
            self.src
        }
    }

    /// Whether `view` is the authoring side of this motion.
    pub fn is_source(&self, view: usize) -> bool {
        view == self.src
    }

    /// Iterate inliers as `(near_feature, far_feature)` pairs, where `near`
    /// is the given endpoint. This hides the authorship direction entirely.
    pub fn oriented_inliers(&self, near: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let near_is_src = self.is_source(near);
        self.inliers.iter().map(move |pair| {
            if near_is_src {
                (pair.src, pair.dst)
            } else {
                (pair.dst, pair.src)
            }
        })
    }
}

/// Arena-backed multigraph of views and motions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairwiseGraph {
    pub views: Vec<PairwiseView>,
    pub motions: Vec<PairwiseMotion>,
}

impl PairwiseGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a view and return its index.
    pub fn add_view(&mut self, id: impl Into<String>, total_features: usize) -> usize {
        self.views.push(PairwiseView {
            id: id.into(),
            total_features,
            connections: Vec::new(),
        });
        self.views.len() - 1
    }

    /// Connect two views with a motion authored `src → dst`.
    ///
    /// The score defaults to the inlier count; callers with a better quality
    /// measure can overwrite [`PairwiseMotion::score`] afterwards.
    ///
    /// # Errors
    ///
    /// Fails on self-loops, unknown view indices, or inlier feature indices
    /// outside either view's `[0, total_features)` range.
    pub fn connect(&mut self, src: usize, dst: usize, inliers: Vec<IndexPair>) -> Result<usize> {
        ensure!(src != dst, "motion must connect two distinct views");
        ensure!(
            src < self.views.len() && dst < self.views.len(),
            "view index out of range: {} -> {} with {} views",
            src,
            dst,
            self.views.len()
        );
        for pair in &inliers {
            ensure!(
                pair.src < self.views[src].total_features,
                "inlier feature {} out of range for source view {}",
                pair.src,
                src
            );
            ensure!(
                pair.dst < self.views[dst].total_features,
                "inlier feature {} out of range for destination view {}",
                pair.dst,
                dst
            );
        }

        let score = inliers.len() as Real;
        let index = self.motions.len();
        self.motions.push(PairwiseMotion {
            src,
            dst,
            score,
            inliers,
        });
        self.views[src].connections.push(index);
        self.views[dst].connections.push(index);
        Ok(index)
    }

    /// Find the motion connecting two views, if any. Linear in the degree of
    /// `a`, which is small in practice.
    pub fn find_motion(&self, a: usize, b: usize) -> Option<usize> {
        self.views
            .get(a)?
            .connections
            .iter()
            .copied()
            .find(|&m| self.motions[m].other(a) == b)
    }
}
