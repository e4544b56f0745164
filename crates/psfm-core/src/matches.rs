//! Feature track records spanning three views.

use crate::Pt2;
use serde::{Deserialize, Serialize};

/// A feature track as indices: `a` in the seed view, `b` and `c` in the two
/// connected views of a triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleMatch {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

/// The same track promoted to pixel coordinates in the three views.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripleObservation {
    pub p1: Pt2,
    pub p2: Pt2,
    pub p3: Pt2,
}

impl TripleObservation {
    pub fn new(p1: Pt2, p2: Pt2, p3: Pt2) -> Self {
        Self { p1, p2, p3 }
    }
}
