//! Read-only access to per-view pixel features and image dimensions.

use crate::Pt2;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub width: usize,
    pub height: usize,
}

impl ImageShape {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

/// Source of per-view detected features, keyed by view identifier.
///
/// Positions in the feature list are the feature indices used by the
/// pairwise graph's inlier correspondences.
pub trait LookupSimilarImages {
    /// Replace `out` with the pixel coordinates of every detected feature in
    /// the view, in feature-index order.
    fn pixel_features(&self, view_id: &str, out: &mut Vec<Pt2>) -> Result<()>;

    /// Dimensions of the view's image.
    fn image_shape(&self, view_id: &str) -> Result<ImageShape>;
}

#[derive(Debug, Clone)]
struct ImageEntry {
    shape: ImageShape,
    features: Vec<Pt2>,
}

/// Map-backed [`LookupSimilarImages`] implementation for tests and small
/// in-process datasets.
#[derive(Debug, Clone, Default)]
pub struct InMemorySimilarImages {
    images: HashMap<String, ImageEntry>,
}

impl InMemorySimilarImages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view, replacing any previous entry with the same id.
    pub fn insert(&mut self, view_id: impl Into<String>, shape: ImageShape, features: Vec<Pt2>) {
        self.images
            .insert(view_id.into(), ImageEntry { shape, features });
    }
}

impl LookupSimilarImages for InMemorySimilarImages {
    fn pixel_features(&self, view_id: &str, out: &mut Vec<Pt2>) -> Result<()> {
        let Some(entry) = self.images.get(view_id) else {
            bail!("unknown view id {view_id:?}");
        };
        out.clear();
        out.extend_from_slice(&entry.features);
        Ok(())
    }

    fn image_shape(&self, view_id: &str) -> Result<ImageShape> {
        let Some(entry) = self.images.get(view_id) else {
            bail!("unknown view id {view_id:?}");
        };
        Ok(entry.shape)
    }
}
