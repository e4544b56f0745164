//! Bundle-adjustment-ready scene containers.
//!
//! [`ProjectiveStructure`] holds one camera per view slot plus the
//! triangulated homogeneous points; [`SceneObservations`] holds the pixel
//! observations feeding bundle adjustment, one list per view slot. View
//! slot assignment is the caller's contract: slot 0 is the seed view and is
//! marked fixed with an identity camera.

use crate::{ImageShape, Mat34, Pt2, Vec4};
use serde::{Deserialize, Serialize};

/// One camera slot of a projective reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectiveView {
    /// Fixed views are not touched by bundle adjustment.
    pub fixed: bool,
    /// World-to-view projective camera matrix.
    pub camera: Mat34,
    /// Image dimensions of the underlying view.
    pub shape: ImageShape,
}

impl Default for ProjectiveView {
    fn default() -> Self {
        Self {
            fixed: false,
            camera: Mat34::zeros(),
            shape: ImageShape::default(),
        }
    }
}

/// A projective reconstruction: cameras and homogeneous 3D points in one
/// common projective frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectiveStructure {
    pub views: Vec<ProjectiveView>,
    pub points: Vec<Vec4>,
}

impl ProjectiveStructure {
    /// Reset to `num_views` empty view slots and `num_points` zero points.
    pub fn initialize(&mut self, num_views: usize, num_points: usize) {
        self.views.clear();
        self.views.resize_with(num_views, ProjectiveView::default);
        self.points.clear();
        self.points.resize(num_points, Vec4::zeros());
    }

    /// Assign camera, fixedness and image shape of one view slot.
    pub fn set_view(&mut self, slot: usize, fixed: bool, camera: Mat34, shape: ImageShape) {
        let view = &mut self.views[slot];
        view.fixed = fixed;
        view.camera = camera;
        view.shape = shape;
    }
}

/// Pixel observations of one view slot, as parallel point-index / pixel
/// arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewObservations {
    /// Indices into [`ProjectiveStructure::points`].
    pub point: Vec<usize>,
    /// Observed pixel for the point at the same position.
    pub pixel: Vec<Pt2>,
}

impl ViewObservations {
    pub fn add(&mut self, point_index: usize, pixel: Pt2) {
        self.point.push(point_index);
        self.pixel.push(pixel);
    }

    pub fn len(&self) -> usize {
        self.point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point.is_empty()
    }
}

/// Observations for every view slot of a reconstruction, in slot order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneObservations {
    pub views: Vec<ViewObservations>,
}

impl SceneObservations {
    /// Reset to `num_views` empty observation lists.
    pub fn initialize(&mut self, num_views: usize) {
        self.views.clear();
        self.views.resize_with(num_views, ViewObservations::default);
    }

    /// Total observation count across all views.
    pub fn total(&self) -> usize {
        self.views.iter().map(ViewObservations::len).sum()
    }
}
