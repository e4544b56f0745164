//! Pixel and point conditioning around bundle adjustment.
//!
//! Raw pixel coordinates (hundreds of units) and mixed-magnitude
//! homogeneous points make the bundle normal equations badly scaled. The
//! preconditioner centers each view's observations on their mean, divides
//! by their standard deviation, and folds the same similarity into that
//! view's camera so reprojection residuals are unchanged; homogeneous
//! points are rescaled to unit norm, which is projectively neutral.
//!
//! The undo protocol is split: callers remove the camera scaling themselves
//! via [`PixelScale::remove`] (the refined camera differs from the one
//! scaling was applied to), then call [`ScaleSceneStructure::undo`] to
//! restore the observation pixels.

use anyhow::{ensure, Result};
use psfm_core::{Mat3, Mat34, ProjectiveStructure, Pt2, Real, SceneObservations};

/// Per-view pixel normalization `p ↦ (p − center) / scale`.
#[derive(Debug, Clone, Copy)]
pub struct PixelScale {
    pub center: Pt2,
    pub scale: Real,
}

impl PixelScale {
    fn from_pixels(pixels: &[Pt2]) -> Self {
        if pixels.is_empty() {
            return Self {
                center: Pt2::origin(),
                scale: 1.0,
            };
        }
        let n = pixels.len() as Real;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for p in pixels {
            cx += p.x;
            cy += p.y;
        }
        cx /= n;
        cy /= n;

        let mut var = 0.0;
        for p in pixels {
            let dx = p.x - cx;
            let dy = p.y - cy;
            var += dx * dx + dy * dy;
        }
        let scale = (var / (2.0 * n)).sqrt();
        Self {
            center: Pt2::new(cx, cy),
            scale: if scale > Real::EPSILON { scale } else { 1.0 },
        }
    }

    fn matrix(&self) -> Mat3 {
        let s = 1.0 / self.scale;
        Mat3::new(
            s,
            0.0,
            -self.center.x * s,
            0.0,
            s,
            -self.center.y * s,
            0.0,
            0.0,
            1.0,
        )
    }

    fn matrix_inv(&self) -> Mat3 {
        Mat3::new(
            self.scale,
            0.0,
            self.center.x,
            0.0,
            self.scale,
            self.center.y,
            0.0,
            0.0,
            1.0,
        )
    }

    fn apply_pixel(&self, p: &Pt2) -> Pt2 {
        Pt2::new(
            (p.x - self.center.x) / self.scale,
            (p.y - self.center.y) / self.scale,
        )
    }

    fn undo_pixel(&self, p: &Pt2) -> Pt2 {
        Pt2::new(
            p.x * self.scale + self.center.x,
            p.y * self.scale + self.center.y,
        )
    }

    /// Remove this view's scaling from a camera matrix: `P ↦ N⁻¹ · P`.
    pub fn remove(&self, p: &Mat34) -> Mat34 {
        self.matrix_inv() * p
    }
}

/// Stateful scene preconditioner. One [`PixelScale`] per view is retained
/// between [`apply`](Self::apply) and [`undo`](Self::undo).
#[derive(Debug, Clone, Default)]
pub struct ScaleSceneStructure {
    pub pixel_scaling: Vec<PixelScale>,
}

impl ScaleSceneStructure {
    /// Normalize observations and cameras view by view, and rescale every
    /// homogeneous point to unit norm.
    pub fn apply(
        &mut self,
        structure: &mut ProjectiveStructure,
        observations: &mut SceneObservations,
    ) -> Result<()> {
        ensure!(
            structure.views.len() == observations.views.len(),
            "structure has {} views but observations have {}",
            structure.views.len(),
            observations.views.len()
        );

        self.pixel_scaling.clear();
        for (view, obs) in structure.views.iter_mut().zip(&mut observations.views) {
            let scale = PixelScale::from_pixels(&obs.pixel);
            for p in &mut obs.pixel {
                *p = scale.apply_pixel(p);
            }
            view.camera = scale.matrix() * view.camera;
            self.pixel_scaling.push(scale);
        }

        for x in &mut structure.points {
            let n = x.norm();
            if n > Real::EPSILON {
                *x /= n;
            }
        }
        Ok(())
    }

    /// Restore observation pixels to their original coordinate system.
    ///
    /// Cameras are *not* touched here; remove their scaling first with
    /// [`PixelScale::remove`]. Point normalization is projectively neutral
    /// and is left in place.
    pub fn undo(
        &mut self,
        _structure: &mut ProjectiveStructure,
        observations: &mut SceneObservations,
    ) -> Result<()> {
        ensure!(
            self.pixel_scaling.len() == observations.views.len(),
            "scaler holds {} views but observations have {}",
            self.pixel_scaling.len(),
            observations.views.len()
        );
        for (scale, obs) in self.pixel_scaling.iter().zip(&mut observations.views) {
            for p in &mut obs.pixel {
                *p = scale.undo_pixel(p);
            }
        }
        self.pixel_scaling.clear();
        Ok(())
    }
}
