//! Shared numerical helpers for the linear solvers.
//!
//! Hartley normalization conditions DLT systems by centering points at the
//! origin with mean distance `√2` (Hartley & Zisserman, Algorithm 4.2);
//! homogeneous 4-vectors are conditioned by rescaling to unit norm, which is
//! projectively neutral and keeps design-matrix rows balanced even for
//! points near the plane at infinity.

use nalgebra::DMatrix;
use psfm_core::{Mat3, Mat34, Pt2, Real, Vec4};

/// Hartley normalization for 2D points.
///
/// Returns the normalized points and the 3×3 similarity `T` such that
/// `p_norm = T * p_homogeneous`, or `None` if the input is empty or all
/// points coincide.
pub fn normalize_points_2d(points: &[Pt2]) -> Option<(Vec<Pt2>, Mat3)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as Real;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for p in points {
        cx += p.x;
        cy += p.y;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0;
    for p in points {
        mean_dist += (p.x - cx).hypot(p.y - cy);
    }
    mean_dist /= n;
    if mean_dist <= Real::EPSILON {
        return None;
    }

    let s = Real::sqrt(2.0) / mean_dist;
    let t = Mat3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let norm = points
        .iter()
        .map(|p| Pt2::new((p.x - cx) * s, (p.y - cy) * s))
        .collect();
    Some((norm, t))
}

/// Rescale each homogeneous 4-vector to unit Euclidean norm.
///
/// Returns `None` if any input is (numerically) the zero vector, which does
/// not represent a projective point.
pub fn unit_norm_homogeneous(points: &[Vec4]) -> Option<Vec<Vec4>> {
    let mut out = Vec::with_capacity(points.len());
    for x in points {
        let n = x.norm();
        if n <= Real::EPSILON {
            return None;
        }
        out.push(x / n);
    }
    Some(out)
}

/// Reshape a 12-element row of an SVD `V^T` factor into a 3×4 matrix,
/// row-major. Used to extract a camera matrix from a DLT nullspace.
///
/// # Panics
///
/// Panics if `v_t` does not have exactly 12 columns.
pub fn mat34_from_svd_row(v_t: &DMatrix<Real>, row: usize) -> Mat34 {
    assert_eq!(v_t.ncols(), 12, "expected 12 columns for 3x4 extraction");
    let mut m = Mat34::zeros();
    for r in 0..3 {
        for c in 0..4 {
            m[(r, c)] = v_t[(row, 4 * r + c)];
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_centers_and_scales() {
        let points = vec![
            Pt2::new(100.0, 200.0),
            Pt2::new(220.0, 340.0),
            Pt2::new(150.0, 260.0),
            Pt2::new(180.0, 210.0),
        ];
        let (norm, t) = normalize_points_2d(&points).unwrap();

        let cx: Real = norm.iter().map(|p| p.x).sum::<Real>() / norm.len() as Real;
        let cy: Real = norm.iter().map(|p| p.y).sum::<Real>() / norm.len() as Real;
        assert!(cx.abs() < 1e-10);
        assert!(cy.abs() < 1e-10);

        let mean: Real =
            norm.iter().map(|p| p.x.hypot(p.y)).sum::<Real>() / norm.len() as Real;
        assert!((mean - Real::sqrt(2.0)).abs() < 1e-10);

        // T actually maps the originals onto the normalized points.
        for (p, q) in points.iter().zip(&norm) {
            let v = t * psfm_core::to_homogeneous(p);
            assert!((v.x / v.z - q.x).abs() < 1e-12);
            assert!((v.y / v.z - q.y).abs() < 1e-12);
        }
    }

    #[test]
    fn coincident_points_are_rejected() {
        let points = vec![Pt2::new(5.0, 5.0); 3];
        assert!(normalize_points_2d(&points).is_none());
    }

    #[test]
    fn unit_norm_rejects_zero_vector() {
        assert!(unit_norm_homogeneous(&[Vec4::zeros()]).is_none());
        let out = unit_norm_homogeneous(&[Vec4::new(0.0, 3.0, 0.0, 4.0)]).unwrap();
        assert!((out[0].norm() - 1.0).abs() < 1e-14);
    }
}
