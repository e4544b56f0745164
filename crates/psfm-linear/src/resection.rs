//! Projective resection: camera matrix from known homogeneous 3D points.

use crate::math::{mat34_from_svd_row, normalize_points_2d, unit_norm_homogeneous};
use anyhow::{anyhow, ensure, Result};
use nalgebra::DMatrix;
use psfm_core::{Mat34, Pt2, Real, Vec4};

/// Estimate the 3×4 camera matrix from `n ≥ 6` correspondences between
/// homogeneous world points and their pixel observations, using normalized
/// DLT. The world points may lie anywhere in projective space, including at
/// infinity; they are conditioned to unit norm, which leaves the solution
/// unchanged.
///
/// The returned matrix is defined up to a global scale.
pub fn resect_camera(world: &[Vec4], image: &[Pt2]) -> Result<Mat34> {
    let n = world.len();
    ensure!(n >= 6, "need at least 6 point correspondences, got {}", n);
    ensure!(
        n == image.len(),
        "mismatched number of world points ({}) and image points ({})",
        n,
        image.len()
    );

    let world_n = unit_norm_homogeneous(world)
        .ok_or_else(|| anyhow!("world point with vanishing norm"))?;
    let (image_n, t_i) = normalize_points_2d(image)
        .ok_or_else(|| anyhow!("degenerate pixel configuration for normalization"))?;

    let mut a = DMatrix::<Real>::zeros(2 * n, 12);
    for (i, (x, p)) in world_n.iter().zip(&image_n).enumerate() {
        let (u, v) = (p.x, p.y);
        let r0 = 2 * i;
        let r1 = 2 * i + 1;
        for c in 0..4 {
            a[(r0, c)] = x[c];
            a[(r0, 8 + c)] = -u * x[c];
            a[(r1, 4 + c)] = x[c];
            a[(r1, 8 + c)] = -v * x[c];
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or_else(|| anyhow!("SVD failed"))?;
    let p_norm = mat34_from_svd_row(&v_t, v_t.nrows() - 1);

    let t_i_inv = t_i
        .try_inverse()
        .ok_or_else(|| anyhow!("pixel normalization is singular"))?;
    Ok(t_i_inv * p_norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};
    use psfm_core::{project_camera, Mat3};

    fn camera_under_test() -> Mat34 {
        let k = Mat3::new(820.0, 0.0, 512.0, 0.0, 800.0, 384.0, 0.0, 0.0, 1.0);
        let r = *Rotation3::from_euler_angles(0.08, -0.12, 0.05).matrix();
        let t = Vector3::new(0.15, -0.1, 1.4);
        let mut p = Mat34::zeros();
        p.fixed_view_mut::<3, 3>(0, 0).copy_from(&(k * r));
        p.set_column(3, &(k * t));
        p
    }

    fn align_scale(estimate: &Mat34, truth: &Mat34) -> Mat34 {
        let dot: Real = truth
            .iter()
            .zip(estimate.iter())
            .map(|(a, b)| a * b)
            .sum();
        let denom: Real = estimate.iter().map(|v| v * v).sum();
        estimate * (dot / denom)
    }

    #[test]
    fn recovers_camera_from_finite_points() {
        let p_gt = camera_under_test();

        let mut world = Vec::new();
        let mut image = Vec::new();
        for i in 0..3 {
            for j in 0..4 {
                let x = Vec4::new(
                    -0.4 + 0.3 * i as Real,
                    -0.5 + 0.3 * j as Real,
                    2.0 + 0.15 * ((i + 2 * j) % 4) as Real,
                    1.0,
                );
                image.push(project_camera(&p_gt, &x).unwrap());
                world.push(x);
            }
        }

        let p_est = resect_camera(&world, &image).unwrap();
        let diff = (align_scale(&p_est, &p_gt) - p_gt).norm();
        assert!(diff < 1e-6 * p_gt.norm(), "camera diff too large: {diff}");
    }

    #[test]
    fn homogeneous_scaling_of_world_points_is_irrelevant() {
        let p_gt = camera_under_test();

        let mut world = Vec::new();
        let mut image = Vec::new();
        for i in 0..8 {
            let x = Vec4::new(
                -0.5 + 0.3 * (i % 4) as Real,
                -0.4 + 0.7 * (i / 4) as Real,
                2.2 + 0.2 * (i % 3) as Real,
                1.0,
            );
            image.push(project_camera(&p_gt, &x).unwrap());
            // Rescale the homogeneous representative arbitrarily.
            world.push(x * (0.02 + 1.7 * i as Real));
        }

        let p_est = resect_camera(&world, &image).unwrap();
        for (x, pix) in world.iter().zip(&image) {
            let reproj = project_camera(&p_est, x).unwrap();
            assert!((reproj - pix).norm() < 1e-7);
        }
    }

    #[test]
    fn too_few_points_is_an_error() {
        let world = vec![Vec4::new(0.0, 0.0, 2.0, 1.0); 5];
        let image = vec![Pt2::new(0.0, 0.0); 5];
        assert!(resect_camera(&world, &image).is_err());
    }
}
