//! N-view projective triangulation.

use nalgebra::DMatrix;
use psfm_core::{Mat34, Pt2, Real, Vec4};

/// Triangulate one feature observed in `n ≥ 2` views as a homogeneous point.
///
/// Builds the standard DLT system (two rows `x·p₃ᵀ − p₁ᵀ` and
/// `y·p₃ᵀ − p₂ᵀ` per view, each normalized to unit length) and extracts
/// the nullspace. Returns `None` when the system is degenerate: mismatched
/// or insufficient inputs, a vanishing constraint row, or a nullspace of
/// dimension greater than one (the observed rays do not intersect in a
/// unique projective point, e.g. when all projections coincide).
pub fn triangulate_nview(pixels: &[Pt2], cameras: &[Mat34]) -> Option<Vec4> {
    if pixels.len() != cameras.len() || pixels.len() < 2 {
        return None;
    }

    let mut a = DMatrix::<Real>::zeros(2 * pixels.len(), 4);
    for (i, (pix, p)) in pixels.iter().zip(cameras).enumerate() {
        let r0 = p.row(2) * pix.x - p.row(0);
        let r1 = p.row(2) * pix.y - p.row(1);

        let n0 = r0.norm();
        let n1 = r1.norm();
        if n0 <= Real::EPSILON || n1 <= Real::EPSILON {
            return None;
        }
        a.row_mut(2 * i).copy_from(&(r0 / n0));
        a.row_mut(2 * i + 1).copy_from(&(r1 / n1));
    }

    let svd = a.svd(false, true);
    let sv = &svd.singular_values;
    // A unique solution needs a one-dimensional nullspace: the third
    // singular value must stay well away from zero.
    if sv[2] <= 1e-9 * sv[0] {
        return None;
    }

    let v_t = svd.v_t?;
    let row = v_t.row(v_t.nrows() - 1);
    let x = Vec4::new(row[0], row[1], row[2], row[3]);
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};
    use psfm_core::{identity_camera, project_camera, Mat3};

    fn pinhole(yaw: Real, center: Vector3<Real>) -> Mat34 {
        let k = Mat3::new(600.0, 0.0, 320.0, 0.0, 600.0, 240.0, 0.0, 0.0, 1.0);
        let r = *Rotation3::from_euler_angles(0.0, yaw, 0.0).matrix();
        let mut p = Mat34::zeros();
        p.fixed_view_mut::<3, 3>(0, 0).copy_from(&(k * r));
        p.set_column(3, &(k * (-(r * center))));
        p
    }

    #[test]
    fn recovers_point_from_three_views() {
        let cameras = vec![
            pinhole(0.0, Vector3::new(-0.4, 0.0, 0.0)),
            pinhole(0.05, Vector3::new(0.0, 0.1, 0.0)),
            pinhole(-0.08, Vector3::new(0.4, 0.0, 0.0)),
        ];
        let x = Vec4::new(0.3, -0.2, 2.5, 1.0);
        let pixels: Vec<Pt2> = cameras
            .iter()
            .map(|p| project_camera(p, &x).unwrap())
            .collect();

        let est = triangulate_nview(&pixels, &cameras).unwrap();
        // Compare dehomogenized coordinates.
        for (pix, p) in pixels.iter().zip(&cameras) {
            let reproj = project_camera(p, &est).unwrap();
            assert!((reproj - pix).norm() < 1e-8);
        }
        let scale = x.w / est.w;
        assert!((est * scale - x).norm() < 1e-8);
    }

    #[test]
    fn coincident_cameras_are_degenerate() {
        let p = identity_camera();
        let pixels = vec![Pt2::new(10.0, 5.0); 3];
        let cameras = vec![p, p, p];
        assert!(triangulate_nview(&pixels, &cameras).is_none());
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let cameras = vec![identity_camera()];
        assert!(triangulate_nview(&[Pt2::new(0.0, 0.0)], &cameras).is_none());
    }
}
