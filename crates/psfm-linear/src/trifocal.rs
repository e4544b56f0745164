//! Trifocal tensor estimation and camera extraction.
//!
//! The tensor is stored as three 3×3 slices `T₁, T₂, T₃`. With cameras
//! `P1 = [I | 0]`, `P2 = [A | a₄]`, `P3 = [B | b₄]` the slices are
//! `Tᵢ = aᵢ b₄ᵀ − a₄ bᵢᵀ` (Hartley & Zisserman ch. 15), and a point triple
//! `(x, x′, x″)` satisfies the incidence relation
//! `Σᵢ xⁱ [x′]_× Tᵢ [x″]_× = 0₃ₓ₃`.
//!
//! [`TrifocalTensor::solve_linear`] fits the 27 tensor entries from ≥ 7
//! normalized triples; [`TrifocalTensor::extract_cameras`] recovers a pair
//! of camera matrices consistent with `P1 = [I | 0]` in one projective
//! frame. [`TrifocalEstimator`] wraps both for the RANSAC engine, scoring
//! candidates by reprojection error of the triangulated track so the inlier
//! threshold is in pixels.

use crate::math::normalize_points_2d;
use crate::triangulation::triangulate_nview;
use nalgebra::{DMatrix, Vector3};
use psfm_core::{
    identity_camera, skew, to_homogeneous, Estimator, Mat3, Mat34, Pt2, Real, TripleObservation,
    Vec3,
};
use thiserror::Error;

/// Errors from trifocal estimation.
#[derive(Debug, Error)]
pub enum TrifocalError {
    /// Not enough triple correspondences for the linear solve.
    #[error("need at least 7 triple correspondences, got {0}")]
    NotEnoughPoints(usize),
    /// Point configuration cannot be normalized (all points coincide).
    #[error("degenerate point configuration for normalization")]
    DegenerateConfiguration,
    /// SVD failed to produce the requested factors.
    #[error("svd failed in trifocal estimation")]
    SvdFailed,
    /// A tensor slice or epipole system has no well-defined null vector.
    #[error("tensor does not admit a camera extraction")]
    DegenerateTensor,
}

/// Trifocal tensor as three 3×3 slices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrifocalTensor {
    pub t1: Mat3,
    pub t2: Mat3,
    pub t3: Mat3,
}

impl TrifocalTensor {
    pub fn slices(&self) -> [&Mat3; 3] {
        [&self.t1, &self.t2, &self.t3]
    }

    /// Frobenius norm over all 27 entries.
    pub fn norm(&self) -> Real {
        (self.t1.norm_squared() + self.t2.norm_squared() + self.t3.norm_squared()).sqrt()
    }

    /// Tensor of the camera triple `([I | 0], p2, p3)`.
    pub fn from_cameras(p2: &Mat34, p3: &Mat34) -> Self {
        let a4: Vec3 = p2.column(3).into_owned();
        let b4: Vec3 = p3.column(3).into_owned();
        let slice = |i: usize| -> Mat3 {
            let ai: Vec3 = p2.column(i).into_owned();
            let bi: Vec3 = p3.column(i).into_owned();
            ai * b4.transpose() - a4 * bi.transpose()
        };
        Self {
            t1: slice(0),
            t2: slice(1),
            t3: slice(2),
        }
    }

    /// Linear fit from `n ≥ 7` pixel triples (normalized DLT).
    ///
    /// Each triple contributes the nine incidence equations
    /// `Σᵢ xⁱ [x′]_× Tᵢ [x″]_× = 0`; the 27-vector of tensor entries is the
    /// nullspace of the stacked system. The result is scaled to unit
    /// Frobenius norm.
    pub fn solve_linear(obs: &[TripleObservation]) -> Result<Self, TrifocalError> {
        if obs.len() < 7 {
            return Err(TrifocalError::NotEnoughPoints(obs.len()));
        }

        let p1: Vec<Pt2> = obs.iter().map(|o| o.p1).collect();
        let p2: Vec<Pt2> = obs.iter().map(|o| o.p2).collect();
        let p3: Vec<Pt2> = obs.iter().map(|o| o.p3).collect();
        let (n1, t_1) =
            normalize_points_2d(&p1).ok_or(TrifocalError::DegenerateConfiguration)?;
        let (n2, t_2) =
            normalize_points_2d(&p2).ok_or(TrifocalError::DegenerateConfiguration)?;
        let (n3, t_3) =
            normalize_points_2d(&p3).ok_or(TrifocalError::DegenerateConfiguration)?;

        let mut a = DMatrix::<Real>::zeros(9 * obs.len(), 27);
        for (idx, ((x, xp), xpp)) in n1.iter().zip(&n2).zip(&n3).enumerate() {
            let x = to_homogeneous(x);
            let l1 = skew(&to_homogeneous(xp));
            let l2 = skew(&to_homogeneous(xpp));

            // Coefficient of T_i[(j, k)] in constraint entry (m, n):
            //   x[i] * l1[(m, j)] * l2[(k, n)]
            for m in 0..3 {
                for n in 0..3 {
                    let row = 9 * idx + 3 * m + n;
                    for i in 0..3 {
                        for j in 0..3 {
                            for k in 0..3 {
                                a[(row, 9 * i + 3 * j + k)] = x[i] * l1[(m, j)] * l2[(k, n)];
                            }
                        }
                    }
                }
            }
        }

        let svd = a.svd(false, true);
        let v_t = svd.v_t.ok_or(TrifocalError::SvdFailed)?;
        let null = v_t.row(v_t.nrows() - 1);

        let mut slices = [Mat3::zeros(); 3];
        for (i, slice) in slices.iter_mut().enumerate() {
            for j in 0..3 {
                for k in 0..3 {
                    slice[(j, k)] = null[9 * i + 3 * j + k];
                }
            }
        }

        // Undo the normalization: with x̂ = T₁x, x̂′ = T₂x′, x̂″ = T₃x″ the
        // denormalized slices are Tᵢ = T₂⁻¹ (Σᵣ T₁[(r, i)] T̂ᵣ) T₃⁻ᵀ.
        let t2_inv = t_2.try_inverse().ok_or(TrifocalError::SvdFailed)?;
        let t3_inv_t = t_3.try_inverse().ok_or(TrifocalError::SvdFailed)?.transpose();
        let denorm = |i: usize| -> Mat3 {
            let mut acc = Mat3::zeros();
            for (r, s) in slices.iter().enumerate() {
                acc += s * t_1[(r, i)];
            }
            t2_inv * acc * t3_inv_t
        };

        let mut tensor = Self {
            t1: denorm(0),
            t2: denorm(1),
            t3: denorm(2),
        };
        let norm = tensor.norm();
        if norm <= Real::EPSILON || !norm.is_finite() {
            return Err(TrifocalError::DegenerateTensor);
        }
        tensor.t1 /= norm;
        tensor.t2 /= norm;
        tensor.t3 /= norm;
        Ok(tensor)
    }

    /// Epipoles `(e₂, e₃)` of the second and third view, unit-normalized.
    ///
    /// `e₂` spans the nullspace of the stacked left null vectors of the
    /// slices, `e₃` of the stacked right null vectors.
    pub fn epipoles(&self) -> Result<(Vec3, Vec3), TrifocalError> {
        let mut left = Mat3::zeros();
        let mut right = Mat3::zeros();
        for (i, t) in self.slices().into_iter().enumerate() {
            let svd = t.svd(true, true);
            let u = svd.u.ok_or(TrifocalError::SvdFailed)?;
            let v_t = svd.v_t.ok_or(TrifocalError::SvdFailed)?;
            left.set_row(i, &u.column(2).transpose());
            right.set_row(i, &v_t.row(2).into_owned());
        }

        let e2 = null_vector(&left)?;
        let e3 = null_vector(&right)?;
        Ok((e2, e3))
    }

    /// Extract camera matrices `(P2, P3)` sharing the projective frame of
    /// `P1 = [I | 0]`:
    ///
    /// `P2 = [[T₁e₃ T₂e₃ T₃e₃] | e₂]`,
    /// `P3 = [(e₃e₃ᵀ − I)[T₁ᵀe₂ T₂ᵀe₂ T₃ᵀe₂] | e₃]`.
    pub fn extract_cameras(&self) -> Result<(Mat34, Mat34), TrifocalError> {
        let (e2, e3) = self.epipoles()?;

        let [t1, t2, t3] = self.slices();
        let p2 = Mat34::from_columns(&[t1 * e3, t2 * e3, t3 * e3, e2]);

        let proj = e3 * e3.transpose() - Mat3::identity();
        let p3 = Mat34::from_columns(&[
            proj * (t1.transpose() * e2),
            proj * (t2.transpose() * e2),
            proj * (t3.transpose() * e2),
            e3,
        ]);

        if p2.iter().chain(p3.iter()).all(|v| v.is_finite()) {
            Ok((p2, p3))
        } else {
            Err(TrifocalError::DegenerateTensor)
        }
    }
}

fn null_vector(m: &Mat3) -> Result<Vec3, TrifocalError> {
    let svd = m.svd(false, true);
    let v_t = svd.v_t.ok_or(TrifocalError::SvdFailed)?;
    let v: Vector3<Real> = v_t.row(2).transpose();
    let n = v.norm();
    if n <= Real::EPSILON {
        return Err(TrifocalError::DegenerateTensor);
    }
    Ok(v / n)
}

/// Three mutually consistent projective cameras; the first is `[I | 0]` and
/// implied.
#[derive(Debug, Clone)]
pub struct TrifocalCameras {
    pub tensor: TrifocalTensor,
    pub p2: Mat34,
    pub p3: Mat34,
}

impl TrifocalCameras {
    /// Reprojection error of a pixel triple against these cameras: the
    /// track is DLT-triangulated and the maximum pixel deviation over the
    /// three views is returned. Untriangulable tracks score infinite.
    pub fn reprojection_error(&self, obs: &TripleObservation) -> Real {
        let pixels = [obs.p1, obs.p2, obs.p3];
        let cameras = [identity_camera(), self.p2, self.p3];
        let Some(x) = triangulate_nview(&pixels, &cameras) else {
            return Real::INFINITY;
        };

        let mut worst: Real = 0.0;
        for (pix, cam) in pixels.iter().zip(&cameras) {
            let Some(reproj) = psfm_core::project_camera(cam, &x) else {
                return Real::INFINITY;
            };
            worst = worst.max((reproj - pix).norm());
        }
        worst
    }
}

/// RANSAC estimator producing [`TrifocalCameras`] from pixel triples.
pub struct TrifocalEstimator;

impl TrifocalEstimator {
    fn fit_subset(data: &[TripleObservation], subset: &[usize]) -> Option<TrifocalCameras> {
        let sample: Vec<TripleObservation> = subset.iter().map(|&i| data[i]).collect();
        let tensor = TrifocalTensor::solve_linear(&sample).ok()?;
        let (p2, p3) = tensor.extract_cameras().ok()?;
        Some(TrifocalCameras { tensor, p2, p3 })
    }
}

impl Estimator for TrifocalEstimator {
    type Datum = TripleObservation;
    type Model = TrifocalCameras;

    const MIN_SAMPLES: usize = 7;

    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model> {
        Self::fit_subset(data, sample)
    }

    fn residual(model: &Self::Model, datum: &Self::Datum) -> Real {
        model.reprojection_error(datum)
    }

    fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
        Self::fit_subset(data, inliers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};
    use psfm_core::{project_camera, Vec4};

    fn pinhole(yaw: Real, center: Vector3<Real>) -> Mat34 {
        let k = Mat3::new(650.0, 0.0, 400.0, 0.0, 650.0, 300.0, 0.0, 0.0, 1.0);
        let r = *Rotation3::from_euler_angles(0.0, yaw, 0.0).matrix();
        let mut p = Mat34::zeros();
        p.fixed_view_mut::<3, 3>(0, 0).copy_from(&(k * r));
        p.set_column(3, &(k * (-(r * center))));
        p
    }

    fn world_points() -> Vec<Vec4> {
        let mut pts = Vec::new();
        for i in 0..4 {
            for j in 0..3 {
                let x = -0.6 + 0.4 * i as Real;
                let y = -0.4 + 0.4 * j as Real;
                let z = 2.0 + 0.3 * ((i * 3 + j) % 5) as Real;
                pts.push(Vec4::new(x, y, z, 1.0));
            }
        }
        pts
    }

    fn observe(cameras: &[Mat34; 3], points: &[Vec4]) -> Vec<TripleObservation> {
        points
            .iter()
            .map(|x| {
                TripleObservation::new(
                    project_camera(&cameras[0], x).unwrap(),
                    project_camera(&cameras[1], x).unwrap(),
                    project_camera(&cameras[2], x).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn extraction_is_consistent_with_from_cameras() {
        let p2 = pinhole(0.1, Vector3::new(-0.5, 0.05, 0.0));
        let p3 = pinhole(-0.07, Vector3::new(0.5, -0.05, 0.1));
        let tensor = TrifocalTensor::from_cameras(&p2, &p3);
        let (q2, q3) = tensor.extract_cameras().unwrap();

        // The extracted pair must reproduce the tensor up to scale.
        let back = TrifocalTensor::from_cameras(&q2, &q3);
        let scale = tensor.norm() / back.norm();
        let mut aligned = back.clone();
        aligned.t1 *= scale;
        aligned.t2 *= scale;
        aligned.t3 *= scale;
        // Fix sign by the largest entry of T1.
        if (aligned.t1 - tensor.t1).norm() > (aligned.t1 + tensor.t1).norm() {
            aligned.t1 = -aligned.t1;
            aligned.t2 = -aligned.t2;
            aligned.t3 = -aligned.t3;
        }
        let diff = (aligned.t1 - tensor.t1).norm()
            + (aligned.t2 - tensor.t2).norm()
            + (aligned.t3 - tensor.t3).norm();
        assert!(diff < 1e-9 * tensor.norm().max(1.0), "diff = {diff}");
    }

    #[test]
    fn incidence_relation_holds_for_true_tensor() {
        let p2 = pinhole(0.08, Vector3::new(-0.4, 0.0, 0.0));
        let p3 = pinhole(-0.06, Vector3::new(0.4, 0.1, 0.0));
        let tensor = TrifocalTensor::from_cameras(&p2, &p3);

        let p1 = identity_camera();
        for x in world_points() {
            let a = project_camera(&p1, &x).unwrap();
            let b = project_camera(&p2, &x).unwrap();
            let c = project_camera(&p3, &x).unwrap();

            let mut s = Mat3::zeros();
            let xa = to_homogeneous(&a);
            for (i, t) in tensor.slices().into_iter().enumerate() {
                s += t * xa[i];
            }
            let lb = skew(&to_homogeneous(&b));
            let lc = skew(&to_homogeneous(&c));
            let residual = lb * s * lc;
            let scale = lb.norm() * s.norm() * lc.norm();
            assert!(residual.norm() < 1e-10 * scale);
        }
    }

    #[test]
    fn linear_solve_recovers_reprojecting_cameras() {
        // Metric cameras with a non-identity first view: the solved tensor
        // lives in the projective frame where view one is [I | 0].
        let cameras = [
            pinhole(0.04, Vector3::new(-0.5, 0.0, 0.0)),
            pinhole(0.0, Vector3::new(0.0, 0.08, 0.0)),
            pinhole(-0.05, Vector3::new(0.5, 0.0, 0.05)),
        ];
        let obs = observe(&cameras, &world_points());

        let tensor = TrifocalTensor::solve_linear(&obs).unwrap();
        let (p2, p3) = tensor.extract_cameras().unwrap();
        let model = TrifocalCameras { tensor, p2, p3 };

        for o in &obs {
            assert!(model.reprojection_error(o) < 1e-6);
        }
    }

    #[test]
    fn too_few_points_is_an_error() {
        let cameras = [
            pinhole(0.0, Vector3::new(-0.3, 0.0, 0.0)),
            pinhole(0.02, Vector3::new(0.0, 0.0, 0.0)),
            pinhole(-0.02, Vector3::new(0.3, 0.0, 0.0)),
        ];
        let obs = observe(&cameras, &world_points()[..6]);
        assert!(matches!(
            TrifocalTensor::solve_linear(&obs),
            Err(TrifocalError::NotEnoughPoints(6))
        ));
    }
}
