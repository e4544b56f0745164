//! Projective bundle adjustment.
//!
//! Parameters are the 12 entries of every non-fixed camera matrix followed
//! by the 4 homogeneous components of every point; residuals are pixel
//! reprojection errors in observation order. Both cameras and points carry
//! a redundant projective scale, which the damped normal equations absorb,
//! so no gauge constraints are imposed beyond the fixed seed view.

use crate::{LmBackend, NllsProblem, SolveOptions, SolveReport};
use anyhow::{ensure, Result};
use nalgebra::{DMatrix, DVector};
use psfm_core::{Mat34, ProjectiveStructure, Pt2, Real, SceneObservations, Vec4};

const CAMERA_DOF: usize = 12;
const POINT_DOF: usize = 4;

/// Depth guard: observations whose projected depth magnitude falls below
/// this are held at a large constant residual with zero gradient.
const MIN_DEPTH: Real = 1e-12;
const GUARD_RESIDUAL: Real = 1e6;

struct BundleProblem {
    /// For each view slot, the parameter offset of its camera, or `None`
    /// with the frozen matrix for fixed views.
    cameras: Vec<CameraSlot>,
    /// Flattened `(view, point, pixel)` records in observation order.
    records: Vec<(usize, usize, Pt2)>,
    point_base: usize,
    num_params: usize,
}

enum CameraSlot {
    Free { offset: usize },
    Fixed { camera: Mat34 },
}

impl BundleProblem {
    fn camera_at(&self, x: &DVector<Real>, view: usize) -> Mat34 {
        match self.cameras[view] {
            CameraSlot::Fixed { camera } => camera,
            CameraSlot::Free { offset } => unpack_camera(x, offset),
        }
    }

    fn point_at(&self, x: &DVector<Real>, point: usize) -> Vec4 {
        let o = self.point_base + POINT_DOF * point;
        Vec4::new(x[o], x[o + 1], x[o + 2], x[o + 3])
    }
}

fn unpack_camera(x: &DVector<Real>, offset: usize) -> Mat34 {
    let mut p = Mat34::zeros();
    for r in 0..3 {
        for c in 0..4 {
            p[(r, c)] = x[offset + 4 * r + c];
        }
    }
    p
}

fn pack_camera(x: &mut DVector<Real>, offset: usize, p: &Mat34) {
    for r in 0..3 {
        for c in 0..4 {
            x[offset + 4 * r + c] = p[(r, c)];
        }
    }
}

impl NllsProblem for BundleProblem {
    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let mut r = DVector::zeros(2 * self.records.len());
        let mut cam = Mat34::zeros();
        let mut cam_view = usize::MAX;
        for (i, &(view, point, pixel)) in self.records.iter().enumerate() {
            if view != cam_view {
                cam = self.camera_at(x, view);
                cam_view = view;
            }
            let y = cam * self.point_at(x, point);
            if y.z.abs() < MIN_DEPTH {
                r[2 * i] = GUARD_RESIDUAL;
                r[2 * i + 1] = GUARD_RESIDUAL;
                continue;
            }
            r[2 * i] = pixel.x - y.x / y.z;
            r[2 * i + 1] = pixel.y - y.y / y.z;
        }
        r
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let mut jac = DMatrix::zeros(2 * self.records.len(), self.num_params);
        let mut cam = Mat34::zeros();
        let mut cam_view = usize::MAX;
        for (i, &(view, point, _)) in self.records.iter().enumerate() {
            if view != cam_view {
                cam = self.camera_at(x, view);
                cam_view = view;
            }
            let xw = self.point_at(x, point);
            let y = cam * xw;
            if y.z.abs() < MIN_DEPTH {
                continue;
            }
            let inv_z = 1.0 / y.z;
            let u_z = y.x * inv_z * inv_z;
            let v_z = y.y * inv_z * inv_z;
            let (ru, rv) = (2 * i, 2 * i + 1);

            if let CameraSlot::Free { offset } = self.cameras[view] {
                // d r_u / d P[0,c] = -X_c/z ; d r_u / d P[2,c] = u·X_c/z²
                for c in 0..4 {
                    jac[(ru, offset + c)] = -xw[c] * inv_z;
                    jac[(ru, offset + 8 + c)] = xw[c] * u_z;
                    jac[(rv, offset + 4 + c)] = -xw[c] * inv_z;
                    jac[(rv, offset + 8 + c)] = xw[c] * v_z;
                }
            }

            let po = self.point_base + POINT_DOF * point;
            for c in 0..4 {
                jac[(ru, po + c)] = -cam[(0, c)] * inv_z + cam[(2, c)] * u_z;
                jac[(rv, po + c)] = -cam[(1, c)] * inv_z + cam[(2, c)] * v_z;
            }
        }
        jac
    }
}

fn build_problem(
    structure: &ProjectiveStructure,
    observations: &SceneObservations,
) -> Result<BundleProblem> {
    ensure!(
        structure.views.len() == observations.views.len(),
        "structure has {} views but observations have {}",
        structure.views.len(),
        observations.views.len()
    );
    ensure!(
        structure.views.iter().any(|v| !v.fixed),
        "no free cameras to optimize"
    );

    let mut cameras = Vec::with_capacity(structure.views.len());
    let mut offset = 0;
    for view in &structure.views {
        if view.fixed {
            cameras.push(CameraSlot::Fixed {
                camera: view.camera,
            });
        } else {
            cameras.push(CameraSlot::Free { offset });
            offset += CAMERA_DOF;
        }
    }
    let point_base = offset;
    let num_params = point_base + POINT_DOF * structure.points.len();

    let mut records = Vec::with_capacity(observations.total());
    for (view, obs) in observations.views.iter().enumerate() {
        for (&point, &pixel) in obs.point.iter().zip(&obs.pixel) {
            ensure!(
                point < structure.points.len(),
                "observation references point {} of {}",
                point,
                structure.points.len()
            );
            records.push((view, point, pixel));
        }
    }
    ensure!(
        2 * records.len() >= num_params,
        "underdetermined bundle: {} residuals for {} parameters",
        2 * records.len(),
        num_params
    );

    Ok(BundleProblem {
        cameras,
        records,
        point_base,
        num_params,
    })
}

/// Refine all non-fixed cameras and every point of `structure` against the
/// observations. On return `structure` holds the refined values; whether
/// the solver actually converged is reported, not an error.
pub fn refine_projective(
    structure: &mut ProjectiveStructure,
    observations: &SceneObservations,
    opts: &SolveOptions,
) -> Result<SolveReport> {
    let problem = build_problem(structure, observations)?;

    let mut x0 = DVector::zeros(problem.num_params);
    for (view, slot) in structure.views.iter().zip(&problem.cameras) {
        if let CameraSlot::Free { offset } = *slot {
            pack_camera(&mut x0, offset, &view.camera);
        }
    }
    for (i, p) in structure.points.iter().enumerate() {
        let o = problem.point_base + POINT_DOF * i;
        for c in 0..4 {
            x0[o + c] = p[c];
        }
    }

    let (x, report) = LmBackend.solve(&problem, x0, opts);

    for (view, slot) in structure.views.iter_mut().zip(&problem.cameras) {
        if let CameraSlot::Free { offset } = *slot {
            view.camera = unpack_camera(&x, offset);
        }
    }
    for (i, p) in structure.points.iter_mut().enumerate() {
        let o = problem.point_base + POINT_DOF * i;
        *p = Vec4::new(x[o], x[o + 1], x[o + 2], x[o + 3]);
    }

    Ok(report)
}
