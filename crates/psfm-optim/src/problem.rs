//! Dense non-linear least-squares problem abstraction.

use nalgebra::{DMatrix, DVector};
use psfm_core::Real;
use serde::{Deserialize, Serialize};

/// A dense NLLS problem with analytic Jacobian.
pub trait NllsProblem {
    /// Residual vector at the given parameters.
    fn residuals(&self, x: &DVector<Real>) -> DVector<Real>;
    /// Jacobian of the residuals at the given parameters.
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real>;
}

/// Convergence thresholds for the solver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolveOptions {
    /// Relative reduction of the cost function.
    pub ftol: Real,
    /// Norm of the cost gradient.
    pub gtol: Real,
    /// Maximum number of iterations.
    pub max_iters: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            ftol: 1e-8,
            gtol: 1e-8,
            max_iters: 200,
        }
    }
}

/// Outcome of a solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveReport {
    pub iterations: usize,
    /// Final cost `0.5 · ‖r‖²`.
    pub final_cost: Real,
    pub converged: bool,
}
