//! Levenberg-Marquardt backend for [`NllsProblem`] instances.

use crate::{NllsProblem, SolveOptions, SolveReport};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use psfm_core::Real;

struct Adapter<'a, P: NllsProblem> {
    problem: &'a P,
    x: DVector<Real>,
}

impl<P: NllsProblem> LeastSquaresProblem<Real, Dyn, Dyn> for Adapter<'_, P> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.x.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.x.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        Some(self.problem.residuals(&self.x))
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        Some(self.problem.jacobian(&self.x))
    }
}

/// Dense Levenberg-Marquardt solver.
#[derive(Debug, Default, Clone, Copy)]
pub struct LmBackend;

impl LmBackend {
    /// Minimize `problem` starting from `x0`. Returns the final parameters
    /// and a report; `converged` reflects the solver's own termination
    /// verdict, so hitting the iteration cap counts as failure.
    pub fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        let solver = LevenbergMarquardt::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.ftol)
            .with_gtol(opts.gtol)
            .with_patience(opts.max_iters.max(1));

        let (adapter, report) = solver.minimize(Adapter {
            problem,
            x: x0,
        });

        (
            adapter.x,
            SolveReport {
                iterations: report.number_of_evaluations,
                final_cost: report.objective_function,
                converged: report.termination.was_successful(),
            },
        )
    }
}
