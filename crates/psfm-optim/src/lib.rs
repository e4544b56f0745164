//! Non-linear refinement for projective reconstructions.
//!
//! - [`problem`]: the dense NLLS problem trait and solver options.
//! - [`lm`]: a Levenberg-Marquardt backend for any [`NllsProblem`].
//! - [`bundle`]: projective bundle adjustment over camera matrices and
//!   homogeneous points with an analytic Jacobian.
//! - [`scale`]: the pixel/point scaling preconditioner applied around
//!   bundle adjustment for numerical conditioning.

pub mod bundle;
pub mod lm;
pub mod problem;
pub mod scale;

pub use bundle::*;
pub use lm::*;
pub use problem::*;
pub use scale::*;
