//! Generic, model-agnostic random sample consensus.
//!
//! Implement [`Estimator`] for a model and call [`ransac`] on a slice of
//! data. The engine never panics: with insufficient data or no consensus it
//! returns a [`RansacResult`] with `success == false`.

use crate::Real;
use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Configuration of the RANSAC engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RansacOptions {
    /// Hard cap on the number of iterations.
    pub max_iters: usize,
    /// Inlier residual threshold, in the units of [`Estimator::residual`].
    pub thresh: Real,
    /// Minimum consensus size for a model to be accepted.
    pub min_inliers: usize,
    /// Confidence level in `[0, 1]` driving the adaptive iteration bound.
    pub confidence: Real,
    /// Seed for the internal random number generator; equal seeds give
    /// bit-identical runs.
    pub seed: u64,
    /// Refit the model on its full consensus set before final scoring.
    pub refit: bool,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            thresh: 2.0,
            min_inliers: 8,
            confidence: 0.99,
            seed: 0xC0DE,
            refit: true,
        }
    }
}

/// Outcome of a [`ransac`] run.
///
/// `inliers` holds indices into the input slice, in input order restricted
/// to the consensus set; callers use them to map consensus positions back to
/// the original data.
#[derive(Debug, Clone)]
pub struct RansacResult<M> {
    pub success: bool,
    pub model: Option<M>,
    pub inliers: Vec<usize>,
    /// Root-mean-square residual over the consensus set.
    pub inlier_rms: Real,
    /// Iterations actually performed.
    pub iters: usize,
}

impl<M> Default for RansacResult<M> {
    fn default() -> Self {
        Self {
            success: false,
            model: None,
            inliers: Vec::new(),
            inlier_rms: Real::INFINITY,
            iters: 0,
        }
    }
}

/// A model estimator usable inside [`ransac`].
pub trait Estimator {
    type Datum;
    type Model;

    /// Minimal number of samples needed to fit a model.
    const MIN_SAMPLES: usize;

    /// Fit a model from the data at `sample`. `None` if the subset is
    /// degenerate or fitting fails.
    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual of one datum against a model, in the same units
    /// as [`RansacOptions::thresh`].
    fn residual(model: &Self::Model, datum: &Self::Datum) -> Real;

    /// Refit on a full consensus set. The default keeps the sampled model.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

/// Standard stopping criterion: iterations needed to draw one all-inlier
/// sample with probability `confidence`, given the observed inlier ratio.
fn adaptive_iterations(
    confidence: Real,
    inlier_ratio: Real,
    min_samples: usize,
    done: usize,
    max_iters: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }
    let miss = (1.0 - inlier_ratio.powi(min_samples as i32)).max(1e-12).ln();
    if miss >= 0.0 {
        return max_iters;
    }
    let needed = ((1.0 - confidence).ln() / miss).ceil() as usize;
    needed.clamp(done, max_iters)
}

fn consensus<E: Estimator>(
    model: &E::Model,
    data: &[E::Datum],
    thresh: Real,
    inliers: &mut Vec<usize>,
) -> Real {
    inliers.clear();
    let mut sum_sq = 0.0;
    for (i, datum) in data.iter().enumerate() {
        let r = E::residual(model, datum);
        if r <= thresh {
            inliers.push(i);
            sum_sq += r * r;
        }
    }
    if inliers.is_empty() {
        Real::INFINITY
    } else {
        (sum_sq / inliers.len() as Real).sqrt()
    }
}

/// Run RANSAC for the given [`Estimator`].
pub fn ransac<E: Estimator>(data: &[E::Datum], opts: &RansacOptions) -> RansacResult<E::Model> {
    let mut best = RansacResult::default();
    if data.len() < E::MIN_SAMPLES {
        return best;
    }

    let all: Vec<usize> = (0..data.len()).collect();
    let mut sample = vec![0usize; E::MIN_SAMPLES];
    let mut inliers = Vec::with_capacity(data.len());
    let mut rng = StdRng::seed_from_u64(opts.seed);

    let mut bound = opts.max_iters;
    let mut iter = 0;
    while iter < bound {
        iter += 1;

        for (k, &idx) in all
            .as_slice()
            .choose_multiple(&mut rng, E::MIN_SAMPLES)
            .enumerate()
        {
            sample[k] = idx;
        }

        let Some(mut model) = E::fit(data, &sample) else {
            continue;
        };
        let mut rms = consensus::<E>(&model, data, opts.thresh, &mut inliers);
        if inliers.len() < opts.min_inliers {
            continue;
        }

        if opts.refit {
            if let Some(refined) = E::refit(data, &inliers) {
                let refined_rms = consensus::<E>(&refined, data, opts.thresh, &mut inliers);
                if inliers.len() < opts.min_inliers {
                    continue;
                }
                model = refined;
                rms = refined_rms;
            }
        }

        let better = !best.success
            || inliers.len() > best.inliers.len()
            || (inliers.len() == best.inliers.len() && rms < best.inlier_rms);
        if better {
            best.success = true;
            best.model = Some(model);
            best.inliers.clear();
            best.inliers.extend_from_slice(&inliers);
            best.inlier_rms = rms;
            best.iters = iter;
        }

        let ratio = best.inliers.len() as Real / data.len() as Real;
        bound = adaptive_iterations(opts.confidence, ratio, E::MIN_SAMPLES, iter, opts.max_iters);
    }

    best
}
