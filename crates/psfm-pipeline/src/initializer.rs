//! The projective reconstruction initializer.
//!
//! Index bookkeeping is the crux here. Four index spaces are in play:
//! raw per-view feature indices, positions in the trifocal inlier list,
//! seed-view feature indices, and reconstruction point indices. They are
//! bridged by dense tables with `-1` sentinels, kept as plain arrays on
//! purpose so they can be inspected directly:
//!
//! - `inlier_to_seed[i]`: seed feature of the `i`-th trifocal inlier,
//! - `seed_to_structure[f]`: point index of seed feature `f`, or `-1`.
//!
//! Point `i` of the structure is always the `i`-th trifocal inlier, so
//! `seed_to_structure[inlier_to_seed[i]] == i` for every inlier.
//!
//! View slots follow the caller's `seed_conn_idx` list: slot 0 is the seed,
//! slot `k ≥ 1` is the view reached by `seed_conn_idx[k - 1]`. The chosen
//! triplet therefore occupies slots `selected_triple[0] + 1` and
//! `selected_triple[1] + 1`, and both resection and the observation builder
//! use the same `motion position + 1` arithmetic.

use crate::{InitializeError, ProjectiveInitializerConfig};
use log::{debug, warn};
use psfm_core::{
    identity_camera, ransac, LookupSimilarImages, PairwiseGraph, PairwiseMotion,
    ProjectiveStructure, Pt2, RansacOptions, RansacResult, Real, SceneObservations, TripleMatch,
    TripleObservation, Vec4,
};
use psfm_linear::{resect_camera, triangulate_nview, TrifocalCameras, TrifocalEstimator};
use psfm_optim::{refine_projective, ScaleSceneStructure, SolveOptions};

/// Builds a projective reconstruction around a seed view.
///
/// All per-invocation state is reset at the start of
/// [`projective_scene`](Self::projective_scene); only the configuration and
/// the solver options materialized by [`fixate`](Self::fixate) survive
/// between calls.
pub struct ProjectiveInitializer {
    pub config: ProjectiveInitializerConfig,

    /// The reconstruction of the last successful run.
    pub structure: ProjectiveStructure,
    /// Scene scaler used around bundle adjustment.
    pub scaler: ScaleSceneStructure,
    /// Seed feature index of every trifocal inlier, in inlier order.
    pub inlier_to_seed: Vec<usize>,
    /// Point index for every seed feature; `-1` where the feature is not
    /// part of the reconstruction.
    pub seed_to_structure: Vec<i32>,
    /// Positions within `seed_conn_idx` of the two chosen triplet motions.
    pub selected_triple: [usize; 2],

    // Materialized by fixate().
    ransac_opts: RansacOptions,
    solve_opts: SolveOptions,

    // Per-invocation scratch, reused across calls.
    feats_seed: Vec<Pt2>,
    feats_b: Vec<Pt2>,
    feats_c: Vec<Pt2>,
    triple_matches: Vec<TripleMatch>,
    triple_obs: Vec<TripleObservation>,
    points3: Vec<Vec4>,
    assoc_pixel: Vec<Pt2>,
    assoc_filled: Vec<bool>,
}

impl Default for ProjectiveInitializer {
    fn default() -> Self {
        Self::new(ProjectiveInitializerConfig::default())
    }
}

impl ProjectiveInitializer {
    pub fn new(config: ProjectiveInitializerConfig) -> Self {
        let mut this = Self {
            config,
            structure: ProjectiveStructure::default(),
            scaler: ScaleSceneStructure::default(),
            inlier_to_seed: Vec::new(),
            seed_to_structure: Vec::new(),
            selected_triple: [0; 2],
            ransac_opts: RansacOptions::default(),
            solve_opts: SolveOptions::default(),
            feats_seed: Vec::new(),
            feats_b: Vec::new(),
            feats_c: Vec::new(),
            triple_matches: Vec::new(),
            triple_obs: Vec::new(),
            points3: Vec::new(),
            assoc_pixel: Vec::new(),
            assoc_filled: Vec::new(),
        };
        this.fixate();
        this
    }

    /// Rebuild solver options from [`Self::config`]. Must be called after
    /// any configuration change.
    pub fn fixate(&mut self) {
        self.ransac_opts = RansacOptions {
            max_iters: self.config.ransac.max_iterations,
            thresh: self.config.ransac.inlier_threshold,
            min_inliers: self.config.ransac.min_inliers,
            seed: self.config.ransac.seed,
            ..RansacOptions::default()
        };
        self.solve_opts = SolveOptions {
            ftol: self.config.converge.ftol,
            gtol: self.config.converge.gtol,
            max_iters: self.config.converge.max_iterations,
        };
    }

    /// Compute a projective reconstruction anchored at `seed`.
    ///
    /// `seed_conn_idx` lists positions into `graph.views[seed].connections`
    /// naming the motions to use; the views they reach become the scene's
    /// view slots `1..` in that order. Indices must be valid positions;
    /// that is a precondition, not a runtime condition.
    pub fn projective_scene(
        &mut self,
        db: &dyn LookupSimilarImages,
        graph: &PairwiseGraph,
        seed: usize,
        seed_conn_idx: &[usize],
    ) -> Result<(), InitializeError> {
        self.reset();

        if seed_conn_idx.len() == 1 {
            // Stereo needs dedicated two-view logic.
            return Err(InitializeError::StereoUnsupported);
        }

        let selected = self
            .select_initial_triplet(graph, seed, seed_conn_idx)
            .ok_or(InitializeError::NoValidTriplet)?;
        self.selected_triple = selected;
        debug!(
            "triplet selected: seed {seed}, motions {:?} of {:?}",
            selected, seed_conn_idx
        );

        let motion_b = seed_motion(graph, seed, seed_conn_idx[selected[0]]);
        let motion_c = seed_motion(graph, seed, seed_conn_idx[selected[1]]);
        let view_b = motion_b.other(seed);
        let view_c = motion_c.other(seed);

        self.find_triple_matches(graph, seed, motion_b, motion_c);
        if self.triple_matches.is_empty() {
            return Err(InitializeError::NoTripleMatches);
        }
        debug!("{} three-view tracks", self.triple_matches.len());

        self.lookup_triple_pixels(db, graph, seed, view_b, view_c)?;

        let result = ransac::<TrifocalEstimator>(&self.triple_obs, &self.ransac_opts);
        if !result.success {
            warn!(
                "trifocal fit found no consensus on {} tracks",
                self.triple_obs.len()
            );
            return Err(InitializeError::TrifocalFailed);
        }
        debug!(
            "trifocal fit: {} of {} inliers, rms {:.3} px",
            result.inliers.len(),
            self.triple_obs.len(),
            result.inlier_rms
        );

        self.build_structure(db, graph, seed, view_b, view_c, seed_conn_idx, &result)?;
        self.resect_remaining(db, graph, seed, seed_conn_idx)?;
        let observations = self.build_observations(db, graph, seed, seed_conn_idx)?;
        self.refine(observations)
    }

    fn reset(&mut self) {
        self.inlier_to_seed.clear();
        self.seed_to_structure.clear();
        self.selected_triple = [0; 2];
        self.triple_matches.clear();
        self.triple_obs.clear();
        self.points3.clear();
        self.assoc_pixel.clear();
        self.assoc_filled.clear();
    }

    /// Stage 1: exhaustively score every candidate pair `(i, j)` with
    /// `i < j` over `seed_conn_idx` and keep the best whose far views share
    /// a motion. Ties keep the first pair encountered.
    fn select_initial_triplet(
        &self,
        graph: &PairwiseGraph,
        seed: usize,
        seed_conn_idx: &[usize],
    ) -> Option<[usize; 2]> {
        let mut best_score = 0.0;
        let mut best = None;
        for i in 0..seed_conn_idx.len() {
            let motion_b = seed_motion(graph, seed, seed_conn_idx[i]);
            for j in i + 1..seed_conn_idx.len() {
                let motion_c = seed_motion(graph, seed, seed_conn_idx[j]);
                let score = score_triplet(graph, seed, motion_b, motion_c);
                if score > best_score {
                    best_score = score;
                    best = Some([i, j]);
                }
            }
        }
        best
    }

    /// Stage 2: intersect the inliers of the three motions into tracks
    /// `(a, b, c)` visible in all three views. Both authorship directions
    /// of the far edge are handled.
    fn find_triple_matches(
        &mut self,
        graph: &PairwiseGraph,
        seed: usize,
        motion_b: &PairwiseMotion,
        motion_c: &PairwiseMotion,
    ) {
        self.triple_matches.clear();

        let view_b = motion_b.other(seed);
        let view_c = motion_c.other(seed);
        let Some(bc) = graph.find_motion(view_b, view_c) else {
            return;
        };

        let b_to_seed = far_to_seed_table(motion_b, seed, graph.views[view_b].total_features);
        let c_to_seed = far_to_seed_table(motion_c, seed, graph.views[view_c].total_features);

        for (feat_b, feat_c) in graph.motions[bc].oriented_inliers(view_b) {
            let a = b_to_seed[feat_b];
            if a >= 0 && c_to_seed[feat_c] == a {
                self.triple_matches.push(TripleMatch {
                    a: a as usize,
                    b: feat_b,
                    c: feat_c,
                });
            }
        }
    }

    /// Promote the index triples to pixel triples, loading the three views'
    /// feature tables. The seed table stays loaded for later stages.
    fn lookup_triple_pixels(
        &mut self,
        db: &dyn LookupSimilarImages,
        graph: &PairwiseGraph,
        seed: usize,
        view_b: usize,
        view_c: usize,
    ) -> Result<(), InitializeError> {
        db.pixel_features(&graph.views[seed].id, &mut self.feats_seed)?;
        db.pixel_features(&graph.views[view_b].id, &mut self.feats_b)?;
        db.pixel_features(&graph.views[view_c].id, &mut self.feats_c)?;

        self.triple_obs.clear();
        self.triple_obs.reserve(self.triple_matches.len());
        for m in &self.triple_matches {
            self.triple_obs.push(TripleObservation::new(
                self.feats_seed[m.a],
                self.feats_b[m.b],
                self.feats_c[m.c],
            ));
        }
        Ok(())
    }

    /// Stage 4: size the structure, store the triplet cameras, triangulate
    /// every inlier and fill the two index tables.
    #[allow(clippy::too_many_arguments)]
    fn build_structure(
        &mut self,
        db: &dyn LookupSimilarImages,
        graph: &PairwiseGraph,
        seed: usize,
        view_b: usize,
        view_c: usize,
        seed_conn_idx: &[usize],
        result: &RansacResult<TrifocalCameras>,
    ) -> Result<(), InitializeError> {
        let Some(model) = result.model.as_ref() else {
            return Err(InitializeError::TrifocalFailed);
        };
        let inliers = &result.inliers;

        self.structure
            .initialize(seed_conn_idx.len() + 1, inliers.len());
        self.structure.set_view(
            0,
            true,
            identity_camera(),
            db.image_shape(&graph.views[seed].id)?,
        );
        self.structure.set_view(
            self.selected_triple[0] + 1,
            false,
            model.p2,
            db.image_shape(&graph.views[view_b].id)?,
        );
        self.structure.set_view(
            self.selected_triple[1] + 1,
            false,
            model.p3,
            db.image_shape(&graph.views[view_c].id)?,
        );

        let cameras = [identity_camera(), model.p2, model.p3];
        for (i, &input) in inliers.iter().enumerate() {
            let obs = &self.triple_obs[input];
            let x = triangulate_nview(&[obs.p1, obs.p2, obs.p3], &cameras)
                .ok_or(InitializeError::Triangulation { inlier: i })?;
            self.structure.points[i] = x;
        }

        self.seed_to_structure.clear();
        self.seed_to_structure
            .resize(graph.views[seed].total_features, -1);
        self.inlier_to_seed.clear();
        self.inlier_to_seed.reserve(inliers.len());
        for (i, &input) in inliers.iter().enumerate() {
            let feat = self.triple_matches[input].a;
            self.inlier_to_seed.push(feat);
            self.seed_to_structure[feat] = i as i32;
        }
        Ok(())
    }

    /// Stage 5: linear pose for every motion outside the chosen triplet,
    /// against the already triangulated points.
    fn resect_remaining(
        &mut self,
        db: &dyn LookupSimilarImages,
        graph: &PairwiseGraph,
        seed: usize,
        seed_conn_idx: &[usize],
    ) -> Result<(), InitializeError> {
        self.points3.clear();
        self.points3.extend_from_slice(&self.structure.points);

        for (motion_pos, &conn) in seed_conn_idx.iter().enumerate() {
            if motion_pos == self.selected_triple[0] || motion_pos == self.selected_triple[1] {
                continue;
            }
            let motion = seed_motion(graph, seed, conn);
            let view = motion.other(seed);
            db.pixel_features(&graph.views[view].id, &mut self.feats_b)?;

            // Gather this view's pixel for every reconstructed point. The
            // graph promised every trifocal inlier is visible here; holes
            // mean the upstream graph is inconsistent.
            self.assoc_pixel.clear();
            self.assoc_pixel.resize(self.points3.len(), Pt2::origin());
            self.assoc_filled.clear();
            self.assoc_filled.resize(self.points3.len(), false);
            let mut matched = 0;
            for (feat_seed, feat_view) in motion.oriented_inliers(seed) {
                let point = self.seed_to_structure[feat_seed];
                if point < 0 {
                    continue;
                }
                let point = point as usize;
                if !self.assoc_filled[point] {
                    self.assoc_filled[point] = true;
                    matched += 1;
                }
                self.assoc_pixel[point] = self.feats_b[feat_view];
            }
            if matched != self.points3.len() {
                warn!(
                    "motion {motion_pos}: only {matched} of {} points observed",
                    self.points3.len()
                );
                return Err(InitializeError::IncompleteObservations {
                    motion: motion_pos,
                    matched,
                    expected: self.points3.len(),
                });
            }

            let camera = match resect_camera(&self.points3, &self.assoc_pixel) {
                Ok(camera) => camera,
                Err(err) => {
                    warn!("pose estimation failed for motion {motion_pos}: {err}");
                    return Err(InitializeError::Resection { motion: motion_pos });
                }
            };
            self.structure.set_view(
                motion_pos + 1,
                false,
                camera,
                db.image_shape(&graph.views[view].id)?,
            );
        }
        Ok(())
    }

    /// Build the observation lists feeding bundle adjustment, one per view
    /// slot in `[seed, seed_conn_idx...]` order.
    fn build_observations(
        &mut self,
        db: &dyn LookupSimilarImages,
        graph: &PairwiseGraph,
        seed: usize,
        seed_conn_idx: &[usize],
    ) -> Result<SceneObservations, InitializeError> {
        let mut observations = SceneObservations::default();
        observations.initialize(seed_conn_idx.len() + 1);

        // The seed view observes point i at the pixel of its i-th inlier.
        for (i, &feat) in self.inlier_to_seed.iter().enumerate() {
            let point = self.seed_to_structure[feat];
            debug_assert_eq!(point, i as i32);
            observations.views[0].add(point as usize, self.feats_seed[feat]);
        }

        for (motion_pos, &conn) in seed_conn_idx.iter().enumerate() {
            let motion = seed_motion(graph, seed, conn);
            let view = motion.other(seed);
            db.pixel_features(&graph.views[view].id, &mut self.feats_b)?;

            let slot = &mut observations.views[motion_pos + 1];
            for (feat_seed, feat_view) in motion.oriented_inliers(seed) {
                let point = self.seed_to_structure[feat_seed];
                if point < 0 {
                    continue;
                }
                slot.add(point as usize, self.feats_b[feat_view]);
            }
        }
        Ok(observations)
    }

    /// Stage 6: scale, bundle-adjust, unscale.
    fn refine(&mut self, mut observations: SceneObservations) -> Result<(), InitializeError> {
        if self.config.scale_sba {
            self.scaler
                .apply(&mut self.structure, &mut observations)?;
        }

        let report = match refine_projective(&mut self.structure, &observations, &self.solve_opts)
        {
            Ok(report) => report,
            Err(err) => {
                warn!("bundle adjustment setup failed: {err}");
                return Err(InitializeError::BundleAdjustment);
            }
        };
        debug!(
            "bundle adjustment: {} iterations, cost {:.3e}, converged {}",
            report.iterations, report.final_cost, report.converged
        );

        if self.config.scale_sba {
            for (view, scale) in self
                .structure
                .views
                .iter_mut()
                .zip(&self.scaler.pixel_scaling)
            {
                view.camera = scale.remove(&view.camera);
            }
            self.scaler.undo(&mut self.structure, &mut observations)?;
            // The seed camera is the identity by definition; reassert it to
            // drop the scaling round-off.
            self.structure.views[0].camera = identity_camera();
        }

        if report.converged {
            Ok(())
        } else {
            warn!("bundle adjustment did not converge");
            Err(InitializeError::BundleAdjustment)
        }
    }
}

fn seed_motion<'g>(graph: &'g PairwiseGraph, seed: usize, conn: usize) -> &'g PairwiseMotion {
    &graph.motions[graph.views[seed].connections[conn]]
}

/// Triplet quality: the summed scores of its three motions, or zero when
/// the far views do not share a motion.
fn score_triplet(
    graph: &PairwiseGraph,
    seed: usize,
    motion_b: &PairwiseMotion,
    motion_c: &PairwiseMotion,
) -> Real {
    let view_b = motion_b.other(seed);
    let view_c = motion_c.other(seed);
    let Some(bc) = graph.find_motion(view_b, view_c) else {
        return 0.0;
    };
    motion_b.score + motion_c.score + graph.motions[bc].score
}

/// Dense lookup from far-view feature index to seed feature index, `-1`
/// where the motion has no correspondence.
fn far_to_seed_table(motion: &PairwiseMotion, seed: usize, far_total: usize) -> Vec<i32> {
    let mut table = vec![-1; far_total];
    for (feat_seed, feat_far) in motion.oriented_inliers(seed) {
        table[feat_far] = feat_seed as i32;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use psfm_core::IndexPair;

    /// A, B, C with three consistent tracks; `eAC` and `eBC` are authored
    /// by the far view to exercise direction handling.
    fn triplet_graph() -> (PairwiseGraph, usize) {
        let mut g = PairwiseGraph::new();
        let a = g.add_view("a", 3);
        let b = g.add_view("b", 3);
        let c = g.add_view("c", 4);

        // Tracks: (a0, b1, c2), (a1, b2, c0), (a2, b0, c1).
        g.connect(
            a,
            b,
            vec![
                IndexPair::new(0, 1),
                IndexPair::new(1, 2),
                IndexPair::new(2, 0),
            ],
        )
        .unwrap();
        g.connect(
            c,
            a,
            vec![
                IndexPair::new(2, 0),
                IndexPair::new(0, 1),
                IndexPair::new(1, 2),
            ],
        )
        .unwrap();
        g.connect(
            c,
            b,
            vec![
                IndexPair::new(2, 1),
                IndexPair::new(0, 2),
                IndexPair::new(1, 0),
                // Unmatched far feature, must be dropped.
                IndexPair::new(3, 0),
            ],
        )
        .unwrap();
        (g, a)
    }

    #[test]
    fn triple_matches_handle_reversed_edges() {
        let (graph, seed) = triplet_graph();
        let mut init = ProjectiveInitializer::default();

        let motion_b = seed_motion(&graph, seed, 0);
        let motion_c = seed_motion(&graph, seed, 1);
        init.find_triple_matches(&graph, seed, motion_b, motion_c);

        let mut found = init.triple_matches.clone();
        found.sort_by_key(|m| m.a);
        assert_eq!(
            found,
            vec![
                TripleMatch { a: 0, b: 1, c: 2 },
                TripleMatch { a: 1, b: 2, c: 0 },
                TripleMatch { a: 2, b: 0, c: 1 },
            ]
        );
    }

    #[test]
    fn inconsistent_paths_are_dropped() {
        let (mut graph, seed) = triplet_graph();
        // Corrupt one eBC inlier so the B and C paths land on different
        // seed features.
        let bc = graph.find_motion(1, 2).unwrap();
        graph.motions[bc].inliers[0] = IndexPair::new(0, 1);

        let mut init = ProjectiveInitializer::default();
        let motion_b = seed_motion(&graph, seed, 0);
        let motion_c = seed_motion(&graph, seed, 1);
        init.find_triple_matches(&graph, seed, motion_b, motion_c);
        assert_eq!(init.triple_matches.len(), 2);
    }

    #[test]
    fn triplet_selection_requires_far_edge() {
        let mut g = PairwiseGraph::new();
        let a = g.add_view("a", 2);
        let b = g.add_view("b", 2);
        let c = g.add_view("c", 2);
        let d = g.add_view("d", 2);
        g.connect(a, b, vec![IndexPair::new(0, 0)]).unwrap();
        g.connect(a, c, vec![IndexPair::new(0, 0)]).unwrap();
        g.connect(a, d, vec![IndexPair::new(1, 1)]).unwrap();
        g.connect(b, c, vec![IndexPair::new(0, 0)]).unwrap();

        let init = ProjectiveInitializer::default();
        // Candidates in connection order: b, c, d. Only (b, c) closes.
        let selected = init.select_initial_triplet(&g, a, &[0, 1, 2]).unwrap();
        assert_eq!(selected, [0, 1]);

        // Without the closing edge no triplet exists.
        let mut g2 = PairwiseGraph::new();
        let a2 = g2.add_view("a", 2);
        let b2 = g2.add_view("b", 2);
        let c2 = g2.add_view("c", 2);
        g2.connect(a2, b2, vec![IndexPair::new(0, 0)]).unwrap();
        g2.connect(a2, c2, vec![IndexPair::new(0, 0)]).unwrap();
        assert!(init.select_initial_triplet(&g2, a2, &[0, 1]).is_none());
    }

    #[test]
    fn triplet_selection_prefers_higher_scores() {
        let mut g = PairwiseGraph::new();
        let a = g.add_view("a", 4);
        let b = g.add_view("b", 4);
        let c = g.add_view("c", 4);
        let d = g.add_view("d", 4);
        for (x, y) in [(a, b), (a, c), (a, d), (b, c), (c, d)] {
            g.connect(x, y, vec![IndexPair::new(0, 0)]).unwrap();
        }
        // Both (b, c) and (c, d) close; tilt the scores toward (c, d).
        let cd = g.find_motion(c, d).unwrap();
        g.motions[cd].score = 10.0;

        let init = ProjectiveInitializer::default();
        let selected = init.select_initial_triplet(&g, a, &[0, 1, 2]).unwrap();
        assert_eq!(selected, [1, 2]);
    }
}
