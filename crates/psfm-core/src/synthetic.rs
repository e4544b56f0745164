//! Deterministic synthetic multi-view scenes.
//!
//! These generators build a random-but-seeded 3D point cloud, a ring of
//! pinhole cameras looking at it, and the pairwise graph / image database
//! pair the initializer consumes. Feature indices are permuted per view so
//! that no two views agree on feature numbering; tests that pass with
//! shuffling enabled exercise every index translation in the pipeline.

use crate::{
    ImageShape, InMemorySimilarImages, IndexPair, Mat3, Mat34, PairwiseGraph, Pt2, Real, Vec4,
};
use nalgebra::{Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Configuration of [`SyntheticScene::generate`].
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub num_views: usize,
    pub num_points: usize,
    pub shape: ImageShape,
    /// Standard deviation of Gaussian pixel noise; zero for exact projections.
    pub pixel_noise: Real,
    /// Permute feature indices independently in every view.
    pub shuffle_features: bool,
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            num_views: 3,
            num_points: 50,
            shape: ImageShape::new(800, 600),
            pixel_noise: 0.0,
            shuffle_features: true,
            seed: 7,
        }
    }
}

/// A generated scene: ground truth geometry plus the graph/database inputs
/// of the initializer. Graph view index `v` has id `view{v}`.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub db: InMemorySimilarImages,
    pub graph: PairwiseGraph,
    /// Ground-truth world-to-view cameras, one per view.
    pub cameras: Vec<Mat34>,
    /// Ground-truth world points with `w = 1`.
    pub points: Vec<Vec4>,
    /// `feature_of_point[v][p]` is the feature index of world point `p` in
    /// view `v` after per-view shuffling.
    pub feature_of_point: Vec<Vec<usize>>,
}

fn sample_gaussian(rng: &mut StdRng) -> Real {
    // Box-Muller transform; avoids pulling in a distributions crate.
    let u1: Real = rng.random::<Real>().max(1e-12);
    let u2: Real = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

impl SyntheticScene {
    /// Build the scene. Deterministic for a given configuration.
    ///
    /// Cameras sit on a short baseline arc at `z = 0` with a mild yaw toward
    /// the cloud center, points fill a box well in front of every camera, so
    /// all points project with positive depth in all views.
    pub fn generate(config: &SceneConfig) -> Self {
        assert!(config.num_views >= 2, "need at least two views");
        let mut rng = StdRng::seed_from_u64(config.seed);

        let points: Vec<Vec4> = (0..config.num_points)
            .map(|_| {
                Vec4::new(
                    rng.random::<Real>() * 2.0 - 1.0,
                    rng.random::<Real>() * 2.0 - 1.0,
                    2.0 + rng.random::<Real>() * 2.0,
                    1.0,
                )
            })
            .collect();

        let k = Mat3::new(
            700.0,
            0.0,
            config.shape.width as Real / 2.0,
            0.0,
            700.0,
            config.shape.height as Real / 2.0,
            0.0,
            0.0,
            1.0,
        );

        let mut cameras = Vec::with_capacity(config.num_views);
        for v in 0..config.num_views {
            let t = v as Real / (config.num_views - 1).max(1) as Real;
            let yaw = 0.22 * (t - 0.5);
            let center = Vector3::new(1.4 * (t - 0.5), 0.15 * (t - 0.5), 0.0);
            let r = Rotation3::from_euler_angles(0.0, yaw, 0.0);

            // P = K [R | -R C]
            let rot = *r.matrix();
            let trans = -(rot * center);
            let mut p = Mat34::zeros();
            p.fixed_view_mut::<3, 3>(0, 0).copy_from(&(k * rot));
            p.set_column(3, &(k * trans));
            cameras.push(p);
        }

        let mut db = InMemorySimilarImages::new();
        let mut graph = PairwiseGraph::new();
        let mut feature_of_point = Vec::with_capacity(config.num_views);

        for (v, camera) in cameras.iter().enumerate() {
            let mut pixels: Vec<Pt2> = points
                .iter()
                .map(|x| {
                    crate::project_camera(camera, x).expect("synthetic point behind a camera")
                })
                .collect();
            if config.pixel_noise > 0.0 {
                for p in &mut pixels {
                    p.x += config.pixel_noise * sample_gaussian(&mut rng);
                    p.y += config.pixel_noise * sample_gaussian(&mut rng);
                }
            }

            let mut perm: Vec<usize> = (0..config.num_points).collect();
            if config.shuffle_features {
                perm.shuffle(&mut rng);
            }

            // features[perm[p]] = pixels[p]
            let mut features = vec![Pt2::origin(); config.num_points];
            for (point, &feat) in perm.iter().enumerate() {
                features[feat] = pixels[point];
            }

            db.insert(format!("view{v}"), config.shape, features);
            graph.add_view(format!("view{v}"), config.num_points);
            feature_of_point.push(perm);
        }

        Self {
            db,
            graph,
            cameras,
            points,
            feature_of_point,
        }
    }

    /// Connect two views with a motion authored `a → b`, associating every
    /// world point's features. Returns the motion index.
    pub fn connect(&mut self, a: usize, b: usize) -> usize {
        self.connect_oriented(a, b, false)
    }

    /// Same association, but the motion is authored `b → a`. Lets tests
    /// exercise direction-aware readers on both edge orientations.
    pub fn connect_reversed(&mut self, a: usize, b: usize) -> usize {
        self.connect_oriented(a, b, true)
    }

    fn connect_oriented(&mut self, a: usize, b: usize, reversed: bool) -> usize {
        let pairs: Vec<IndexPair> = (0..self.points.len())
            .map(|p| {
                let fa = self.feature_of_point[a][p];
                let fb = self.feature_of_point[b][p];
                if reversed {
                    IndexPair::new(fb, fa)
                } else {
                    IndexPair::new(fa, fb)
                }
            })
            .collect();
        let (src, dst) = if reversed { (b, a) } else { (a, b) };
        self.graph
            .connect(src, dst, pairs)
            .expect("synthetic inliers are in range")
    }
}
