//! Initializer configuration.

use psfm_core::Real;
use serde::{Deserialize, Serialize};

/// Robust trifocal fit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RansacConfig {
    /// Iteration cap for the trifocal RANSAC.
    pub max_iterations: usize,
    /// Inlier threshold in pixels (maximum reprojection error of a track).
    pub inlier_threshold: Real,
    /// Minimum consensus size for the three-view model to be accepted.
    pub min_inliers: usize,
    /// Random seed; equal seeds give bit-identical reconstructions.
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            inlier_threshold: 1.0,
            min_inliers: 10,
            seed: 0xC0DE,
        }
    }
}

/// Bundle adjustment convergence criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergeConfig {
    pub ftol: Real,
    pub gtol: Real,
    pub max_iterations: usize,
}

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self {
            ftol: 1e-8,
            gtol: 1e-8,
            max_iterations: 200,
        }
    }
}

/// Full configuration of [`crate::ProjectiveInitializer`].
///
/// Changing the configuration of a live initializer requires calling
/// [`crate::ProjectiveInitializer::fixate`] afterwards to rebuild the
/// solvers from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectiveInitializerConfig {
    pub ransac: RansacConfig,
    pub converge: ConvergeConfig,
    /// Scale pixels and points before bundle adjustment for conditioning.
    pub scale_sba: bool,
}

impl Default for ProjectiveInitializerConfig {
    fn default() -> Self {
        Self {
            ransac: RansacConfig::default(),
            converge: ConvergeConfig::default(),
            scale_sba: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let cfg = ProjectiveInitializerConfig::default();
        assert_eq!(cfg.ransac.max_iterations, 500);
        assert_eq!(cfg.ransac.inlier_threshold, 1.0);
        assert_eq!(cfg.converge.max_iterations, 200);
        assert!(cfg.scale_sba);
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = ProjectiveInitializerConfig {
            scale_sba: false,
            ..ProjectiveInitializerConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let restored: ProjectiveInitializerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.ransac.seed, cfg.ransac.seed);
        assert!(!restored.scale_sba);
    }
}
