//! Failure taxonomy of the initializer.

use thiserror::Error;

/// Why a reconstruction attempt failed. Every variant is recoverable by the
/// caller (typically by retrying with a different seed or neighborhood),
/// with the caveat that after [`BundleAdjustment`](Self::BundleAdjustment)
/// the partially refined structure is left in place but should be treated
/// as untrusted.
#[derive(Debug, Error)]
pub enum InitializeError {
    /// Two-view initialization needs dedicated logic that does not exist
    /// here; a single seed connection is rejected up front.
    #[error("stereo initialization from a single motion is not supported")]
    StereoUnsupported,
    /// No candidate pair of seed neighbors shares a third motion.
    #[error("no connected view pair forms a triplet with the seed")]
    NoValidTriplet,
    /// The chosen triplet has no feature tracks crossing all three views.
    #[error("no feature tracks cross the selected triplet")]
    NoTripleMatches,
    /// The robust trifocal fit found no model with enough inliers.
    #[error("robust trifocal estimation failed")]
    TrifocalFailed,
    /// A trifocal inlier could not be triangulated (degenerate track).
    #[error("triangulation failed for inlier {inlier}")]
    Triangulation { inlier: usize },
    /// Linear pose estimation failed for a remaining view.
    #[error("camera resection failed for motion {motion}")]
    Resection { motion: usize },
    /// A remaining view does not observe every reconstructed point; the
    /// upstream graph is inconsistent.
    #[error("view of motion {motion} observes {matched} of {expected} reconstructed points")]
    IncompleteObservations {
        motion: usize,
        matched: usize,
        expected: usize,
    },
    /// Projective bundle adjustment did not converge.
    #[error("projective bundle adjustment did not converge")]
    BundleAdjustment,
    /// The feature database rejected a lookup.
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}
