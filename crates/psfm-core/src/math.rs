//! Mathematical type definitions and small projective helpers.

use nalgebra::{Matrix3, Matrix3x4, Point2, Vector2, Vector3, Vector4};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// Homogeneous 3D point `(X, Y, Z, W)`, defined up to scale.
pub type Vec4 = Vector4<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 3×4 projective camera matrix.
pub type Mat34 = Matrix3x4<Real>;

/// The identity camera `[I | 0]` that anchors a projective frame.
pub fn identity_camera() -> Mat34 {
    let mut p = Mat34::zeros();
    p.fixed_view_mut::<3, 3>(0, 0).copy_from(&Mat3::identity());
    p
}

/// Convert a 2D point into homogeneous coordinates `(x, y, 1)`.
pub fn to_homogeneous(p: &Pt2) -> Vec3 {
    Vec3::new(p.x, p.y, 1.0)
}

/// Project a homogeneous 3D point through a camera matrix.
///
/// Returns `None` when the projected depth vanishes, i.e. the point lies on
/// the camera's principal plane and has no finite pixel image.
pub fn project_camera(p: &Mat34, x: &Vec4) -> Option<Pt2> {
    let y = p * x;
    let n = y.norm();
    if n <= Real::EPSILON || y.z.abs() <= 1e-12 * n {
        return None;
    }
    Some(Pt2::new(y.x / y.z, y.y / y.z))
}

/// Skew-symmetric cross-product matrix `[v]_×` such that `[v]_× w = v × w`.
pub fn skew(v: &Vec3) -> Mat3 {
    Mat3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}
