use crate::linalg::{det33, matmul33, matvec33, transform_points, transpose33};

/// Error type for 3D transform construction.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TransformError {
    /// The rotation axis has (almost) zero length.
    #[error("cannot compute rotation matrix from a zero vector")]
    ZeroAxis,

    /// The last row of a homogeneous matrix is not `[0, 0, 0, 1]`.
    #[error("homogeneous matrix last row must be [0, 0, 0, 1], got {0:?}")]
    InvalidHomogeneousRow([f64; 4]),
}

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation. It does not need to be normalized.
/// * `angle` - The angle of rotation in radians.
///
/// # Returns
///
/// The rotation matrix.
///
/// Example:
///
/// ```
/// use kornia_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let rotation = axis_angle_to_rotation_matrix(&[0.0, 0.0, 2.0], 0.0).unwrap();
/// assert_eq!(rotation, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], TransformError> {
    let magnitude = (axis[0].powi(2) + axis[1].powi(2) + axis[2].powi(2)).sqrt();
    if magnitude < 1e-10 {
        return Err(TransformError::ZeroAxis);
    }
    let [x, y, z] = axis.map(|v| v / magnitude);

    let (s, c) = angle.sin_cos();
    let t = 1.0 - c;

    // Rodrigues formula, R = cI + s[k]x + t kk^T
    Ok([
        [c + x * x * t, x * y * t - z * s, x * z * t + y * s],
        [x * y * t + z * s, c + y * y * t, y * z * t - x * s],
        [x * z * t - y * s, y * z * t + x * s, c + z * z * t],
    ])
}

/// A rigid transformation: a proper rotation followed by a translation.
///
/// Maps a point `p` to `R * p + t`. The homogeneous form is the 4x4 matrix with `R`
/// as its top-left block, `t` as its top-right column and `[0, 0, 0, 1]` as last row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Rotation matrix, row-major.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        translation: [0.0, 0.0, 0.0],
    };

    /// Create a transform from a rotation matrix and a translation vector.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Create a pure translation.
    pub fn from_translation(translation: [f64; 3]) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Get the 4x4 homogeneous matrix of the transform.
    pub fn to_homogeneous(&self) -> [[f64; 4]; 4] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            [r[0][0], r[0][1], r[0][2], t[0]],
            [r[1][0], r[1][1], r[1][2], t[1]],
            [r[2][0], r[2][1], r[2][2], t[2]],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// Create a transform from a 4x4 homogeneous matrix.
    ///
    /// The rotation block is taken as is; only the last row is validated.
    pub fn from_homogeneous(m: &[[f64; 4]; 4]) -> Result<Self, TransformError> {
        if m[3] != [0.0, 0.0, 0.0, 1.0] {
            return Err(TransformError::InvalidHomogeneousRow(m[3]));
        }
        Ok(Self {
            rotation: [
                [m[0][0], m[0][1], m[0][2]],
                [m[1][0], m[1][1], m[1][2]],
                [m[2][0], m[2][1], m[2][2]],
            ],
            translation: [m[0][3], m[1][3], m[2][3]],
        })
    }

    /// Determinant of the rotation block. A proper rotation has determinant +1.
    pub fn rotation_determinant(&self) -> f64 {
        det33(&self.rotation)
    }

    /// Apply the transform to a single point.
    pub fn transform_point(&self, point: &[f64; 3]) -> [f64; 3] {
        let p = matvec33(&self.rotation, point);
        [
            p[0] + self.translation[0],
            p[1] + self.translation[1],
            p[2] + self.translation[2],
        ]
    }

    /// Apply the transform to a set of points.
    pub fn transform_points(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        transform_points(points, &self.rotation, &self.translation)
    }

    /// Compose two transforms: the result applies `other` first, then `self`.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        let t = self.transform_point(&other.translation);
        RigidTransform::new(matmul33(&self.rotation, &other.rotation), t)
    }

    /// Get the inverse transform, `R^T * (p - t)`.
    pub fn inverse(&self) -> RigidTransform {
        let rotation = transpose33(&self.rotation);
        let t = matvec33(&rotation, &self.translation);
        RigidTransform::new(rotation, [-t[0], -t[1], -t[2]])
    }
}
