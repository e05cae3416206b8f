use kornia_3d::pointcloud::PointCloudError;

/// Error type for the ICP registration engine.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum IcpError {
    /// A point set required to be non-empty has no points.
    #[error("The {0} point cloud is empty")]
    EmptyPointCloud(&'static str),

    /// The two operands of a paired operation have a different number of points.
    #[error("Point sets must have the same number of points, got {0} and {1}")]
    MismatchedLengths(usize, usize),

    /// The input buffer is not an N×3 matrix.
    #[error("Invalid pointcloud shape")]
    InvalidShape(#[from] PointCloudError),

    /// A correspondence index does not address a destination point.
    #[error("Correspondence index {index} out of range for {len} destination points")]
    CorrespondenceOutOfRange {
        /// The offending index.
        index: usize,
        /// The number of destination points.
        len: usize,
    },

    /// The convergence criteria are unusable.
    #[error("Invalid convergence criteria: {0}")]
    InvalidCriteria(String),

    /// The accelerator failed to run the nearest neighbor kernel.
    #[error("Accelerator error: {0}")]
    Accelerator(String),
}
