/// Error type for point cloud construction.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PointCloudError {
    /// The flat buffer does not describe an N×3 matrix.
    #[error("Invalid pointcloud shape: {0} values cannot be split into xyz rows")]
    InvalidShape(usize),
}

/// An ordered set of 3D points.
///
/// The order of the points is significant: it defines the index of every point and
/// therefore the correspondence with any structure derived from the cloud.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud, one xyz row per point.
    points: Vec<[f64; 3]>,
}

impl PointCloud {
    /// Create a new point cloud from a list of points.
    pub fn new(points: Vec<[f64; 3]>) -> Self {
        Self { points }
    }

    /// Create a point cloud from a row-major N×3 buffer.
    ///
    /// # Arguments
    ///
    /// * `data` - The flattened xyz coordinates, `[x0, y0, z0, x1, y1, z1, ...]`.
    ///
    /// # Errors
    ///
    /// Returns [`PointCloudError::InvalidShape`] if the buffer length is not a multiple of 3.
    pub fn from_flat(data: &[f64]) -> Result<Self, PointCloudError> {
        if data.len() % 3 != 0 {
            return Err(PointCloudError::InvalidShape(data.len()));
        }

        let points = data
            .chunks_exact(3)
            .map(|xyz| [xyz[0], xyz[1], xyz[2]])
            .collect();

        Ok(Self { points })
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Consume the point cloud and return its points.
    pub fn into_points(self) -> Vec<[f64; 3]> {
        self.points
    }
}

impl From<Vec<[f64; 3]>> for PointCloud {
    fn from(points: Vec<[f64; 3]>) -> Self {
        Self::new(points)
    }
}
