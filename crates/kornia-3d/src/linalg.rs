use crate::utils;

/// Transform a set of points using a rotation and translation.
///
/// Computes `dst = R * src + t` for every point.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_r_src` - A rotation matrix.
/// * `dst_t_src` - A translation vector.
///
/// # Returns
///
/// The transformed points, in the same order as `src_points`.
///
/// Example:
///
/// ```
/// use kornia_3d::linalg::transform_points;
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let translation = [1.0, 0.0, 0.0];
/// let dst_points = transform_points(&src_points, &rotation, &translation);
/// assert_eq!(dst_points, vec![[3.0, 2.0, 2.0], [4.0, 4.0, 5.0]]);
/// ```
pub fn transform_points(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
) -> Vec<[f64; 3]> {
    let mut dst_points = vec![[0.0; 3]; src_points.len()];

    // create views of the rotation and translation matrices
    let dst_r_src_mat = utils::array33_to_faer_mat33(dst_r_src);
    let dst_t_src_col = utils::array3_to_faer_col(dst_t_src);

    // view the source points as a Nx3 matrix, one point per row
    let points_in_src =
        faer::mat::from_row_major_slice(src_points.as_flattened(), src_points.len(), 3);

    // view the destination points as a 3xN matrix, one point per column
    let num_points = dst_points.len();
    let mut points_in_dst =
        faer::mat::from_column_major_slice_mut(dst_points.as_flattened_mut(), 3, num_points);

    faer::linalg::matmul::matmul(
        &mut points_in_dst,
        dst_r_src_mat,
        points_in_src.transpose(),
        None,
        1.0,
        faer::Parallelism::None,
    );

    let (tx, ty, tz) = (
        dst_t_src_col.read(0),
        dst_t_src_col.read(1),
        dst_t_src_col.read(2),
    );

    for mut col in points_in_dst.col_iter_mut() {
        col.write(0, col.read(0) + tx);
        col.write(1, col.read(1) + ty);
        col.write(2, col.read(2) + tz);
    }

    dst_points
}

/// Multiply two 3x3 matrices, `a * b`.
pub fn matmul33(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut m = [[0.0; 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    m
}

/// Multiply a 3x3 matrix by a 3-vector, `m * v`.
pub fn matvec33(m: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Transpose a 3x3 matrix.
pub fn transpose33(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ]
}

/// Determinant of a 3x3 matrix.
pub fn det33(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}
