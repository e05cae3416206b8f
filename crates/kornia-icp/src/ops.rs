use kornia_3d::{
    linalg::{det33, matmul33, matvec33, transpose33},
    transforms::RigidTransform,
    utils::faer_mat33_to_array33,
};

use crate::error::IcpError;

// singular values below this fraction of the largest one are treated as zero
const RANK_EPSILON: f64 = 1e-12;

/// Compute the Euclidean distance between two points.
///
/// Example:
///
/// ```
/// use kornia_icp::euclidean_distance;
///
/// assert_eq!(euclidean_distance(&[0.0, 0.0, 0.0], &[3.0, 4.0, 0.0]), 5.0);
/// ```
#[inline]
pub fn euclidean_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Compute the centroid of a set of points as the per-axis mean.
///
/// PRECONDITION: `points` is not empty.
pub fn compute_centroid(points: &[[f64; 3]]) -> [f64; 3] {
    let sum = points.iter().fold([0.0; 3], |acc, p| {
        [acc[0] + p[0], acc[1] + p[1], acc[2] + p[2]]
    });
    let n = points.len() as f64;
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

/// Singular value decomposition of a 3x3 matrix, `h = U * diag(s) * V^T`.
///
/// The factors are returned in a fixed convention so that the result only depends on
/// `h`: singular values in decreasing order, and every pair of singular vectors
/// `(u_k, v_k)` signed so that the largest magnitude entry of `v_k` is positive.
pub(crate) fn svd33(h: &[[f64; 3]; 3]) -> ([[f64; 3]; 3], [f64; 3], [[f64; 3]; 3]) {
    let h_mat = faer::Mat::<f64>::from_fn(3, 3, |i, j| h[i][j]);
    let svd = h_mat.svd();

    let u_raw = faer_mat33_to_array33(svd.u());
    let v_raw = faer_mat33_to_array33(svd.v());
    let s_diag = svd.s_diagonal();
    let s_raw = [s_diag.read(0), s_diag.read(1), s_diag.read(2)];

    // largest singular value first, stable for repeated values
    let mut order = [0, 1, 2];
    order.sort_by(|&a, &b| s_raw[b].total_cmp(&s_raw[a]));

    let mut u = [[0.0; 3]; 3];
    let mut v = [[0.0; 3]; 3];
    let mut s = [0.0; 3];
    for (k, &src_k) in order.iter().enumerate() {
        s[k] = s_raw[src_k];
        for row in 0..3 {
            u[row][k] = u_raw[row][src_k];
            v[row][k] = v_raw[row][src_k];
        }
    }

    for k in 0..3 {
        let pivot = (0..3)
            .max_by(|&a, &b| v[a][k].abs().total_cmp(&v[b][k].abs()))
            .unwrap_or(0);
        if v[pivot][k] < 0.0 {
            for row in 0..3 {
                u[row][k] = -u[row][k];
                v[row][k] = -v[row][k];
            }
        }
    }

    (u, s, v)
}

/// Compute the rigid transformation that best aligns two paired point sets.
///
/// Finds the rotation `R` and translation `t` minimizing `Σ ‖dst_i − (R·src_i + t)‖²`,
/// where point `i` of `points_src` corresponds to point `i` of `points_dst`
/// (Kabsch / Arun et al. "Least-squares fitting of two 3-D point sets", PAMI 1987):
///
/// 1. Compute the centroids of both sets.
/// 2. Compute the cross-covariance `H = Σ (src_i − c_src)(dst_i − c_dst)^T`.
/// 3. Decompose `H = U S V^T` and take `R = V U^T`.
/// 4. If `det(R) < 0`, negate the last column of `V` and recompute `R`, so the
///    result never encodes a reflection.
/// 5. `t = c_dst − R c_src`.
///
/// Degenerate configurations (fewer than three points, collinear points) still produce
/// a proper rotation, but it is not unique.
///
/// # Arguments
///
/// * `points_src` - Source point set.
/// * `points_dst` - Destination point set, index-aligned with `points_src`.
///
/// # Errors
///
/// Returns an error if the sets are empty or have different lengths.
pub fn fit_transformation(
    points_src: &[[f64; 3]],
    points_dst: &[[f64; 3]],
) -> Result<RigidTransform, IcpError> {
    if points_src.len() != points_dst.len() {
        return Err(IcpError::MismatchedLengths(
            points_src.len(),
            points_dst.len(),
        ));
    }
    if points_src.is_empty() {
        return Err(IcpError::EmptyPointCloud("source"));
    }

    // Identity transformation is a special case
    if points_src == points_dst {
        return Ok(RigidTransform::IDENTITY);
    }

    let src_centroid = compute_centroid(points_src);
    let dst_centroid = compute_centroid(points_dst);

    let mut h = [[0.0; 3]; 3];
    for (p_src, p_dst) in points_src.iter().zip(points_dst.iter()) {
        let a = [
            p_src[0] - src_centroid[0],
            p_src[1] - src_centroid[1],
            p_src[2] - src_centroid[2],
        ];
        let b = [
            p_dst[0] - dst_centroid[0],
            p_dst[1] - dst_centroid[1],
            p_dst[2] - dst_centroid[2],
        ];
        for (row, a_r) in h.iter_mut().zip(a.iter()) {
            for (val, b_c) in row.iter_mut().zip(b.iter()) {
                *val += a_r * b_c;
            }
        }
    }

    let (u, s, mut v) = svd33(&h);
    if s[1] <= RANK_EPSILON * s[0] {
        log::warn!(
            "Rank deficient cross-covariance (singular values {:?}), rotation is not unique",
            s
        );
    }

    let u_t = transpose33(&u);
    let mut r = matmul33(&v, &u_t);

    // Handle reflection case to ensure proper rotation matrix
    if det33(&r) < 0.0 {
        for row in v.iter_mut() {
            row[2] = -row[2];
        }
        r = matmul33(&v, &u_t);
    }

    let r_c = matvec33(&r, &src_centroid);
    let t = [
        dst_centroid[0] - r_c[0],
        dst_centroid[1] - r_c[1],
        dst_centroid[2] - r_c[2],
    ];

    Ok(RigidTransform::new(r, t))
}

/// Mean of a set of distances, `0` for an empty set.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
