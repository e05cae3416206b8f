use kornia_3d::{pointcloud::PointCloud, transforms::RigidTransform};
use serde::{Deserialize, Serialize};

use crate::{
    correspondence::{CorrespondenceSearch, Correspondences, SearchBackend},
    error::IcpError,
    ops::fit_transformation,
};

/// Terminal state of the ICP loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcpState {
    /// The change in mean residual dropped below the tolerance.
    Converged,
    /// The loop ran `max_iterations` refinement steps without converging.
    MaxIterationsReached,
}

/// Incremental transform and resulting mean residual of one refinement step.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    /// 1-based index of the refinement step.
    pub iteration: usize,
    /// Transform applied to the working points during this step.
    pub transform: RigidTransform,
    /// Mean residual after the step.
    pub mean_error: f64,
}

/// Result of the ICP algorithm.
///
/// The transformation is from the source to the target frame.
#[derive(Debug, Clone)]
pub struct ICPResult {
    /// Cumulative transform mapping the original source onto its aligned position.
    pub transform: RigidTransform,
    /// Residual distance of every source point to its match, from the last search.
    pub distances: Vec<f64>,
    /// Number of refinement steps executed.
    pub num_iterations: usize,
    /// Mean of `distances`.
    pub mean_error: f64,
    /// How the loop terminated.
    pub state: IcpState,
    /// Per step records, only filled when [`ICPOptions::keep_history`] is set.
    pub history: Vec<IterationRecord>,
}

/// Structure to define the ICP parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ICPConvergenceCriteria {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Convergence tolerance as the difference in mean residual between two consecutive iterations.
    pub tolerance: f64,
}

impl Default for ICPConvergenceCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-9,
        }
    }
}

impl ICPConvergenceCriteria {
    fn validate(&self) -> Result<(), IcpError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(IcpError::InvalidCriteria(format!(
                "tolerance must be a positive finite number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Options of the ICP alignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ICPOptions {
    /// Convergence criteria.
    pub criteria: ICPConvergenceCriteria,
    /// Backend running the correspondence search.
    pub backend: SearchBackend,
    /// Keep the incremental transform and residual of every step.
    pub keep_history: bool,
}

/// One refinement step: fit the working points to their matches, move them, and search
/// the correspondences again.
///
/// Returns the incremental transform, the moved points and their new correspondences.
fn refine(
    working: &[[f64; 3]],
    target: &[[f64; 3]],
    correspondences: &Correspondences,
    search: &dyn CorrespondenceSearch,
) -> Result<(RigidTransform, Vec<[f64; 3]>, Correspondences), IcpError> {
    // reorder the target so that it is index-aligned with the working points
    let matched = correspondences.gather(target)?;

    let delta = fit_transformation(working, &matched)?;
    let moved = delta.transform_points(working);
    let next = search.search(&moved, target)?;

    Ok((delta, moved, next))
}

/// Iterative Closest Point (ICP) algorithm using point to point distance.
///
/// The correspondence search runs on the backend selected in `options`.
///
/// # Arguments
///
/// * `source` - Source point cloud.
/// * `target` - Target point cloud.
/// * `initial` - Initial guess of the transformation from the source to the target frame.
/// * `options` - Convergence criteria, search backend and history recording.
///
/// # Returns
///
/// * `result` - Result of the ICP algorithm containing the cumulative transform, the
///   residuals and the number of iterations.
pub fn icp_vanilla(
    source: &PointCloud,
    target: &PointCloud,
    initial: RigidTransform,
    options: &ICPOptions,
) -> Result<ICPResult, IcpError> {
    let search = options.backend.build();
    icp_with_search(
        source,
        target,
        initial,
        &options.criteria,
        search.as_ref(),
        options.keep_history,
    )
}

/// Align `source` onto `target` starting from the identity, with the CPU search.
///
/// Example:
///
/// ```
/// use kornia_3d::pointcloud::PointCloud;
/// use kornia_icp::icp_align;
///
/// let source = PointCloud::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 2.0, 0.0]]);
/// let target = PointCloud::new(vec![[0.1, 0.0, 0.0], [1.1, 0.0, 0.0], [0.1, 2.0, 0.0]]);
///
/// let result = icp_align(&source, &target, 20, 1e-9).unwrap();
/// assert!((result.transform.translation[0] - 0.1).abs() < 1e-9);
/// ```
pub fn icp_align(
    source: &PointCloud,
    target: &PointCloud,
    max_iterations: usize,
    tolerance: f64,
) -> Result<ICPResult, IcpError> {
    let options = ICPOptions {
        criteria: ICPConvergenceCriteria {
            max_iterations,
            tolerance,
        },
        ..Default::default()
    };
    icp_vanilla(source, target, RigidTransform::IDENTITY, &options)
}

/// ICP loop on top of an explicit correspondence search strategy.
///
/// The source cloud is never modified: the loop moves a working copy of its points and,
/// once it stops, the cumulative transform is fitted between the original source points
/// and the final working points.
pub fn icp_with_search(
    source: &PointCloud,
    target: &PointCloud,
    initial: RigidTransform,
    criteria: &ICPConvergenceCriteria,
    search: &dyn CorrespondenceSearch,
    keep_history: bool,
) -> Result<ICPResult, IcpError> {
    criteria.validate()?;
    if source.is_empty() {
        return Err(IcpError::EmptyPointCloud("source"));
    }
    if target.is_empty() {
        return Err(IcpError::EmptyPointCloud("target"));
    }

    log::debug!(
        "ICP: {} source points, {} target points, {} search",
        source.len(),
        target.len(),
        search.name()
    );

    let target_points = target.points();

    // initial correspondences of the working copy
    let mut working = initial.transform_points(source.points());
    let mut correspondences = search.search(&working, target_points)?;
    let mut prev_error = correspondences.mean_distance();

    let mut state = IcpState::MaxIterationsReached;
    let mut num_iterations = 0;
    let mut history = Vec::new();

    for i in 0..criteria.max_iterations {
        let now = std::time::Instant::now();

        let (delta, moved, next) = refine(&working, target_points, &correspondences, search)?;
        working = moved;
        correspondences = next;
        num_iterations = i + 1;

        let mean_error = correspondences.mean_distance();
        log::debug!(
            "Iteration: {} mean error: {} elapsed: {:?}",
            num_iterations,
            mean_error,
            now.elapsed()
        );

        if keep_history {
            history.push(IterationRecord {
                iteration: num_iterations,
                transform: delta,
                mean_error,
            });
        }

        // check convergence and exit if below tolerance
        if (prev_error - mean_error).abs() < criteria.tolerance {
            state = IcpState::Converged;
            break;
        }

        prev_error = mean_error;
    }

    match state {
        IcpState::Converged => log::debug!("ICP converged in {} iterations", num_iterations),
        IcpState::MaxIterationsReached => log::debug!(
            "ICP reached the maximum of {} iterations",
            criteria.max_iterations
        ),
    }

    // cumulative transform straight from the original to the final positions
    let transform = fit_transformation(source.points(), &working)?;
    let mean_error = correspondences.mean_distance();

    Ok(ICPResult {
        transform,
        distances: correspondences.distances,
        num_iterations,
        mean_error,
        state,
        history,
    })
}
