use approx::assert_relative_eq;
use kornia_3d::{
    pointcloud::PointCloud,
    transforms::{axis_angle_to_rotation_matrix, RigidTransform},
};
use kornia_icp::{
    icp_align, icp_vanilla, icp_with_search, AcceleratedSearch, BruteForceSearch,
    CorrespondenceSearch, Correspondences, HostAccelerator, ICPConvergenceCriteria, ICPOptions,
    IcpError, IcpState, SearchBackend,
};

fn unit_cube() -> Vec<[f64; 3]> {
    let mut corners = Vec::with_capacity(8);
    for x in [0.0, 1.0] {
        for y in [0.0, 1.0] {
            for z in [0.0, 1.0] {
                corners.push([x, y, z]);
            }
        }
    }
    corners
}

fn spiral(num_points: usize) -> Vec<[f64; 3]> {
    (0..num_points)
        .map(|i| {
            let s = i as f64;
            let r = 1.0 + 0.02 * s;
            [(0.3 * s).cos() * r, (0.3 * s).sin() * r, 0.05 * s]
        })
        .collect()
}

fn spiral_pair() -> Result<(PointCloud, PointCloud, RigidTransform), Box<dyn std::error::Error>> {
    let points_src = spiral(60);
    let dst_t_src = RigidTransform::new(
        axis_angle_to_rotation_matrix(&[1.0, 2.0, 3.0], 0.1)?,
        [0.05, -0.03, 0.02],
    );
    let points_dst = dst_t_src.transform_points(&points_src);
    Ok((
        PointCloud::new(points_src),
        PointCloud::new(points_dst),
        dst_t_src,
    ))
}

fn assert_transform_near(res: &RigidTransform, exp: &RigidTransform, epsilon: f64) {
    for i in 0..3 {
        assert_relative_eq!(res.translation[i], exp.translation[i], epsilon = epsilon);
        for j in 0..3 {
            assert_relative_eq!(res.rotation[i][j], exp.rotation[i][j], epsilon = epsilon);
        }
    }
}

/// Fails on the first point where two searches disagree.
fn assert_correspondences_eq(a: &Correspondences, b: &Correspondences) {
    assert_eq!(a.len(), b.len(), "correspondence sizes do not match");
    assert_eq!(a.distances.len(), a.indices.len());
    for i in 0..a.len() {
        assert_eq!(a.indices[i], b.indices[i], "index mismatch at point {i}");
        assert_relative_eq!(a.distances[i], b.distances[i], epsilon = 1e-12);
    }
}

#[test]
fn cube_rotated_about_z_with_initial_guess() -> Result<(), Box<dyn std::error::Error>> {
    let source = unit_cube();
    let dst_t_src = RigidTransform::new(
        axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], 30f64.to_radians())?,
        [1.0, 0.0, 0.0],
    );
    let target = dst_t_src.transform_points(&source);

    let initial = RigidTransform::new(
        axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], 20f64.to_radians())?,
        [1.0, 0.0, 0.0],
    );
    let options = ICPOptions {
        criteria: ICPConvergenceCriteria {
            max_iterations: 50,
            tolerance: 1e-9,
        },
        ..Default::default()
    };
    let result = icp_vanilla(
        &PointCloud::new(source),
        &PointCloud::new(target),
        initial,
        &options,
    )?;

    assert_eq!(result.state, IcpState::Converged);
    assert_transform_near(&result.transform, &dst_t_src, 1e-6);
    assert_relative_eq!(result.mean_error, 0.0, epsilon = 1e-9);
    assert_eq!(result.distances.len(), 8);

    // the homogeneous form carries the same blocks
    let m = result.transform.to_homogeneous();
    assert_relative_eq!(m[0][0], 30f64.to_radians().cos(), epsilon = 1e-6);
    assert_relative_eq!(m[1][0], 30f64.to_radians().sin(), epsilon = 1e-6);
    assert_relative_eq!(m[0][3], 1.0, epsilon = 1e-6);
    assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);
    Ok(())
}

#[test]
fn cube_rotated_about_z_from_identity() -> Result<(), Box<dyn std::error::Error>> {
    // the symmetric cube traps point to point ICP away from the true pose when it
    // starts from the identity; the loop must still stop with a proper rigid transform
    let source = unit_cube();
    let dst_t_src = RigidTransform::new(
        axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], 30f64.to_radians())?,
        [1.0, 0.0, 0.0],
    );
    let target = dst_t_src.transform_points(&source);

    let result = icp_align(&PointCloud::new(source), &PointCloud::new(target), 50, 1e-9)?;

    assert!(result.num_iterations <= 50);
    assert_eq!(result.distances.len(), 8);
    assert!(result.distances.iter().all(|d| *d >= 0.0));
    assert_relative_eq!(result.transform.rotation_determinant(), 1.0, epsilon = 1e-9);
    Ok(())
}

#[test]
fn spiral_is_recovered() -> Result<(), Box<dyn std::error::Error>> {
    let (source, target, dst_t_src) = spiral_pair()?;

    let result = icp_align(&source, &target, 50, 1e-9)?;

    assert_eq!(result.state, IcpState::Converged);
    assert_transform_near(&result.transform, &dst_t_src, 1e-6);
    assert_relative_eq!(result.mean_error, 0.0, epsilon = 1e-9);
    Ok(())
}

#[test]
fn mean_residual_is_non_increasing() -> Result<(), Box<dyn std::error::Error>> {
    let (source, target, _) = spiral_pair()?;

    let initial_error = BruteForceSearch
        .search(source.points(), target.points())?
        .mean_distance();

    let options = ICPOptions {
        keep_history: true,
        ..Default::default()
    };
    let result = icp_vanilla(&source, &target, RigidTransform::IDENTITY, &options)?;

    let mut prev_error = initial_error;
    for record in &result.history {
        assert!(
            record.mean_error <= prev_error + 1e-12,
            "residual increased at iteration {}: {} > {}",
            record.iteration,
            record.mean_error,
            prev_error
        );
        prev_error = record.mean_error;
    }
    Ok(())
}

#[test]
fn aligned_source_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let (source, target, _) = spiral_pair()?;

    let first = icp_align(&source, &target, 50, 1e-9)?;
    let aligned = PointCloud::new(first.transform.transform_points(source.points()));

    let second = icp_align(&aligned, &target, 50, 1e-9)?;

    assert_eq!(second.state, IcpState::Converged);
    assert_eq!(second.num_iterations, 1);
    assert_transform_near(&second.transform, &RigidTransform::IDENTITY, 1e-9);
    Ok(())
}

#[test]
fn backends_produce_identical_alignments() -> Result<(), Box<dyn std::error::Error>> {
    let (source, target, _) = spiral_pair()?;

    let mut results = Vec::new();
    for backend in [
        SearchBackend::Cpu,
        SearchBackend::ParallelCpu,
        SearchBackend::Accelerated,
    ] {
        let options = ICPOptions {
            backend,
            ..Default::default()
        };
        results.push(icp_vanilla(
            &source,
            &target,
            RigidTransform::IDENTITY,
            &options,
        )?);
    }

    let reference = &results[0];
    for result in &results[1..] {
        assert_eq!(result.num_iterations, reference.num_iterations);
        assert_eq!(result.state, reference.state);
        assert_eq!(result.distances, reference.distances);
        assert_eq!(result.transform, reference.transform);
    }
    Ok(())
}

#[test]
fn accelerated_search_matches_cpu_search() -> Result<(), IcpError> {
    let source = spiral(300);
    let target = spiral(120)
        .into_iter()
        .map(|p| [p[0] + 0.01, p[1] - 0.02, p[2]])
        .collect::<Vec<_>>();

    let cpu = BruteForceSearch.search(&source, &target)?;
    let accelerated =
        AcceleratedSearch::new(HostAccelerator::with_block_size(32)).search(&source, &target)?;

    assert_correspondences_eq(&cpu, &accelerated);
    Ok(())
}

#[test]
fn custom_search_strategy_drives_the_loop() -> Result<(), Box<dyn std::error::Error>> {
    let (source, target, dst_t_src) = spiral_pair()?;

    let search = AcceleratedSearch::new(HostAccelerator::with_block_size(8));
    let result = icp_with_search(
        &source,
        &target,
        RigidTransform::IDENTITY,
        &ICPConvergenceCriteria::default(),
        &search,
        false,
    )?;

    assert!(result.history.is_empty());
    assert_transform_near(&result.transform, &dst_t_src, 1e-6);
    Ok(())
}

#[test]
fn empty_point_clouds_are_rejected() {
    let empty = PointCloud::default();
    let res = icp_align(&empty, &empty, 50, 1e-9);
    assert!(matches!(res, Err(IcpError::EmptyPointCloud(_))));
}

#[test]
fn malformed_buffers_are_rejected() {
    let load = |data: &[f64]| -> Result<PointCloud, IcpError> { Ok(PointCloud::from_flat(data)?) };

    assert!(load(&[0.0, 1.0, 2.0]).is_ok());
    assert!(matches!(
        load(&[0.0, 1.0, 2.0, 3.0]),
        Err(IcpError::InvalidShape(_))
    ));
}
