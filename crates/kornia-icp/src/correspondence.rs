use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    accelerated::{AcceleratedSearch, HostAccelerator},
    error::IcpError,
    ops::{euclidean_distance, mean},
};

/// Nearest neighbor assignment of every source point.
///
/// `distances[i]` and `indices[i]` both refer to source point `i`: `indices[i]` is the
/// position of its closest destination point and `distances[i]` the distance to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correspondences {
    /// Distance from each source point to its matched destination point.
    pub distances: Vec<f64>,
    /// Index of the matched destination point for each source point.
    pub indices: Vec<usize>,
}

impl Correspondences {
    /// Number of source points with a correspondence.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Check if there are no correspondences.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Mean matched distance.
    pub fn mean_distance(&self) -> f64 {
        mean(&self.distances)
    }

    /// Reorder the destination points by the correspondence indices.
    ///
    /// The returned set is index-aligned with the source points the correspondences
    /// were computed for.
    ///
    /// # Errors
    ///
    /// Returns [`IcpError::CorrespondenceOutOfRange`] if an index does not address a
    /// point of `destination`.
    pub fn gather(&self, destination: &[[f64; 3]]) -> Result<Vec<[f64; 3]>, IcpError> {
        self.indices
            .iter()
            .map(|&index| {
                destination
                    .get(index)
                    .copied()
                    .ok_or(IcpError::CorrespondenceOutOfRange {
                        index,
                        len: destination.len(),
                    })
            })
            .collect()
    }
}

/// Strategy to find, for every source point, the closest destination point.
///
/// Every implementation follows the same contract: the result has one entry per source
/// point, in source order, and ties are resolved to the lowest destination index.
pub trait CorrespondenceSearch: Send + Sync {
    /// Short name of the strategy, used for logging.
    fn name(&self) -> &'static str;

    /// Find the correspondences between `source` and `destination`.
    fn search(
        &self,
        source: &[[f64; 3]],
        destination: &[[f64; 3]],
    ) -> Result<Correspondences, IcpError>;
}

pub(crate) fn validate_search_inputs(
    source: &[[f64; 3]],
    destination: &[[f64; 3]],
) -> Result<(), IcpError> {
    if source.is_empty() {
        return Err(IcpError::EmptyPointCloud("source"));
    }
    if destination.is_empty() {
        return Err(IcpError::EmptyPointCloud("destination"));
    }
    Ok(())
}

/// Find the closest point of `destination` to `query` by exhaustive scan.
///
/// Uses a strict less-than comparison so the first (lowest index) minimum wins.
///
/// PRECONDITION: `destination` is not empty.
#[inline]
pub fn nearest_point(query: &[f64; 3], destination: &[[f64; 3]]) -> (f64, usize) {
    let mut min_distance = f64::INFINITY;
    let mut min_index = 0;
    for (j, candidate) in destination.iter().enumerate() {
        let distance = euclidean_distance(query, candidate);
        if distance < min_distance {
            min_distance = distance;
            min_index = j;
        }
    }
    (min_distance, min_index)
}

/// Sequential brute force nearest neighbor search, O(N·M).
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceSearch;

impl CorrespondenceSearch for BruteForceSearch {
    fn name(&self) -> &'static str {
        "brute-force"
    }

    fn search(
        &self,
        source: &[[f64; 3]],
        destination: &[[f64; 3]],
    ) -> Result<Correspondences, IcpError> {
        validate_search_inputs(source, destination)?;

        let (distances, indices) = source
            .iter()
            .map(|p| nearest_point(p, destination))
            .unzip();

        Ok(Correspondences { distances, indices })
    }
}

/// Brute force nearest neighbor search with the source points split across the rayon
/// thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelSearch;

impl CorrespondenceSearch for ParallelSearch {
    fn name(&self) -> &'static str {
        "parallel-cpu"
    }

    fn search(
        &self,
        source: &[[f64; 3]],
        destination: &[[f64; 3]],
    ) -> Result<Correspondences, IcpError> {
        validate_search_inputs(source, destination)?;

        // indexed collect keeps the source order whatever the completion order
        let (distances, indices) = source
            .par_iter()
            .map(|p| nearest_point(p, destination))
            .unzip();

        Ok(Correspondences { distances, indices })
    }
}

/// Execution substrate of the correspondence search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchBackend {
    /// Single threaded brute force search.
    #[default]
    Cpu,
    /// Brute force search parallelized over the source points.
    ParallelCpu,
    /// Nearest neighbor kernel launched on the accelerator device.
    Accelerated,
}

impl SearchBackend {
    /// Build the search strategy for this backend.
    pub fn build(&self) -> Box<dyn CorrespondenceSearch> {
        match self {
            SearchBackend::Cpu => Box::new(BruteForceSearch),
            SearchBackend::ParallelCpu => Box::new(ParallelSearch),
            SearchBackend::Accelerated => {
                Box::new(AcceleratedSearch::new(HostAccelerator::default()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_points() -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
        let points_src = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ];
        let points_dst = vec![[1.0, 0.0, 0.0], [1.0, 1.0, 0.0]];
        (points_src, points_dst)
    }

    #[test]
    fn test_brute_force_search() -> Result<(), IcpError> {
        let (points_src, points_dst) = create_points();

        let res = BruteForceSearch.search(&points_src, &points_dst)?;

        assert_eq!(res.len(), 4);
        assert_eq!(res.indices, vec![0, 0, 1, 1]);
        assert_eq!(res.distances, vec![1.0, 0.0, 1.0, 0.0]);
        assert_eq!(res.mean_distance(), 0.5);
        Ok(())
    }

    #[test]
    fn test_search_exact_match() -> Result<(), IcpError> {
        let points_dst = vec![[0.5, 0.5, 0.5], [2.0, -1.0, 3.0], [-4.0, 0.0, 1.0]];
        let points_src = vec![[2.0, -1.0, 3.0]];

        for backend in [SearchBackend::Cpu, SearchBackend::ParallelCpu] {
            let res = backend.build().search(&points_src, &points_dst)?;
            assert_eq!(res.indices, vec![1]);
            assert_eq!(res.distances, vec![0.0]);
        }
        Ok(())
    }

    #[test]
    fn test_search_tie_break_lowest_index() -> Result<(), IcpError> {
        // the query is equidistant from destination points 1 and 2
        let points_dst = vec![[10.0, 0.0, 0.0], [1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]];
        let points_src = vec![[0.0, 0.0, 0.0]];

        for backend in [SearchBackend::Cpu, SearchBackend::ParallelCpu] {
            let res = backend.build().search(&points_src, &points_dst)?;
            assert_eq!(res.indices, vec![1]);
            assert_eq!(res.distances, vec![1.0]);
        }

        // duplicated destination points resolve to the first copy
        let points_dst = vec![[3.0, 3.0, 3.0], [1.0, 1.0, 1.0], [1.0, 1.0, 1.0]];
        let res = BruteForceSearch.search(&[[1.0, 1.0, 1.0]], &points_dst)?;
        assert_eq!(res.indices, vec![1]);
        Ok(())
    }

    #[test]
    fn test_parallel_search_matches_sequential() -> Result<(), IcpError> {
        let points_src = (0..500)
            .map(|_| [rand::random(), rand::random(), rand::random()])
            .collect::<Vec<[f64; 3]>>();
        let points_dst = (0..300)
            .map(|_| [rand::random(), rand::random(), rand::random()])
            .collect::<Vec<[f64; 3]>>();

        let sequential = BruteForceSearch.search(&points_src, &points_dst)?;
        let parallel = ParallelSearch.search(&points_src, &points_dst)?;

        assert_eq!(sequential, parallel);
        Ok(())
    }

    #[test]
    fn test_search_empty_input() {
        let points = vec![[0.0, 0.0, 0.0]];
        for backend in [
            SearchBackend::Cpu,
            SearchBackend::ParallelCpu,
            SearchBackend::Accelerated,
        ] {
            let search = backend.build();
            assert_eq!(
                search.search(&[], &points),
                Err(IcpError::EmptyPointCloud("source"))
            );
            assert_eq!(
                search.search(&points, &[]),
                Err(IcpError::EmptyPointCloud("destination"))
            );
        }
    }

    #[test]
    fn test_gather() -> Result<(), IcpError> {
        let points_dst = vec![[1.0, 0.0, 0.0], [1.0, 1.0, 0.0]];
        let correspondences = Correspondences {
            distances: vec![0.0, 0.0, 0.0],
            indices: vec![1, 0, 1],
        };
        assert_eq!(
            correspondences.gather(&points_dst)?,
            vec![[1.0, 1.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]]
        );

        let invalid = Correspondences {
            distances: vec![0.0],
            indices: vec![2],
        };
        assert_eq!(
            invalid.gather(&points_dst),
            Err(IcpError::CorrespondenceOutOfRange { index: 2, len: 2 })
        );
        Ok(())
    }
}
