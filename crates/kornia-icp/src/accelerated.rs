//! Accelerator adapter for the correspondence search.
//!
//! An [`Accelerator`] is a device able to run the nearest neighbor kernel over packed
//! xyz buffers: one kernel thread per source point, threads grouped in blocks of a
//! fixed size. [`AcceleratedSearch`] adapts any device to the [`CorrespondenceSearch`]
//! contract, so the ICP loop runs unchanged on top of it.
//!
//! [`HostAccelerator`] executes the kernel grid on the rayon thread pool. The kernel
//! scans the destination points in order with a strict less-than comparison, the same
//! arithmetic as [`crate::BruteForceSearch`], so both produce identical results.

use rayon::prelude::*;

use crate::{
    correspondence::{validate_search_inputs, CorrespondenceSearch, Correspondences},
    error::IcpError,
    ops::euclidean_distance,
};

/// Default number of kernel threads per block.
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// A device running the nearest neighbor kernel.
pub trait Accelerator: Send + Sync {
    /// Short name of the device, used for logging.
    fn name(&self) -> &'static str;

    /// Launch the nearest neighbor kernel.
    ///
    /// # Arguments
    ///
    /// * `source` - Packed source points, `[x0, y0, z0, x1, ...]`.
    /// * `destination` - Packed destination points.
    /// * `distances` - Output buffer, one slot per source point.
    /// * `indices` - Output buffer, one slot per source point.
    fn launch_nearest_neighbor(
        &self,
        source: &[f64],
        destination: &[f64],
        distances: &mut [f64],
        indices: &mut [u32],
    ) -> Result<(), IcpError>;
}

/// Body of one kernel thread: exhaustive scan of the packed destination buffer.
#[inline]
fn nearest_neighbor_kernel(query: &[f64; 3], destination: &[f64]) -> (f64, u32) {
    let mut min_distance = f64::INFINITY;
    let mut min_index = 0;
    for (j, candidate) in destination.chunks_exact(3).enumerate() {
        let distance = euclidean_distance(query, &[candidate[0], candidate[1], candidate[2]]);
        if distance < min_distance {
            min_distance = distance;
            min_index = j as u32;
        }
    }
    (min_distance, min_index)
}

/// Accelerator running the kernel grid on the host, one rayon task per block.
#[derive(Debug, Clone, Copy)]
pub struct HostAccelerator {
    block_size: usize,
}

impl Default for HostAccelerator {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl HostAccelerator {
    /// Create a device with a custom number of threads per block (at least one).
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    /// Number of kernel threads per block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl Accelerator for HostAccelerator {
    fn name(&self) -> &'static str {
        "host"
    }

    fn launch_nearest_neighbor(
        &self,
        source: &[f64],
        destination: &[f64],
        distances: &mut [f64],
        indices: &mut [u32],
    ) -> Result<(), IcpError> {
        let num_points = distances.len();
        if source.len() != num_points * 3
            || indices.len() != num_points
            || destination.len() % 3 != 0
        {
            return Err(IcpError::Accelerator(format!(
                "invalid launch buffers: source {}, destination {}, distances {}, indices {}",
                source.len(),
                destination.len(),
                distances.len(),
                indices.len()
            )));
        }

        let block_size = self.block_size;
        log::trace!(
            "nearest neighbor kernel: grid {} x block {}",
            num_points.div_ceil(block_size),
            block_size
        );

        distances
            .par_chunks_mut(block_size)
            .zip(indices.par_chunks_mut(block_size))
            .enumerate()
            .for_each(|(block_idx, (block_distances, block_indices))| {
                for (thread_idx, (distance, index)) in block_distances
                    .iter_mut()
                    .zip(block_indices.iter_mut())
                    .enumerate()
                {
                    let tid = block_idx * block_size + thread_idx;
                    let query = [source[3 * tid], source[3 * tid + 1], source[3 * tid + 2]];
                    (*distance, *index) = nearest_neighbor_kernel(&query, destination);
                }
            });

        Ok(())
    }
}

/// Correspondence search offloaded to an [`Accelerator`].
#[derive(Debug, Clone, Default)]
pub struct AcceleratedSearch<A: Accelerator> {
    device: A,
}

impl<A: Accelerator> AcceleratedSearch<A> {
    /// Create a search running on `device`.
    pub fn new(device: A) -> Self {
        Self { device }
    }

    /// Get the underlying device.
    pub fn device(&self) -> &A {
        &self.device
    }
}

impl<A: Accelerator> CorrespondenceSearch for AcceleratedSearch<A> {
    fn name(&self) -> &'static str {
        self.device.name()
    }

    fn search(
        &self,
        source: &[[f64; 3]],
        destination: &[[f64; 3]],
    ) -> Result<Correspondences, IcpError> {
        validate_search_inputs(source, destination)?;
        if destination.len() > u32::MAX as usize {
            return Err(IcpError::Accelerator(format!(
                "{} destination points exceed the 32-bit index range",
                destination.len()
            )));
        }

        let mut distances = vec![0.0; source.len()];
        let mut indices = vec![0u32; source.len()];
        self.device.launch_nearest_neighbor(
            source.as_flattened(),
            destination.as_flattened(),
            &mut distances,
            &mut indices,
        )?;

        // results from the device are checked before they reach the caller
        let indices = indices
            .into_iter()
            .map(|index| match index as usize {
                index if index < destination.len() => Ok(index),
                index => Err(IcpError::CorrespondenceOutOfRange {
                    index,
                    len: destination.len(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Correspondences { distances, indices })
    }
}
