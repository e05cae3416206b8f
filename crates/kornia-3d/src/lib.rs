#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Linear algebra utilities.
pub mod linalg;

/// Point cloud container.
pub mod pointcloud;

/// 3D transforms algorithms.
pub mod transforms;

/// Conversion helpers between arrays and faer views.
pub mod utils;
