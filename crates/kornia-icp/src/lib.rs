#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

pub mod accelerated;
pub use accelerated::{AcceleratedSearch, Accelerator, HostAccelerator};

mod correspondence;
pub use correspondence::*;

mod error;
pub use error::IcpError;

mod icp_vanilla;
pub use icp_vanilla::*;

mod ops;
pub use ops::{compute_centroid, euclidean_distance, fit_transformation};
