pub mod model;
pub mod snapshot;

pub use model::{ColumnAnchor, GridModel};
pub use snapshot::{Fingerprint, Snapshot};

/// Minimum number of rows a grid is padded to unless configured otherwise
pub const DEFAULT_MIN_ROWS: usize = 20;

/// Threshold for using parallel processing (rows * cols)
pub(crate) const PARALLEL_THRESHOLD: usize = 10_000;

#[cfg(test)]
mod test;
