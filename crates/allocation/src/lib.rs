//! Ad allocation engine: turns success statistics into per-publisher
//! serving distributions and draws ads from them.

#![warn(clippy::unwrap_used)]

pub mod bounds;
pub mod distribution;
pub mod pipeline;
pub mod prior;
pub mod revenue;
pub mod sampler;
pub mod snapshot;
pub mod stats;
pub mod winners;

pub use bounds::BoundParams;
pub use distribution::{Distribution, WeightedAd};
pub use pipeline::AllocationPipeline;
pub use sampler::{Sampler, ServeError};
pub use snapshot::{Allocation, Snapshot, SnapshotHandle};
pub use stats::StatsStore;
