#![warn(clippy::unwrap_used)]

pub mod refresh;
pub mod state;

pub use refresh::{CycleOutcome, RefreshLoop};
pub use state::RefreshState;
