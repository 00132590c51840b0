pub mod tracker;
pub mod updater;

pub use updater::{update_positions, RatingConfig, RatingUpdater, RecomputeOutcome};
