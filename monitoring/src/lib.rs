pub mod calibration;
pub mod tracker;

pub use calibration::{BrierScoreCalculator, CalibrationEngine, CalibrationReport, ConfidenceBucket};
pub use tracker::{PerformanceTracker, TrackerConfig};
