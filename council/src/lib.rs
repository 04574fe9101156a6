//! Sport Council - per-sport ensemble of five specialists
//!
//! This crate provides the council that produces one sport's prediction.
//! It includes:
//! - `CouncilMember` trait and the fixed five-seat roster
//! - Lexicon-driven specialists for every seat
//! - Per-sport ensemble weights with snapshot/replace semantics
//! - `CouncilAggregator` combining seat opinions into a `SportPrediction`

pub mod aggregator;
pub mod member;
pub mod specialists;
pub mod weights;

// Re-export commonly used types
pub use aggregator::{CouncilAggregator, CouncilConfig, NO_EDGE_PICK};
pub use member::{validate_roster, CouncilMember, Roster};
pub use specialists::{standard_roster, RiskTolerance, Specialist, SpecialistConfig};
pub use weights::{SportWeights, WeightBook, WEIGHT_SUM_TOLERANCE};
